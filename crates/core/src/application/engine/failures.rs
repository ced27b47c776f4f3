// Per-task failure log
//
// Background tasks absorb their errors (log and continue). Every absorbed
// error also lands here so callers and tests can observe it without the
// failure leaking into command results.

use super::constants::TASK_FAILURE_LOG_CAPACITY;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// Which background path absorbed the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Counting,
    Statistics,
    ScheduledPause,
    /// Best-effort session finalize on stop
    Finalize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub task: TaskKind,
    pub message: String,
    pub at: DateTime<Local>,
}

#[derive(Default)]
struct Inner {
    recent: VecDeque<TaskFailure>,
    totals: [u64; 4],
}

/// Bounded failure log shared by all tasks
#[derive(Default)]
pub struct TaskFailures {
    inner: Mutex<Inner>,
}

impl TaskFailures {
    pub fn record(&self, task: TaskKind, message: impl Into<String>, at: DateTime<Local>) {
        let mut inner = self.inner.lock();
        inner.totals[slot(task)] += 1;
        if inner.recent.len() == TASK_FAILURE_LOG_CAPACITY {
            inner.recent.pop_front();
        }
        inner.recent.push_back(TaskFailure {
            task,
            message: message.into(),
            at,
        });
    }

    /// Total failures absorbed by `task` since construction
    pub fn count(&self, task: TaskKind) -> u64 {
        self.inner.lock().totals[slot(task)]
    }

    /// Most recent failures, oldest first
    pub fn recent(&self) -> Vec<TaskFailure> {
        self.inner.lock().recent.iter().cloned().collect()
    }
}

fn slot(task: TaskKind) -> usize {
    match task {
        TaskKind::Counting => 0,
        TaskKind::Statistics => 1,
        TaskKind::ScheduledPause => 2,
        TaskKind::Finalize => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_task_and_bounded_history() {
        let failures = TaskFailures::default();
        let now = Local::now();
        for i in 0..(TASK_FAILURE_LOG_CAPACITY + 5) {
            failures.record(TaskKind::Statistics, format!("write {}", i), now);
        }
        failures.record(TaskKind::Finalize, "finalize", now);

        assert_eq!(failures.count(TaskKind::Statistics), (TASK_FAILURE_LOG_CAPACITY + 5) as u64);
        assert_eq!(failures.count(TaskKind::Finalize), 1);
        assert_eq!(failures.count(TaskKind::Counting), 0);

        let recent = failures.recent();
        assert_eq!(recent.len(), TASK_FAILURE_LOG_CAPACITY);
        assert_eq!(recent.last().unwrap().task, TaskKind::Finalize);
        assert_eq!(recent.first().unwrap().message, "write 6");
    }
}
