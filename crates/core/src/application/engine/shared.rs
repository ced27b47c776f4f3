// Shared production state, partitioned into field groups
//
// Each group has its own short-held lock. Lock order whenever more than one
// group is held: run -> order -> progress -> series. Guards are never held
// across an `.await`.

use crate::domain::{OrderInfo, ProductionState, Progress, RunControl, RunState, ThroughputSeries};
use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};

pub(crate) struct SharedState {
    pub(crate) run: Mutex<RunControl>,
    pub(crate) order: RwLock<OrderInfo>,
    pub(crate) progress: Mutex<Progress>,
    pub(crate) series: Mutex<ThroughputSeries>,
}

impl SharedState {
    pub(crate) fn new(state: ProductionState) -> Self {
        Self {
            run: Mutex::new(state.run),
            order: RwLock::new(state.order),
            progress: Mutex::new(state.progress),
            series: Mutex::new(state.series),
        }
    }

    /// Consistent copy of every group
    pub(crate) fn snapshot(&self) -> ProductionState {
        let run = self.run.lock();
        let order = self.order.read();
        let progress = self.progress.lock();
        let series = self.series.lock();
        ProductionState {
            order: order.clone(),
            progress: *progress,
            run: run.clone(),
            series: series.clone(),
        }
    }

    /// Mark the session stopped and unconfigured, returning the stopped state.
    /// `None` when already stopped.
    pub(crate) fn stop(&self, now: DateTime<Local>) -> Option<ProductionState> {
        let mut run = self.run.lock();
        if run.run_state == RunState::Stopped {
            return None;
        }
        run.run_state = RunState::Stopped;
        run.ended_at = Some(now);

        let mut order = self.order.write();
        order.configured = false;
        let progress = self.progress.lock();
        let series = self.series.lock();
        Some(ProductionState {
            order: order.clone(),
            progress: *progress,
            run: run.clone(),
            series: series.clone(),
        })
    }

    /// Install a whole new state, applying `guard` to the current run group first.
    /// Nothing is replaced when the guard rejects.
    pub(crate) fn replace_if<E>(
        &self,
        fresh: ProductionState,
        guard: impl FnOnce(&RunControl) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut run = self.run.lock();
        guard(&run)?;
        let mut order = self.order.write();
        let mut progress = self.progress.lock();
        let mut series = self.series.lock();
        *run = fresh.run;
        *order = fresh.order;
        *progress = fresh.progress;
        *series = fresh.series;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_reflects_each_group() {
        let shared = SharedState::new(ProductionState::default());
        shared.progress.lock().current_count = 7;
        shared.order.write().article = "ART-9".to_string();
        shared.run.lock().run_state = RunState::Paused;

        let snap = shared.snapshot();
        assert_eq!(snap.progress.current_count, 7);
        assert_eq!(snap.order.article, "ART-9");
        assert_eq!(snap.run.run_state, RunState::Paused);
    }

    #[test]
    fn test_replace_if_rejected_keeps_state() {
        let shared = SharedState::new(ProductionState::default());
        shared.progress.lock().current_count = 3;
        shared.run.lock().run_state = RunState::Counting;

        let result: Result<(), &str> = shared.replace_if(ProductionState::default(), |run| {
            if run.run_state == RunState::Stopped {
                Ok(())
            } else {
                Err("busy")
            }
        });
        assert_eq!(result, Err("busy"));
        assert_eq!(shared.progress.lock().current_count, 3);
    }

    #[test]
    fn test_stop_returns_stopped_copy_once() {
        let shared = SharedState::new(ProductionState::default());
        shared.run.lock().run_state = RunState::Paused;
        shared.order.write().configured = true;
        shared.progress.lock().current_count = 42;
        let now = Local.with_ymd_and_hms(2024, 2, 12, 10, 30, 0).unwrap();

        let stopped = shared.stop(now).unwrap();
        assert_eq!(stopped.run.run_state, RunState::Stopped);
        assert_eq!(stopped.run.ended_at, Some(now));
        assert!(!stopped.order.configured);
        assert_eq!(stopped.progress.current_count, 42);
        assert!(!shared.order.read().configured);

        assert!(shared.stop(now).is_none());
    }
}
