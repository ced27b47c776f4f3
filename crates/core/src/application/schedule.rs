// Scheduled pause - wall-clock triggers (lunch break, end of shift)

use crate::application::engine::{CountingEngine, ShutdownToken, TaskKind};
use crate::domain::{DomainError, RunState};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{error, info};

/// A wall-clock minute at which counting is paused automatically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseTrigger {
    pub label: String,
    pub at: NaiveTime,
}

impl PauseTrigger {
    pub fn new(label: impl Into<String>, hour: u32, minute: u32) -> Result<Self, DomainError> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            DomainError::ValidationError(format!("invalid pause time {:02}:{:02}", hour, minute))
        })?;
        Ok(Self {
            label: label.into(),
            at,
        })
    }

    /// Parse an `HH:MM` trigger time
    pub fn parse(label: impl Into<String>, time: &str) -> Result<Self, DomainError> {
        let at = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|e| {
            DomainError::ValidationError(format!("invalid pause time '{}': {}", time, e))
        })?;
        Ok(Self {
            label: label.into(),
            at,
        })
    }

    /// Minute-granularity match
    pub fn matches(&self, time: NaiveTime) -> bool {
        self.at.hour() == time.hour() && self.at.minute() == time.minute()
    }
}

/// Configured pause triggers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseSchedule {
    triggers: Vec<PauseTrigger>,
}

impl PauseSchedule {
    pub fn new(triggers: Vec<PauseTrigger>) -> Self {
        Self { triggers }
    }

    pub fn triggers(&self) -> &[PauseTrigger] {
        &self.triggers
    }

    pub fn matching(&self, time: NaiveTime) -> Option<&PauseTrigger> {
        self.triggers.iter().find(|t| t.matches(time))
    }
}

impl Default for PauseSchedule {
    fn default() -> Self {
        Self {
            triggers: vec![
                PauseTrigger {
                    label: "lunch break".to_string(),
                    at: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(),
                },
                PauseTrigger {
                    label: "end of shift".to_string(),
                    at: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
                },
            ],
        }
    }
}

/// Triggers that already fired, keyed by calendar day
///
/// Only the current day is retained.
#[derive(Debug, Default)]
pub struct PauseOccurrences {
    fired: HashSet<(NaiveDate, NaiveTime)>,
}

impl PauseOccurrences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the occurrence; false if it already fired today
    pub fn claim(&mut self, date: NaiveDate, at: NaiveTime) -> bool {
        self.fired.retain(|(day, _)| *day == date);
        self.fired.insert((date, at))
    }
}

impl CountingEngine {
    /// Check the schedule at `now`; returns the trigger that paused counting, if any
    pub async fn scheduled_pause_tick(
        &self,
        occurrences: &mut PauseOccurrences,
        now: DateTime<Local>,
    ) -> Option<PauseTrigger> {
        let trigger = self.config().pause_schedule.matching(now.time())?.clone();

        {
            let mut run = self.inner().state.run.lock();
            if run.run_state != RunState::Counting || run.automatic_pause {
                return None;
            }
            if !occurrences.claim(now.date_naive(), trigger.at) {
                return None;
            }
            run.automatic_pause = true;
        }

        info!(trigger = %trigger.label, at = %trigger.at.format("%H:%M"), "Scheduled pause");
        if let Err(e) = self.pause_counting().await {
            error!(trigger = %trigger.label, error = %e, "Scheduled pause could not close the gate");
            self.record_failure(TaskKind::ScheduledPause, e.to_string());
        }
        Some(trigger)
    }
}

/// Scheduled-pause task body
pub(crate) async fn run_scheduled_pause_loop(engine: CountingEngine, mut shutdown: ShutdownToken) {
    let poll = engine.config().schedule_poll_interval;
    let mut occurrences = PauseOccurrences::new();
    info!(
        triggers = engine.config().pause_schedule.triggers().len(),
        poll_secs = poll.as_secs(),
        "Scheduled pause task started"
    );

    loop {
        if shutdown.is_shutdown() {
            break;
        }
        let now = engine.inner().clock.now();
        engine.scheduled_pause_tick(&mut occurrences, now).await;
        if shutdown.sleep_or_shutdown(poll).await {
            break;
        }
    }

    info!("Scheduled pause task stopped");
}
