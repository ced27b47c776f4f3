// Production State Domain Model

use super::order::OrderInfo;
use super::series::ThroughputSeries;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Run state of the counting session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    #[default]
    Stopped,
    Counting,
    Paused,
}

impl RunState {
    /// Numeric code stored in history rows (0 stopped, 1 counting, 2 paused)
    pub fn code(self) -> i64 {
        match self {
            RunState::Stopped => 0,
            RunState::Counting => 1,
            RunState::Paused => 2,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Stopped => write!(f, "STOPPED"),
            RunState::Counting => write!(f, "COUNTING"),
            RunState::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Logical state of the flow gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    #[default]
    Closed,
    Open,
}

impl GateState {
    pub fn from_open(open: bool) -> Self {
        if open {
            GateState::Open
        } else {
            GateState::Closed
        }
    }

    pub fn code(self) -> i64 {
        match self {
            GateState::Closed => 0,
            GateState::Open => 1,
        }
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateState::Closed => write!(f, "CLOSED"),
            GateState::Open => write!(f, "OPEN"),
        }
    }
}

/// Progress counters group
///
/// `current_count` is only ever advanced by the counting task; commands reset it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current_count: u64,
    pub target_count: u64,
    pub breakage_count: u64,
}

impl Progress {
    /// Count at which the engine stops itself
    pub fn stop_threshold(&self) -> u64 {
        self.target_count.saturating_add(self.breakage_count)
    }

    pub fn target_reached(&self) -> bool {
        self.current_count >= self.stop_threshold()
    }
}

/// Run control group (written by commands only)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunControl {
    pub run_state: RunState,
    pub gate_state: GateState,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
    /// Raised by a pause, consumed by the next statistics sample
    pub pending_stoppage: bool,
    /// True only while a scheduled pause is in effect
    pub automatic_pause: bool,
}

/// Full production state, as owned value
///
/// The engine keeps each group behind its own lock; this struct is what a
/// reset installs and what a snapshot reads back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionState {
    pub order: OrderInfo,
    pub progress: Progress,
    pub run: RunControl,
    pub series: ThroughputSeries,
}
