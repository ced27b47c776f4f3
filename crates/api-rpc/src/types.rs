//! RPC Request/Response Types

use linecount_core::application::TaskKind;
use linecount_core::domain::{GateState, OrderSetup, RunState, StatusSnapshot};
use serde::{Deserialize, Serialize};

/// line.configure.v1 - Look up an order and configure the counter
#[derive(Debug, Deserialize)]
pub struct ConfigureRequest {
    pub order_label: String,
    pub target: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigureResponse {
    pub order_id: i64,
    pub order_label: String,
    pub article: String,
    pub description: String,
    pub nominal_rate: u32,
    pub target: u64,
}

impl From<OrderSetup> for ConfigureResponse {
    fn from(setup: OrderSetup) -> Self {
        Self {
            order_id: setup.order_id,
            order_label: setup.order_label,
            article: setup.article,
            description: setup.description,
            nominal_rate: setup.nominal_rate,
            target: setup.target_count,
        }
    }
}

/// counting.breakage.v1 - Record rejected units
#[derive(Debug, Deserialize)]
pub struct BreakageRequest {
    pub quantity: u64,
}

/// gate.set.v1 - Drive the gate directly
#[derive(Debug, Deserialize)]
pub struct GateRequest {
    pub open: bool,
}

/// Result of every run-control command
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub run_state: RunState,
    pub gate_state: GateState,
    pub current_count: u64,
    pub stop_threshold: u64,
}

/// Absorbed background failures per task
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailureCount {
    pub task: TaskKind,
    pub count: u64,
}

/// line.status.v1
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: StatusSnapshot,
    pub task_failures: Vec<TaskFailureCount>,
}
