// Status snapshot - read-only projection of the production state

use super::series::StoppageMarker;
use super::state::{GateState, ProductionState, RunState};
use chrono::{DateTime, Duration, Local};
use serde::Serialize;

/// Status snapshot consumed by the command surface and dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub taken_at: DateTime<Local>,

    // Order identity
    pub order_id: i64,
    pub order_label: String,
    pub article: String,
    pub description: String,
    pub nominal_rate: u32,
    pub configured: bool,

    // Progress
    pub current_count: u64,
    pub target_count: u64,
    pub breakage_count: u64,

    // Run control
    pub run_state: RunState,
    pub gate_state: GateState,
    pub automatic_pause: bool,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,

    // Throughput
    pub instant_rate: f64,
    pub average_rate: u64,
    pub estimated_completion: Option<DateTime<Local>>,
    pub rates: Vec<f64>,
    pub averages: Vec<u64>,
    pub time_labels: Vec<String>,
    pub cadences: Vec<u32>,
    pub stoppages: Vec<Option<StoppageMarker>>,
}

impl StatusSnapshot {
    pub fn project(state: ProductionState, now: DateTime<Local>) -> Self {
        let average_rate = state.series.session_average();
        let estimated_completion = estimate_completion(
            state.progress.target_count,
            state.progress.current_count,
            average_rate,
            state.run.run_state,
            now,
        );

        Self {
            taken_at: now,
            order_id: state.order.order_id,
            order_label: state.order.order_label,
            article: state.order.article,
            description: state.order.description,
            nominal_rate: state.order.nominal_rate,
            configured: state.order.configured,
            current_count: state.progress.current_count,
            target_count: state.progress.target_count,
            breakage_count: state.progress.breakage_count,
            run_state: state.run.run_state,
            gate_state: state.run.gate_state,
            automatic_pause: state.run.automatic_pause,
            started_at: state.run.started_at,
            ended_at: state.run.ended_at,
            instant_rate: state.series.instant_rate,
            average_rate,
            estimated_completion,
            rates: state.series.rates,
            averages: state.series.averages,
            time_labels: state.series.time_labels,
            cadences: state.series.cadences,
            stoppages: state.series.stoppages,
        }
    }
}

/// `now + ceil((target - current) * 60 / average_rate)` minutes, only while counting
pub fn estimate_completion(
    target: u64,
    current: u64,
    average_rate: u64,
    run_state: RunState,
    now: DateTime<Local>,
) -> Option<DateTime<Local>> {
    if average_rate == 0 || run_state != RunState::Counting {
        return None;
    }
    let remaining = target.saturating_sub(current);
    // Out-of-range targets yield no estimate rather than a wrapped one
    let minutes = remaining.checked_mul(60)?.div_ceil(average_rate);
    let minutes = i64::try_from(minutes).ok()?;
    now.checked_add_signed(Duration::try_minutes(minutes)?)
}
