// Session persistence port and order lookup port

use crate::domain::{
    GateState, OrderRecord, ProductionState, RunState, StoppageMarker,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Periodic progress record (one per statistics persistence interval)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialRecord {
    pub recorded_at: DateTime<Local>,
    pub order_id: i64,
    pub order_label: String,
    pub current_count: u64,
    pub target_count: u64,

    // History columns (latest value of each series)
    pub article: String,
    pub description: String,
    pub nominal_rate: u32,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
    pub breakage_count: u64,
    pub last_rate: Option<f64>,
    pub last_average: Option<u64>,
    pub last_cadence: Option<u32>,
    pub last_time_label: Option<String>,
    pub last_stoppage: Option<StoppageMarker>,
    pub gate_state: GateState,
    pub run_state: RunState,
    pub configured: bool,
}

impl PartialRecord {
    pub fn from_state(state: &ProductionState, recorded_at: DateTime<Local>) -> Self {
        let series = &state.series;
        Self {
            recorded_at,
            order_id: state.order.order_id,
            order_label: state.order.order_label.clone(),
            current_count: state.progress.current_count,
            target_count: state.progress.target_count,
            article: state.order.article.clone(),
            description: state.order.description.clone(),
            nominal_rate: state.order.nominal_rate,
            started_at: state.run.started_at,
            ended_at: state.run.ended_at,
            breakage_count: state.progress.breakage_count,
            last_rate: series.rates.last().copied(),
            last_average: series.last_average(),
            last_cadence: series.cadences.last().copied(),
            last_time_label: series.time_labels.last().cloned(),
            last_stoppage: series.stoppages.last().copied().flatten(),
            gate_state: state.run.gate_state,
            run_state: state.run.run_state,
            configured: state.order.configured,
        }
    }
}

/// Final figures written when a session stops
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub order_id: i64,
    pub order_label: String,
    pub final_count: u64,
    pub breakage_count: u64,
    /// Last rolling average (0 if no sample was taken)
    pub average_rate: u64,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
}

impl SessionSummary {
    pub fn from_state(state: &ProductionState) -> Self {
        Self {
            order_id: state.order.order_id,
            order_label: state.order.order_label.clone(),
            final_count: state.progress.current_count,
            breakage_count: state.progress.breakage_count,
            average_rate: state.series.last_average().unwrap_or(0),
            started_at: state.run.started_at,
            ended_at: state.run.ended_at,
        }
    }
}

/// Durable store for counting sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register the active session row for a freshly configured order
    async fn open_session(
        &self,
        order_label: &str,
        initial_quantity: u64,
        article: &str,
        opened_at: DateTime<Local>,
    ) -> Result<()>;

    /// Append a progress record (no uniqueness constraint)
    async fn append_partial_record(&self, record: &PartialRecord) -> Result<()>;

    /// Close the single active session matching the summary's order label
    async fn finalize_session(&self, summary: &SessionSummary) -> Result<()>;

    /// Mark every active session inactive; returns affected rows
    async fn deactivate_open_sessions(&self) -> Result<u64>;
}

/// Production order source (ERP / order database)
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn lookup_order(&self, order_label: &str) -> Result<Option<OrderRecord>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory store that records every call
    #[derive(Default)]
    pub struct RecordingStore {
        pub opened: Mutex<Vec<String>>,
        pub partials: Mutex<Vec<PartialRecord>>,
        pub finalized: Mutex<Vec<SessionSummary>>,
        pub deactivations: Mutex<u32>,
        pub orders: Mutex<HashMap<String, OrderRecord>>,
        fail_writes: AtomicBool,
    }

    impl RecordingStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every write fail with a persistence error
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn add_order(&self, label: impl Into<String>, record: OrderRecord) {
            self.orders.lock().insert(label.into(), record);
        }

        pub fn partial_count(&self) -> usize {
            self.partials.lock().len()
        }

        pub fn finalized(&self) -> Vec<SessionSummary> {
            self.finalized.lock().clone()
        }

        fn check(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Persistence("store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SessionStore for RecordingStore {
        async fn open_session(
            &self,
            order_label: &str,
            _initial_quantity: u64,
            _article: &str,
            _opened_at: DateTime<Local>,
        ) -> Result<()> {
            self.check()?;
            self.opened.lock().push(order_label.to_string());
            Ok(())
        }

        async fn append_partial_record(&self, record: &PartialRecord) -> Result<()> {
            self.check()?;
            self.partials.lock().push(record.clone());
            Ok(())
        }

        async fn finalize_session(&self, summary: &SessionSummary) -> Result<()> {
            self.check()?;
            self.finalized.lock().push(summary.clone());
            Ok(())
        }

        async fn deactivate_open_sessions(&self) -> Result<u64> {
            self.check()?;
            *self.deactivations.lock() += 1;
            Ok(0)
        }
    }

    #[async_trait]
    impl OrderSource for RecordingStore {
        async fn lookup_order(&self, order_label: &str) -> Result<Option<OrderRecord>> {
            Ok(self.orders.lock().get(order_label).cloned())
        }
    }
}
