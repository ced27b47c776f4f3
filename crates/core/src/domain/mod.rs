// Domain Layer - Production state, orders and throughput series

pub mod error;
pub mod order;
pub mod series;
pub mod snapshot;
pub mod state;

// Re-exports
pub use error::DomainError;
pub use order::{OrderInfo, OrderRecord, OrderSetup, DEFAULT_NOMINAL_RATE};
pub use series::{RateSample, StoppageMarker, ThroughputSeries, ROLLING_WINDOW};
pub use snapshot::StatusSnapshot;
pub use state::{GateState, ProductionState, Progress, RunControl, RunState};
