// Port Layer - Interfaces for external dependencies

pub mod line_io;
pub mod session_store;
pub mod system_probe;
pub mod time_provider;

// Re-exports
pub use line_io::{ActuatorError, LineIo};
pub use session_store::{OrderSource, PartialRecord, SessionStore, SessionSummary};
pub use system_probe::{SystemMetrics, SystemProbe};
pub use time_provider::TimeProvider;
