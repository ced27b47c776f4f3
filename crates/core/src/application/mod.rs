// Application Layer - Counting engine and its background tasks

pub mod counting;
pub mod engine;
pub mod schedule;
pub mod setup;
pub mod statistics;
pub mod watchdog;

// Re-exports
pub use counting::{CountStep, EdgeCounter};
pub use engine::{
    shutdown_channel, BackgroundTasks, CountingEngine, EngineConfig, ShutdownSender,
    ShutdownToken, TaskFailure, TaskFailures, TaskKind,
};
pub use schedule::{PauseOccurrences, PauseSchedule, PauseTrigger};
pub use statistics::{StatisticsSampler, StatisticsTick};
pub use watchdog::{ResourceAlert, ResourceWatchdog, WatchdogConfig};
