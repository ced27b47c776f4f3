// Engine timing constants (no magic values in the task loops)
use crate::application::schedule::PauseSchedule;
use std::time::Duration;

/// Counter sensor poll interval (100µs)
pub const COUNTER_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Buffered edges that force a flush into the current count
pub const FLUSH_BATCH_SIZE: u64 = 10;

/// Maximum time buffered edges wait before being flushed (1s)
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Statistics task wake-up period (1s)
pub const STATS_TICK: Duration = Duration::from_secs(1);

/// Minimum spacing between throughput samples (10s)
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// Minimum spacing between partial-record writes (10s)
pub const PERSIST_INTERVAL: Duration = Duration::from_secs(10);

/// Scheduled-pause wall-clock poll period (30s, must stay below one minute)
pub const SCHEDULE_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Bounded wait for background tasks on shutdown (5s)
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Settle delay after each gate actuation (100ms), used by line adapters
pub const GATE_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Resource watchdog period (1 minute)
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);

/// CPU usage above which the watchdog warns (percent)
pub const WATCHDOG_CPU_THRESHOLD: f32 = 90.0;

/// Free memory below which the watchdog warns (MB)
pub const WATCHDOG_MIN_FREE_MEMORY_MB: u64 = 50;

/// Entries kept in the per-task failure log
pub const TASK_FAILURE_LOG_CAPACITY: usize = 64;

/// Tunable engine parameters (defaults are the constants above)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub counter_poll_interval: Duration,
    pub flush_batch_size: u64,
    pub flush_interval: Duration,
    pub stats_tick: Duration,
    pub sample_interval: Duration,
    pub persist_interval: Duration,
    pub schedule_poll_interval: Duration,
    pub pause_schedule: PauseSchedule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            counter_poll_interval: COUNTER_POLL_INTERVAL,
            flush_batch_size: FLUSH_BATCH_SIZE,
            flush_interval: FLUSH_INTERVAL,
            stats_tick: STATS_TICK,
            sample_interval: SAMPLE_INTERVAL,
            persist_interval: PERSIST_INTERVAL,
            schedule_poll_interval: SCHEDULE_POLL_INTERVAL,
            pause_schedule: PauseSchedule::default(),
        }
    }
}
