// Time Provider Port (for testability)

use chrono::{DateTime, Local};

/// Wall-clock provider (allows fixed clocks in tests)
///
/// Interval measurements inside the engine use `std::time::Instant`; this port
/// only supplies timestamps, time labels and the scheduled-pause clock.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;

    /// Settable clock
    pub struct FixedTimeProvider {
        now: Mutex<DateTime<Local>>,
    }

    impl FixedTimeProvider {
        pub fn new(now: DateTime<Local>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Local>) {
            *self.now.lock() = now;
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock();
            *now += by;
        }
    }

    impl TimeProvider for FixedTimeProvider {
        fn now(&self) -> DateTime<Local> {
            *self.now.lock()
        }
    }
}
