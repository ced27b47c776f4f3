// Sensor/Actuator port (counter input + flow gate output)
use crate::domain::GateState;
use async_trait::async_trait;
use thiserror::Error;

/// Gate actuation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("Failed to drive gate pin {pin}: {reason}")]
    WriteFailed { pin: u32, reason: String },

    #[error("Actuator unavailable: {0}")]
    Unavailable(String),
}

/// Digital line interface: one level-sensing counter input and one gate output
///
/// `read_counter_signal` is called from a tight polling loop and must not block.
#[async_trait]
pub trait LineIo: Send + Sync {
    /// Current level of the counter sensor (level, not edge)
    fn read_counter_signal(&self) -> bool;

    /// Drive the gate, then wait for it to settle
    async fn set_gate(&self, open: bool) -> Result<(), ActuatorError>;

    /// Last commanded gate state
    fn gate_state(&self) -> GateState;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Scripted line for tests
    ///
    /// Queued levels are returned one per read; once drained, the last level repeats.
    pub struct ScriptedLine {
        levels: Mutex<VecDeque<bool>>,
        level: AtomicBool,
        gate_open: AtomicBool,
        fail_gate: AtomicBool,
        gate_writes: Mutex<Vec<bool>>,
    }

    impl ScriptedLine {
        pub fn new() -> Self {
            Self {
                levels: Mutex::new(VecDeque::new()),
                level: AtomicBool::new(false),
                gate_open: AtomicBool::new(false),
                fail_gate: AtomicBool::new(false),
                gate_writes: Mutex::new(Vec::new()),
            }
        }

        /// Queue `count` low->high pulses (low, high pairs), ending low
        pub fn queue_pulses(&self, count: usize) {
            let mut levels = self.levels.lock();
            for _ in 0..count {
                levels.push_back(false);
                levels.push_back(true);
            }
            levels.push_back(false);
        }

        pub fn queue_levels(&self, levels: &[bool]) {
            self.levels.lock().extend(levels.iter().copied());
        }

        pub fn set_level(&self, high: bool) {
            self.levels.lock().clear();
            self.level.store(high, Ordering::SeqCst);
        }

        pub fn pending_levels(&self) -> usize {
            self.levels.lock().len()
        }

        pub fn fail_gate(&self, fail: bool) {
            self.fail_gate.store(fail, Ordering::SeqCst);
        }

        pub fn gate_writes(&self) -> Vec<bool> {
            self.gate_writes.lock().clone()
        }
    }

    impl Default for ScriptedLine {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LineIo for ScriptedLine {
        fn read_counter_signal(&self) -> bool {
            if let Some(next) = self.levels.lock().pop_front() {
                self.level.store(next, Ordering::SeqCst);
            }
            self.level.load(Ordering::SeqCst)
        }

        async fn set_gate(&self, open: bool) -> Result<(), ActuatorError> {
            if self.fail_gate.load(Ordering::SeqCst) {
                return Err(ActuatorError::Unavailable("scripted failure".to_string()));
            }
            self.gate_writes.lock().push(open);
            self.gate_open.store(open, Ordering::SeqCst);
            Ok(())
        }

        fn gate_state(&self) -> GateState {
            GateState::from_open(self.gate_open.load(Ordering::SeqCst))
        }
    }
}
