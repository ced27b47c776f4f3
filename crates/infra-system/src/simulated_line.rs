// Simulated line (bench runs without hardware)
// Items pass the sensor at a nominal rate with random spacing, only while the gate is open
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use linecount_core::domain::GateState;
use linecount_core::port::{ActuatorError, LineIo};

/// Relative jitter applied to each half period
const JITTER: f64 = 0.2;

struct Signal {
    level: bool,
    next_toggle: Instant,
}

pub struct SimulatedLine {
    half_period: Duration,
    signal: Mutex<Signal>,
    gate_open: AtomicBool,
}

impl SimulatedLine {
    /// `units_per_hour` items pass the sensor while the gate is open
    pub fn new(units_per_hour: u32) -> Self {
        let per_item = 3600.0 / f64::from(units_per_hour.max(1));
        Self {
            half_period: Duration::from_secs_f64(per_item / 2.0),
            signal: Mutex::new(Signal {
                level: false,
                next_toggle: Instant::now(),
            }),
            gate_open: AtomicBool::new(false),
        }
    }

    fn jittered(&self) -> Duration {
        let factor = rand::thread_rng().gen_range((1.0 - JITTER)..=(1.0 + JITTER));
        self.half_period.mul_f64(factor)
    }
}

#[async_trait]
impl LineIo for SimulatedLine {
    fn read_counter_signal(&self) -> bool {
        let now = Instant::now();
        let mut signal = self.signal.lock();

        if !self.gate_open.load(Ordering::Relaxed) {
            signal.level = false;
            signal.next_toggle = now;
            return false;
        }
        if now >= signal.next_toggle {
            signal.level = !signal.level;
            signal.next_toggle = now + self.jittered();
        }
        signal.level
    }

    async fn set_gate(&self, open: bool) -> Result<(), ActuatorError> {
        self.gate_open.store(open, Ordering::SeqCst);
        debug!(open, "Simulated gate actuated");
        Ok(())
    }

    fn gate_state(&self) -> GateState {
        GateState::from_open(self.gate_open.load(Ordering::SeqCst))
    }
}
