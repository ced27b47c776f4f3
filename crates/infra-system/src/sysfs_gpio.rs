// Sysfs GPIO line adapter
// reason: plain file I/O on /sys/class/gpio, no board-specific crate needed
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use linecount_core::application::engine::constants::GATE_SETTLE_DELAY;
use linecount_core::domain::GateState;
use linecount_core::port::{ActuatorError, LineIo};

/// Default BCM pin of the counter sensor
pub const DEFAULT_COUNTER_PIN: u32 = 22;

/// Default BCM pin driving the gate
pub const DEFAULT_GATE_PIN: u32 = 23;

#[derive(Debug, Clone)]
pub struct GpioConfig {
    /// sysfs root (normally `/sys/class/gpio`)
    pub base_path: PathBuf,
    pub counter_pin: u32,
    pub gate_pin: u32,
    pub settle_delay: Duration,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/sys/class/gpio"),
            counter_pin: DEFAULT_COUNTER_PIN,
            gate_pin: DEFAULT_GATE_PIN,
            settle_delay: GATE_SETTLE_DELAY,
        }
    }
}

/// Counter input + gate output through the sysfs GPIO interface
pub struct SysfsGpio {
    config: GpioConfig,
    counter_value: PathBuf,
    gate_value: PathBuf,
    gate_open: AtomicBool,
    // Logged once per failure streak; the counter is read every poll
    read_failing: AtomicBool,
}

impl SysfsGpio {
    /// Export both pins, set directions and drive the gate closed
    pub fn open(config: GpioConfig) -> Result<Self, ActuatorError> {
        export_pin(&config.base_path, config.counter_pin, "in")?;
        export_pin(&config.base_path, config.gate_pin, "out")?;

        let counter_value = pin_dir(&config.base_path, config.counter_pin).join("value");
        let gate_value = pin_dir(&config.base_path, config.gate_pin).join("value");

        std::fs::write(&gate_value, "0").map_err(|e| ActuatorError::WriteFailed {
            pin: config.gate_pin,
            reason: e.to_string(),
        })?;

        info!(
            counter_pin = config.counter_pin,
            gate_pin = config.gate_pin,
            base = %config.base_path.display(),
            "GPIO line opened, gate closed"
        );

        Ok(Self {
            config,
            counter_value,
            gate_value,
            gate_open: AtomicBool::new(false),
            read_failing: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl LineIo for SysfsGpio {
    fn read_counter_signal(&self) -> bool {
        match std::fs::read(&self.counter_value) {
            Ok(raw) => {
                if self.read_failing.swap(false, Ordering::Relaxed) {
                    info!(pin = self.config.counter_pin, "Counter input readable again");
                }
                raw.first() == Some(&b'1')
            }
            Err(e) => {
                if !self.read_failing.swap(true, Ordering::Relaxed) {
                    warn!(pin = self.config.counter_pin, error = %e, "Counter input read failed");
                }
                false
            }
        }
    }

    async fn set_gate(&self, open: bool) -> Result<(), ActuatorError> {
        let level = if open { "1" } else { "0" };
        tokio::fs::write(&self.gate_value, level)
            .await
            .map_err(|e| ActuatorError::WriteFailed {
                pin: self.config.gate_pin,
                reason: e.to_string(),
            })?;
        self.gate_open.store(open, Ordering::SeqCst);
        tokio::time::sleep(self.config.settle_delay).await;
        Ok(())
    }

    fn gate_state(&self) -> GateState {
        GateState::from_open(self.gate_open.load(Ordering::SeqCst))
    }
}

fn pin_dir(base: &Path, pin: u32) -> PathBuf {
    base.join(format!("gpio{}", pin))
}

fn export_pin(base: &Path, pin: u32, direction: &str) -> Result<(), ActuatorError> {
    let dir = pin_dir(base, pin);
    if !dir.exists() {
        std::fs::write(base.join("export"), pin.to_string()).map_err(|e| {
            ActuatorError::Unavailable(format!("cannot export gpio{}: {}", pin, e))
        })?;
    }
    std::fs::write(dir.join("direction"), direction).map_err(|e| ActuatorError::WriteFailed {
        pin,
        reason: format!("direction: {}", e),
    })
}
