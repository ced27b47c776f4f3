// Line Counter Infrastructure - System Adapters
// Implements: LineIo (sysfs GPIO, simulated), SystemProbe

pub mod simulated_line;
pub mod sysfs_gpio;
pub mod system_probe_impl;

pub use simulated_line::SimulatedLine;
pub use sysfs_gpio::{GpioConfig, SysfsGpio, DEFAULT_COUNTER_PIN, DEFAULT_GATE_PIN};
pub use system_probe_impl::SystemProbeImpl;
