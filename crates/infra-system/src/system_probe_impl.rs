// System probe implementation (resource watchdog)
// reason: sysinfo for cross-platform system monitoring
use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::System;
use tracing::debug;

use linecount_core::port::system_probe::{SystemMetrics, SystemProbe};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// System probe implementation using sysinfo
///
/// CPU usage is measured between consecutive calls, so the first sample reads low.
pub struct SystemProbeImpl {
    system: Mutex<System>,
}

impl SystemProbeImpl {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemProbeImpl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemProbe for SystemProbeImpl {
    async fn get_metrics(&self) -> SystemMetrics {
        let mut sys = self.system.lock();
        sys.refresh_cpu();
        sys.refresh_memory();

        let cpu_usage_percent = sys.global_cpu_info().cpu_usage();
        let memory_free_mb = sys.available_memory() / BYTES_PER_MB;
        let memory_total_mb = sys.total_memory() / BYTES_PER_MB;

        debug!(
            cpu = %cpu_usage_percent,
            mem_free_mb = %memory_free_mb,
            mem_total_mb = %memory_total_mb,
            "System metrics collected"
        );

        SystemMetrics {
            cpu_usage_percent,
            memory_free_mb,
            memory_total_mb,
        }
    }
}
