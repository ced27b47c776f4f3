// Resource Watchdog
// Periodic CPU / memory check; restarts are left to the process supervisor

use crate::application::engine::constants::{
    WATCHDOG_CPU_THRESHOLD, WATCHDOG_INTERVAL, WATCHDOG_MIN_FREE_MEMORY_MB,
};
use crate::application::engine::ShutdownToken;
use crate::port::{SystemMetrics, SystemProbe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Threshold violation found in one sample
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceAlert {
    HighCpu { usage_percent: f32 },
    LowMemory { free_mb: u64 },
}

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub interval: Duration,
    pub cpu_threshold_percent: f32,
    pub min_free_memory_mb: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: WATCHDOG_INTERVAL,
            cpu_threshold_percent: WATCHDOG_CPU_THRESHOLD,
            min_free_memory_mb: WATCHDOG_MIN_FREE_MEMORY_MB,
        }
    }
}

/// Resource watchdog
///
/// Samples the system probe every `interval` and logs a warning per alert.
pub struct ResourceWatchdog {
    probe: Arc<dyn SystemProbe>,
    config: WatchdogConfig,
}

impl ResourceWatchdog {
    pub fn new(probe: Arc<dyn SystemProbe>, config: WatchdogConfig) -> Self {
        Self { probe, config }
    }

    /// Compare one sample against the thresholds
    pub fn assess(&self, metrics: &SystemMetrics) -> Vec<ResourceAlert> {
        let mut alerts = Vec::new();
        if metrics.cpu_usage_percent > self.config.cpu_threshold_percent {
            alerts.push(ResourceAlert::HighCpu {
                usage_percent: metrics.cpu_usage_percent,
            });
        }
        if metrics.memory_free_mb < self.config.min_free_memory_mb {
            alerts.push(ResourceAlert::LowMemory {
                free_mb: metrics.memory_free_mb,
            });
        }
        alerts
    }

    /// Sample once and log
    pub async fn check_now(&self) -> Vec<ResourceAlert> {
        let metrics = self.probe.get_metrics().await;
        let alerts = self.assess(&metrics);

        for alert in &alerts {
            match alert {
                ResourceAlert::HighCpu { usage_percent } => warn!(
                    cpu_percent = usage_percent,
                    threshold = self.config.cpu_threshold_percent,
                    "High CPU usage"
                ),
                ResourceAlert::LowMemory { free_mb } => warn!(
                    free_mb,
                    threshold_mb = self.config.min_free_memory_mb,
                    "Low free memory"
                ),
            }
        }
        if alerts.is_empty() {
            debug!(
                cpu_percent = metrics.cpu_usage_percent,
                free_mb = metrics.memory_free_mb,
                total_mb = metrics.memory_total_mb,
                "Resources nominal"
            );
        }
        alerts
    }

    /// Run until shutdown (spawn with `tokio::spawn`)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            cpu_threshold = self.config.cpu_threshold_percent,
            min_free_mb = self.config.min_free_memory_mb,
            "Resource watchdog started"
        );

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            self.check_now().await;
            if shutdown.sleep_or_shutdown(self.config.interval).await {
                break;
            }
        }

        info!("Resource watchdog stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::shutdown_channel;
    use crate::port::system_probe::mocks::MockSystemProbe;

    #[tokio::test]
    async fn test_nominal_resources_raise_nothing() {
        let watchdog = ResourceWatchdog::new(
            Arc::new(MockSystemProbe::new(35.0, 512)),
            WatchdogConfig::default(),
        );
        assert!(watchdog.check_now().await.is_empty());
    }

    #[tokio::test]
    async fn test_high_cpu_and_low_memory() {
        let probe = Arc::new(MockSystemProbe::new(95.5, 20));
        let watchdog = ResourceWatchdog::new(probe.clone(), WatchdogConfig::default());

        let alerts = watchdog.check_now().await;
        assert_eq!(
            alerts,
            vec![
                ResourceAlert::HighCpu { usage_percent: 95.5 },
                ResourceAlert::LowMemory { free_mb: 20 },
            ]
        );

        // Exactly at the threshold is not an alert
        probe.set_cpu_usage(90.0);
        assert_eq!(watchdog.check_now().await, vec![ResourceAlert::LowMemory { free_mb: 20 }]);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let watchdog = ResourceWatchdog::new(
            Arc::new(MockSystemProbe::new(10.0, 512)),
            WatchdogConfig {
                interval: Duration::from_secs(3600),
                ..WatchdogConfig::default()
            },
        );
        let (tx, token) = shutdown_channel();
        let handle = tokio::spawn(watchdog.run(token));

        tx.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watchdog should stop promptly")
            .unwrap();
    }
}
