// System resource monitoring port (watchdog)
use async_trait::async_trait;

/// System resource metrics
#[derive(Debug, Clone)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_free_mb: u64,
    pub memory_total_mb: u64,
}

/// System probe port for resource monitoring
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Get current system metrics
    async fn get_metrics(&self) -> SystemMetrics;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;

    /// Mock SystemProbe for testing
    pub struct MockSystemProbe {
        metrics: Mutex<SystemMetrics>,
    }

    impl MockSystemProbe {
        pub fn new(cpu_usage_percent: f32, memory_free_mb: u64) -> Self {
            Self {
                metrics: Mutex::new(SystemMetrics {
                    cpu_usage_percent,
                    memory_free_mb,
                    memory_total_mb: 1024,
                }),
            }
        }

        pub fn set_cpu_usage(&self, cpu_usage_percent: f32) {
            self.metrics.lock().cpu_usage_percent = cpu_usage_percent;
        }
    }

    #[async_trait]
    impl SystemProbe for MockSystemProbe {
        async fn get_metrics(&self) -> SystemMetrics {
            self.metrics.lock().clone()
        }
    }
}
