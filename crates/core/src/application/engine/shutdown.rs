// Background task shutdown token

use std::time::Duration;
use tokio::sync::watch;

/// Shutdown signal shared by the engine's background tasks
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested (cheap, safe from blocking threads)
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        // A dropped sender also means nobody will ever drive the tasks again
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `period` unless shutdown arrives first; returns true on shutdown
    pub async fn sleep_or_shutdown(&mut self, period: Duration) -> bool {
        let interrupted = tokio::select! {
            _ = tokio::time::sleep(period) => false,
            _ = self.wait() => true,
        };
        interrupted || self.is_shutdown()
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to all tasks
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_returns_false_without_signal() {
        let (_tx, mut token) = shutdown_channel();
        assert!(!token.sleep_or_shutdown(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_signal_interrupts_long_sleep() {
        let (tx, mut token) = shutdown_channel();
        let waiter = tokio::spawn(async move { token.sleep_or_shutdown(Duration::from_secs(60)).await });
        tx.shutdown();
        let interrupted = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("sleep should be interrupted")
            .unwrap();
        assert!(interrupted);
    }

    #[test]
    fn test_token_visible_from_plain_thread() {
        let (tx, token) = shutdown_channel();
        let clone = token.clone();
        tx.shutdown();
        assert!(std::thread::spawn(move || clone.is_shutdown()).join().unwrap());
    }
}
