//! Graceful shutdown and cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::sleep;
use tracing::info;

const CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Shared running flag; clones observe and trigger the same shutdown
#[derive(Clone)]
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
}

impl ShutdownManager {
    /// Create a new shutdown manager with running state
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn a Ctrl+C signal handler that triggers shutdown
    pub fn spawn_signal_handler(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal (Ctrl+C), shutting down gracefully");
                this.cancel();
            }
        });
    }

    /// Stop every loop and batch job sharing this manager
    pub fn cancel(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep for a duration, but wake early if shutdown is triggered.
    ///
    /// Returns false when woken by shutdown.
    pub async fn interruptible_sleep(&self, duration: Duration) -> bool {
        let mut elapsed = Duration::ZERO;

        while elapsed < duration && self.is_running() {
            let step = CHECK_INTERVAL.min(duration - elapsed);
            sleep(step).await;
            elapsed += step;
        }
        self.is_running()
    }

    /// Resolves once shutdown is triggered
    pub async fn cancelled(&self) {
        while self.is_running() {
            sleep(CHECK_INTERVAL).await;
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_cancel_is_shared_between_clones() {
        let shutdown = ShutdownManager::new();
        let other = shutdown.clone();
        assert!(other.is_running());

        shutdown.cancel();
        assert!(!other.is_running());
        // Already cancelled, returns immediately
        other.cancelled().await;
    }

    #[tokio::test]
    async fn test_sleep_wakes_on_cancel() {
        let shutdown = ShutdownManager::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let completed = shutdown.interruptible_sleep(Duration::from_secs(30)).await;
        assert!(!completed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_short_sleep_completes() {
        let shutdown = ShutdownManager::new();
        assert!(shutdown.interruptible_sleep(Duration::from_millis(20)).await);
    }
}
