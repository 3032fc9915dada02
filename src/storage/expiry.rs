//! Background Expiry Sweeper
//!
//! Items are dropped lazily when a lookup or slot touches them after their
//! expiration or after a flush deadline. Items nobody touches again would stay
//! resident and keep counting against the memory limit, so this task
//! periodically reclaims them.
//!
//! ## Adaptive Frequency
//!
//! ```text
//!   reclaimed / items > speedup_threshold   ──>  interval / 2  (>= min_interval)
//!   nothing reclaimed                       ──>  interval * 2  (<= max_interval)
//! ```

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps (default: 1s)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 100ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 10s)
    pub max_interval: Duration,

    /// If this fraction of stored items was reclaimed, speed up sweeping
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        // Expiration times have one-second resolution
        Self {
            base_interval: Duration::from_secs(1),
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(10),
            speedup_threshold: 0.25,
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use flashmc::storage::{StorageEngine, ExpirySweeper, ExpiryConfig};
    /// use std::sync::Arc;
    ///
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(engine, ExpiryConfig::default());
    ///
    /// // Dropping the sweeper will stop it
    /// drop(sweeper);
    /// ```
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let items_before = engine.len();
        let reclaimed = engine.cleanup_expired();

        current_interval = next_interval(&config, current_interval, items_before, reclaimed);

        if reclaimed > 0 {
            debug!(
                reclaimed,
                items_remaining = engine.len(),
                used_memory = engine.used_memory(),
                next_sweep_ms = current_interval.as_millis() as u64,
                "Reclaimed stale items"
            );
        } else {
            trace!(
                next_sweep_ms = current_interval.as_millis() as u64,
                "Nothing to reclaim"
            );
        }
    }
}

/// Picks the next sweep interval from the last sweep's yield.
fn next_interval(
    config: &ExpiryConfig,
    current: Duration,
    items_before: u64,
    reclaimed: u64,
) -> Duration {
    if reclaimed == 0 {
        return (current * 2).min(config.max_interval);
    }

    let rate = reclaimed as f64 / items_before.max(1) as f64;
    if rate > config.speedup_threshold {
        (current / 2).max(config.min_interval)
    } else {
        current
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
