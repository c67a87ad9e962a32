//! Debouncing of watcher notifications
//!
//! A single file write can surface as several OS events, and a burst of
//! captures produces many more. The debouncer folds a burst into one batch so
//! a controller rescans once per burst instead of once per event.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::trace;

/// Configuration for the debouncer
#[derive(Debug, Clone)]
pub struct DebouncerConfig {
    /// Quiet period that ends a burst
    pub window: Duration,
    /// Maximum signals folded into one batch before it is emitted anyway
    pub max_batch_size: usize,
}

impl Default for DebouncerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(100),
            max_batch_size: 1000,
        }
    }
}

/// Trailing-edge debouncer over an unbounded channel
pub struct Debouncer<T> {
    config: DebouncerConfig,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Debouncer<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, config: DebouncerConfig) -> Self {
        Self { config, rx }
    }

    /// Wait for the next burst and return everything it contained.
    ///
    /// Returns `None` once every sender is gone and the channel is drained.
    pub async fn next_batch(&mut self) -> Option<Vec<T>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];

        if self.config.window.is_zero() {
            while let Ok(signal) = self.rx.try_recv() {
                batch.push(signal);
            }
            return Some(batch);
        }

        while batch.len() < self.config.max_batch_size {
            match timeout(self.config.window, self.rx.recv()).await {
                Ok(Some(signal)) => batch.push(signal),
                // Channel closed or quiet for a full window
                Ok(None) | Err(_) => break,
            }
        }

        trace!("Debounced burst of {} signals", batch.len());
        Some(batch)
    }
}
