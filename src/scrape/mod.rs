//! Sequential scrape drivers: identifiers, title metadata, reviews.
//!
//! All three drivers share the same shape: a synchronous loop over pending
//! entities, a jittered delay between requests as the sole throttle, and
//! whole-file checkpoints for resume. Per-entity failures are logged and the
//! entity stays pending for the next run.

pub mod ids;
pub mod metadata;
pub mod page;
pub mod reviews;

use crate::clients::imdb::random_delay;

/// Inter-request delay bounds in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct DelayBounds {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayBounds {
    /// Sleeps for a uniformly sampled duration, applied unconditionally
    /// between requests regardless of outcome.
    pub async fn wait(self) {
        let delay = random_delay(self.min_ms, self.max_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
