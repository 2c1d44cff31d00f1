//! Spacing between consecutive save requests.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Enforces a minimum interval between save requests.
///
/// The worker calls [`cooldown`](Self::cooldown) after every submission, so
/// lookups and cache hits that follow are never delayed by anything but the
/// submission right before them.
#[derive(Debug)]
pub struct SaveCooldown {
    interval: Duration,
    last_save: Option<Instant>,
}

impl SaveCooldown {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_save: None,
        }
    }

    /// Note that a save request was just issued.
    pub fn mark_saved(&mut self) {
        self.last_save = Some(Instant::now());
    }

    /// Time left before another save may be issued.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.last_save.map_or(Duration::ZERO, |at| {
            (at + self.interval).saturating_duration_since(Instant::now())
        })
    }

    /// Sleep out the rest of the interval since the last save.
    ///
    /// Returns `false` if `shutdown` fired first.
    pub async fn cooldown(&self, shutdown: &CancellationToken) -> bool {
        let Some(at) = self.last_save else {
            return true;
        };

        tokio::select! {
            () = sleep_until(at + self.interval) => true,
            () = shutdown.cancelled() => false,
        }
    }
}
