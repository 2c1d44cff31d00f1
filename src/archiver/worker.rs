use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::rate_limiter::SaveCooldown;
use super::{CandidateMessage, CandidateReceiver};
use crate::config::Config;
use crate::db::{lookup_url, record_outcome, Database};
use crate::wayback::{ArchiveService, WaybackClient};

/// Terminal state of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already in the cache with this status; nothing was called or written.
    Seen(i64),
    /// The archive service already had a good snapshot; recorded without saving.
    Skipped(i64),
    /// A save was requested and its status recorded, whatever it was.
    Saved(i64),
}

/// Single consumer of the candidate queue.
///
/// Processes one candidate at a time, so there is never more than one save
/// request in flight. The cache's unique URL constraint is the only dedup.
pub struct ArchiveWorker<S = WaybackClient> {
    db: Database,
    service: S,
    cooldown: SaveCooldown,
}

impl<S: ArchiveService> ArchiveWorker<S> {
    /// Create a new archive worker.
    pub fn new(config: &Config, db: Database, service: S) -> Self {
        Self {
            db,
            service,
            cooldown: SaveCooldown::new(config.save_interval),
        }
    }

    /// Drive one candidate through cache lookup, availability check, save and record.
    ///
    /// # Errors
    ///
    /// Returns an error only when the cache cannot be read or written.
    pub async fn process(&mut self, candidate: &CandidateMessage) -> Result<Outcome> {
        let url = candidate.url.as_str();

        if let Some(status) = lookup_url(self.db.pool(), url).await? {
            debug!(status, url = %url, "SEEN");
            return Ok(Outcome::Seen(status));
        }

        let availability = self.service.check_availability(url).await;
        if availability.is_usable_snapshot() {
            let status = i64::from(availability.status_code);
            self.record(candidate, status).await?;
            info!(status, url = %url, "SKIP");
            return Ok(Outcome::Skipped(status));
        }

        let status = i64::from(self.service.submit_archive(url).await);
        self.cooldown.mark_saved();
        // Failures are recorded too, so a URL the service keeps rejecting is not retried
        self.record(candidate, status).await?;
        info!(status, url = %url, "SAVE");

        Ok(Outcome::Saved(status))
    }

    async fn record(&self, candidate: &CandidateMessage, status: i64) -> Result<()> {
        let inserted = record_outcome(self.db.pool(), &candidate.url, &candidate.origin, status)
            .await
            .with_context(|| format!("Failed to record outcome for {}", candidate.url))?;
        if !inserted {
            debug!(url = %candidate.url, "Already recorded by an earlier candidate");
        }
        Ok(())
    }

    /// Run the worker loop until shutdown or until every sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns the first cache failure. Continuing past one would break the
    /// one-archive-per-URL guarantee, so the caller should treat it as fatal.
    pub async fn run(
        mut self,
        mut queue: CandidateReceiver,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("Archive worker started");

        loop {
            let candidate = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Archive worker shutting down");
                    return Ok(());
                }
                next = queue.recv() => match next {
                    Some(candidate) => candidate,
                    None => {
                        info!("Candidate queue closed, archive worker exiting");
                        return Ok(());
                    }
                },
            };

            let outcome = self.process(&candidate).await?;

            if matches!(outcome, Outcome::Saved(_)) {
                let wait = self.cooldown.remaining();
                debug!(wait_ms = wait.as_millis() as u64, "Cooling down before next save");
                if !self.cooldown.cooldown(&shutdown).await {
                    info!("Archive worker shutting down during save cooldown");
                    return Ok(());
                }
            }
        }
    }
}
