pub mod rate_limiter;
pub mod worker;

pub use rate_limiter::SaveCooldown;
pub use worker::{ArchiveWorker, Outcome};

use tokio::sync::mpsc;

use crate::db::Origin;

/// A normalized URL waiting for the archive worker, with the message it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMessage {
    pub url: String,
    pub origin: Origin,
}

impl CandidateMessage {
    pub fn new(
        url: impl Into<String>,
        author: impl Into<String>,
        community: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            origin: Origin::new(author, community, channel),
        }
    }
}

pub type CandidateSender = mpsc::Sender<CandidateMessage>;
pub type CandidateReceiver = mpsc::Receiver<CandidateMessage>;

/// Create the bounded FIFO between ingress and the worker.
///
/// Senders wait for space when the queue is full; nothing is dropped.
#[must_use]
pub fn candidate_queue(capacity: usize) -> (CandidateSender, CandidateReceiver) {
    mpsc::channel(capacity.max(1))
}
