//! Thin adapter from chat messages to the candidate queue.
//!
//! Messages arrive as JSON lines, one message per line, from whatever bridge
//! is connected to the chat platform.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::admission::UrlFilter;
use crate::archiver::{CandidateMessage, CandidateSender};
use crate::config::Config;

/// A chat message as delivered by the platform bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub author: String,
    /// Server/guild id; empty for direct messages.
    #[serde(default)]
    pub community: String,
    pub channel: String,
}

/// Producer side of the pipeline.
pub struct Ingress {
    filter: UrlFilter,
    queue: CandidateSender,
    log_message_content: bool,
}

impl Ingress {
    #[must_use]
    pub fn new(config: &Config, filter: UrlFilter, queue: CandidateSender) -> Self {
        Self {
            filter,
            queue,
            log_message_content: config.log_message_content,
        }
    }

    /// Queue every admitted URL in the message, in order of appearance.
    ///
    /// Waits for queue space, so a full queue slows ingestion instead of
    /// dropping URLs. Returns the number of candidates queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker side of the queue is gone.
    pub async fn enqueue(&self, message: &ChatMessage) -> Result<usize> {
        if self.log_message_content {
            info!(
                author = %message.author,
                channel = %message.channel,
                content = %message.content,
                "Message received"
            );
        }

        let urls = self.filter.extract_candidates(&message.content);
        let count = urls.len();

        for url in urls {
            let candidate = CandidateMessage::new(
                url,
                message.author.as_str(),
                message.community.as_str(),
                message.channel.as_str(),
            );
            self.queue
                .send(candidate)
                .await
                .context("Candidate queue closed")?;
        }

        if count > 0 {
            debug!(count, channel = %message.channel, "Queued candidate URLs");
        }
        Ok(count)
    }

    /// Consume JSON-line messages until end of input or shutdown.
    ///
    /// Lines that are not valid messages are logged and skipped. Returns the
    /// total number of candidates queued.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the queue is closed.
    pub async fn run_reader<R>(&self, reader: R, shutdown: &CancellationToken) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut queued = 0;

        loop {
            let line = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                line = lines.next_line() => line.context("Failed to read message line")?,
            };
            let Some(line) = line else {
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<ChatMessage>(line) {
                Ok(message) => queued += self.enqueue(&message).await?,
                Err(e) => warn!(error = %e, "Skipping malformed message line"),
            }
        }

        Ok(queued)
    }

    /// Consume JSON-line messages, then keep the queue open until shutdown.
    ///
    /// The end of input does not close the queue, so the worker and the read
    /// surface keep running until the process is told to stop.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the queue is closed.
    pub async fn run_until_shutdown<R>(
        &self,
        reader: R,
        shutdown: &CancellationToken,
    ) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let queued = self.run_reader(reader, shutdown).await?;
        if !shutdown.is_cancelled() {
            info!(queued, "Message input ended, waiting for shutdown");
            shutdown.cancelled().await;
        }
        Ok(queued)
    }

    /// Consume JSON-line messages from standard input until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the queue is closed.
    pub async fn run_stdin(&self, shutdown: &CancellationToken) -> Result<usize> {
        info!("Reading chat messages from stdin");
        let queued = self
            .run_until_shutdown(BufReader::new(tokio::io::stdin()), shutdown)
            .await?;
        info!(queued, "Stdin ingress finished");
        Ok(queued)
    }
}
