use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::ARCHIVAL_USER_AGENT;

/// Result of an availability lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    /// Status of the closest snapshot as reported by the service; 0 if unknown.
    pub status_code: u16,
}

impl Availability {
    /// Whether an existing snapshot is good enough to skip a new capture.
    #[must_use]
    pub fn is_usable_snapshot(&self) -> bool {
        self.available && self.status_code == 200
    }
}

/// The two operations the archive worker needs from an archive service.
///
/// Neither operation fails: network and decode problems are logged and folded
/// into the returned value, and no call is retried.
#[async_trait]
pub trait ArchiveService: Send + Sync {
    /// Ask whether the URL already has a snapshot.
    async fn check_availability(&self, url: &str) -> Availability;

    /// Ask the service to capture the URL now. Returns the HTTP status, or 0
    /// if no response arrived (including timeouts).
    async fn submit_archive(&self, url: &str) -> u16;
}

/// Wayback Machine client.
#[derive(Debug, Clone)]
pub struct WaybackClient {
    client: Client,
    availability_url: String,
    save_url: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: Option<ArchivedSnapshots>,
}

#[derive(Debug, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<ClosestSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ClosestSnapshot {
    #[serde(default)]
    available: bool,
    #[serde(default)]
    status: String,
}

impl AvailabilityResponse {
    fn into_availability(self) -> Availability {
        self.archived_snapshots
            .and_then(|s| s.closest)
            .map_or_else(Availability::default, |closest| Availability {
                available: closest.available,
                status_code: closest.status.trim().parse().unwrap_or(0),
            })
    }
}

impl WaybackClient {
    /// Create a client using the configured endpoints and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(ARCHIVAL_USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            availability_url: config.availability_url.clone(),
            save_url: config.save_url.clone(),
        })
    }

    fn availability_request_url(&self, url: &str) -> String {
        format!("{}?url={}", self.availability_url, urlencoding::encode(url))
    }

    fn save_request_url(&self, url: &str) -> String {
        format!("{}{url}", self.save_url)
    }

    async fn fetch_availability(&self, url: &str) -> Result<Availability> {
        let response = self
            .client
            .get(self.availability_request_url(url))
            .send()
            .await
            .context("Failed to check Wayback availability")?;

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "Wayback availability lookup failed");
            return Ok(Availability::default());
        }

        let body: AvailabilityResponse = response
            .json()
            .await
            .context("Failed to parse Wayback availability response")?;

        Ok(body.into_availability())
    }
}

#[async_trait]
impl ArchiveService for WaybackClient {
    async fn check_availability(&self, url: &str) -> Availability {
        match self.fetch_availability(url).await {
            Ok(availability) => {
                debug!(
                    url = %url,
                    available = availability.available,
                    status = availability.status_code,
                    "Wayback availability checked"
                );
                availability
            }
            Err(e) => {
                warn!(url = %url, "{e:#}");
                Availability::default()
            }
        }
    }

    async fn submit_archive(&self, url: &str) -> u16 {
        debug!(url = %url, "Submitting URL to Wayback Machine");

        match self.client.get(self.save_request_url(url)).send().await {
            Ok(response) => response.status().as_u16(),
            Err(e) if e.is_timeout() => {
                // First captures of large pages routinely outlast the timeout
                info!(url = %url, "Wayback save request timed out");
                0
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Wayback save request failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(body: &str) -> Availability {
        serde_json::from_str::<AvailabilityResponse>(body)
            .unwrap()
            .into_availability()
    }

    #[test]
    fn test_decode_available_snapshot() {
        let body = r#"{"url":"example.com","archived_snapshots":{"closest":{"status":"200","available":true,"url":"http://web.archive.org/web/20240101000000/http://example.com/","timestamp":"20240101000000"}}}"#;
        assert_eq!(
            decode(body),
            Availability {
                available: true,
                status_code: 200
            }
        );
    }

    #[test]
    fn test_decode_missing_snapshots() {
        assert_eq!(
            decode(r#"{"url":"x.local","archived_snapshots":{}}"#),
            Availability::default()
        );
        assert_eq!(decode(r#"{"url":"x.local"}"#), Availability::default());
    }

    #[test]
    fn test_decode_unparsable_status() {
        let body = r#"{"archived_snapshots":{"closest":{"status":"-","available":true}}}"#;
        let availability = decode(body);
        assert!(availability.available);
        assert_eq!(availability.status_code, 0);
        assert!(!availability.is_usable_snapshot());
    }

    #[test]
    fn test_request_urls() {
        let config = Config {
            availability_url: "https://archive.test/wayback/available".to_string(),
            save_url: "https://web.archive.test/save/".to_string(),
            ..Config::for_testing()
        };
        let client = WaybackClient::new(&config).unwrap();

        assert_eq!(
            client.availability_request_url("https://example.com/a?b=1&c=2"),
            "https://archive.test/wayback/available?url=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1%26c%3D2"
        );
        assert_eq!(
            client.save_request_url("https://example.com/a?b=1"),
            "https://web.archive.test/save/https://example.com/a?b=1"
        );
    }
}
