//! URL admission: decide which strings in a chat message are worth archiving.

mod ignore;
mod normalize;

pub use ignore::IgnoreList;
pub use normalize::normalize_url;

use std::collections::HashSet;

use anyhow::{Context, Result};
use thiserror::Error;
use url::{ParseError, Url};

use crate::config::Config;

/// Why a candidate string was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("not a parsable URL")]
    Unparsable,
    #[error("not an absolute URL")]
    NotAbsolute,
    #[error("host has no dotted domain name")]
    NoDottedHost,
    #[error("top-level domain is not ICANN-managed")]
    NonIcannSuffix,
    #[error("ignored by {rule}")]
    Ignored { rule: String },
}

/// Admission filter. Pure: the only state is the static ignore list.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    ignore: IgnoreList,
}

impl UrlFilter {
    /// Build the filter from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern does not compile.
    pub fn new(config: &Config) -> Result<Self> {
        let ignore = IgnoreList::from_config(config).context("Invalid ignore pattern")?;
        if ignore.is_empty() {
            tracing::debug!("No ignore rules configured");
        }
        Ok(Self { ignore })
    }

    #[must_use]
    pub fn with_ignore_list(ignore: IgnoreList) -> Self {
        Self { ignore }
    }

    /// Validate and normalize one candidate string.
    pub fn admit(&self, candidate: &str) -> Result<String, Rejection> {
        let url = Url::parse(candidate).map_err(|e| match e {
            ParseError::RelativeUrlWithoutBase => Rejection::NotAbsolute,
            _ => Rejection::Unparsable,
        })?;

        let host = url
            .host_str()
            .ok_or(Rejection::NoDottedHost)?
            .to_ascii_lowercase();
        if !matches!(host.find('.'), Some(i) if i > 0) {
            return Err(Rejection::NoDottedHost);
        }
        if !has_icann_tld(&host) {
            return Err(Rejection::NonIcannSuffix);
        }

        let normalized = normalize_url(&url);
        if let Some(rule) = self.ignore.matching_rule(&host, &normalized) {
            return Err(Rejection::Ignored { rule });
        }

        Ok(normalized)
    }

    /// Admit every whitespace-separated field of a message, keeping the first
    /// occurrence of each normalized URL.
    #[must_use]
    pub fn extract_candidates(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for field in text.split_whitespace() {
            match self.admit(field) {
                Ok(url) => {
                    if seen.insert(url.clone()) {
                        urls.push(url);
                    }
                }
                Err(reason) => {
                    tracing::trace!(field, %reason, "Candidate rejected");
                }
            }
        }

        urls
    }
}

/// Whether the last label of `host` is a suffix from the ICANN section of the public suffix list.
fn has_icann_tld(host: &str) -> bool {
    let tld = host.rsplit('.').next().unwrap_or_default();
    if tld.is_empty() {
        return false;
    }
    psl::suffix(tld.as_bytes())
        .is_some_and(|s| s.is_known() && matches!(s.typ(), Some(psl::Type::Icann)))
}
