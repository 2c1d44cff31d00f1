use std::collections::HashSet;

use regex::Regex;

use crate::config::Config;
use crate::constants::DEFAULT_IGNORED_HOSTS;

/// URLs that should never be archived.
///
/// Hosts are compared for exact equality with the normalized URL's host.
/// Patterns are matched against the full normalized URL.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    hosts: HashSet<String>,
    patterns: Vec<Regex>,
}

impl IgnoreList {
    /// Build an ignore list from host names and regex sources.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn new<H, P>(hosts: H, patterns: P) -> Result<Self, regex::Error>
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { hosts, patterns })
    }

    /// Build the ignore list described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured pattern fails to compile.
    pub fn from_config(config: &Config) -> Result<Self, regex::Error> {
        let defaults: &[&str] = if config.ignore_default_hosts {
            DEFAULT_IGNORED_HOSTS
        } else {
            &[]
        };
        let hosts = defaults
            .iter()
            .map(|h| (*h).to_string())
            .chain(config.ignore_hosts.iter().cloned());

        Self::new(hosts, &config.ignore_patterns)
    }

    /// Return the rule that matches, if any.
    #[must_use]
    pub fn matching_rule(&self, host: &str, normalized_url: &str) -> Option<String> {
        if self.hosts.contains(host) {
            return Some(format!("host {host}"));
        }
        self.patterns
            .iter()
            .find(|p| p.is_match(normalized_url))
            .map(|p| format!("pattern {}", p.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.patterns.is_empty()
    }
}
