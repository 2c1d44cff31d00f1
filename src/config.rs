use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::constants::{DEFAULT_AVAILABILITY_URL, DEFAULT_QUEUE_CAPACITY, DEFAULT_SAVE_URL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
///
/// Built once at startup and handed to the URL filter and the archive worker.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Archive worker
    pub queue_capacity: usize,
    pub save_interval: Duration,

    // Wayback Machine
    pub http_timeout: Duration,
    pub availability_url: String,
    pub save_url: String,

    // Admission filter
    pub ignore_hosts: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub ignore_default_hosts: bool,

    // Ingress
    pub ingress_stdin: bool,
    pub log_message_content: bool,

    // Web Server
    pub web_enabled: bool,
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/keep.sqlite")),

            // Archive worker
            queue_capacity: parse_env_usize("QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            save_interval: Duration::from_secs(parse_env_u64("SAVE_INTERVAL_SECS", 15)?),

            // Wayback Machine
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 10)?),
            availability_url: env_or_default("WAYBACK_AVAILABILITY_URL", DEFAULT_AVAILABILITY_URL),
            save_url: env_or_default("WAYBACK_SAVE_URL", DEFAULT_SAVE_URL),

            // Admission filter
            ignore_hosts: optional_env("IGNORE_HOSTS")
                .map(|v| split_list(&v, |c| c == ','))
                .unwrap_or_default(),
            ignore_patterns: optional_env("IGNORE_PATTERNS")
                .map(|v| split_list(&v, char::is_whitespace))
                .unwrap_or_default(),
            ignore_default_hosts: parse_env_bool("IGNORE_DEFAULT_HOSTS", true)?,

            // Ingress
            ingress_stdin: parse_env_bool("INGRESS_STDIN", true)?,
            log_message_content: parse_env_bool("LOG_MESSAGE_CONTENT", false)?,

            // Web Server
            web_enabled: parse_env_bool("WEB_ENABLED", true)?,
            web_host: env_or_default("WEB_HOST", "127.0.0.1"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
        })
    }

    /// Configuration for tests: no environment access, no ignore rules, tiny intervals.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from("./data/test.sqlite"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            save_interval: Duration::from_millis(10),
            http_timeout: Duration::from_secs(5),
            availability_url: DEFAULT_AVAILABILITY_URL.to_string(),
            save_url: DEFAULT_SAVE_URL.to_string(),
            ignore_hosts: Vec::new(),
            ignore_patterns: Vec::new(),
            ignore_default_hosts: false,
            ingress_stdin: false,
            log_message_content: false,
            web_enabled: false,
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "QUEUE_CAPACITY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.save_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SAVE_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for pattern in &self.ignore_patterns {
            if let Err(e) = Regex::new(pattern) {
                return Err(ConfigError::InvalidValue {
                    name: "IGNORE_PATTERNS".to_string(),
                    message: format!("'{pattern}' is not a valid regex: {e}"),
                });
            }
        }
        if self.web_enabled && self.web_addr().is_none() {
            return Err(ConfigError::InvalidValue {
                name: "WEB_HOST".to_string(),
                message: format!("'{}:{}' is not a socket address", self.web_host, self.web_port),
            });
        }
        Ok(())
    }

    /// Address the JSON read surface binds to.
    #[must_use]
    pub fn web_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.web_host, self.web_port).parse().ok()
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn split_list(value: &str, sep: impl Fn(char) -> bool) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
