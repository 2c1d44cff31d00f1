//! Shared constants used across the application.

/// User agent string used for archive service requests.
///
/// The save endpoint is friendlier to requests that look like normal browser traffic.
pub const ARCHIVAL_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:94.0) Gecko/20100101 Firefox/94.0";

/// Availability lookup endpoint. The target URL goes in the `url` query parameter.
pub const DEFAULT_AVAILABILITY_URL: &str = "https://archive.org/wayback/available";

/// Save endpoint. The raw target URL is appended to this prefix.
pub const DEFAULT_SAVE_URL: &str = "https://web.archive.org/save/";

/// Capacity of the candidate queue between ingress and the archive worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 25;

/// Hosts of the chat platform itself. Links to them are never worth archiving.
pub const DEFAULT_IGNORED_HOSTS: &[&str] = &[
    "discord.com",
    "discord.gg",
    "discordapp.com",
    "cdn.discordapp.com",
    "media.discordapp.net",
];
