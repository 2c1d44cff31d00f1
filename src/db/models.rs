use serde::{Deserialize, Serialize};

/// One of the three identifier dimensions an archive record points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Author,
    Community,
    Channel,
}

impl Dimension {
    pub const ALL: [Self; 3] = [Self::Author, Self::Community, Self::Channel];

    /// Name of the backing table.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Author => "authors",
            Self::Community => "communities",
            Self::Channel => "channels",
        }
    }
}

/// Where a URL was first seen: the externally assigned ids of the message's
/// author, community (server/guild) and channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub author: String,
    pub community: String,
    pub channel: String,
}

impl Origin {
    pub fn new(
        author: impl Into<String>,
        community: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            community: community.into(),
            channel: channel.into(),
        }
    }

    pub(crate) fn id_for(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Author => &self.author,
            Dimension::Community => &self.community,
            Dimension::Channel => &self.channel,
        }
    }
}

/// An archive record joined with its origin identifiers, as listed to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    pub url: String,
    pub author: String,
    pub community: String,
    pub channel: String,
    /// HTTP-like outcome; 0 means the archive service could not be reached.
    pub status_code: i64,
    pub created_at: String,
}

/// Aggregate table sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub url_count: i64,
    pub author_count: i64,
    pub community_count: i64,
    pub channel_count: i64,
}

/// Conjunctive filters for [`list_entries`](super::list_entries).
///
/// `None` and empty strings leave a field unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub author: Option<String>,
    pub community: Option<String>,
    pub channel: Option<String>,
    /// Case-sensitive substring of the normalized URL.
    pub url_contains: Option<String>,
}

impl EntryFilter {
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    pub fn community(mut self, community: impl Into<String>) -> Self {
        self.community = Some(community.into());
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn url_contains(mut self, needle: impl Into<String>) -> Self {
        self.url_contains = Some(needle.into());
        self
    }
}
