use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked feed as it comes out of the catalog.
///
/// `feed_name` doubles as the magazine name that article counts are
/// reported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub publisher: String,
    pub feed_name: String,
    pub feed_url: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub paused: bool,
}

impl FeedDescriptor {
    pub fn magazine(&self) -> &str {
        &self.feed_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionCount {
    pub magazine: String,
    pub article_count: u64,
}

/// A row of the daily report. `article_count` is `None` when the count
/// could not be determined for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub magazine: String,
    pub article_count: Option<u64>,
}

/// What an owner is told about one of their paused feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausedFeedNotice {
    pub feed_name: String,
    pub publisher: String,
    pub feed_url: String,
}

impl From<&FeedDescriptor> for PausedFeedNotice {
    fn from(feed: &FeedDescriptor) -> Self {
        Self {
            feed_name: feed.feed_name.clone(),
            publisher: feed.publisher.clone(),
            feed_url: feed.feed_url.clone(),
        }
    }
}

/// Records returned by an owner lookup. `owners` holds the owner email of
/// each record, if the record has one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMatches {
    pub total_size: usize,
    pub owners: Vec<Option<String>>,
}

// Object style note:
// Collaborators (catalog, owner lookup, mailer) live in the feed-health crate
// behind async traits. This crate only carries the values they exchange, so
// it stays free of runtime and HTTP dependencies.
