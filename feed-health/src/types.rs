use serde::{Deserialize, Serialize};
use std::time::Duration;
// Use the interfaces crate for the values shared with collaborators
pub use interfaces::defs::{
    FeedDescriptor, IngestionCount, OwnerMatches, PausedFeedNotice, ReportRow,
};

/// Outcome of counting one feed's ingested articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchOutcome {
    /// The counting service answered; number of article rows it returned.
    Counted(u64),
    /// Every attempt hit a transient failure.
    Exhausted { attempts: u32, last_error: String },
    /// The service answered 2xx but the body was not a list of rows.
    Malformed(String),
    /// The worker never reported back (it panicked or was cancelled).
    Aborted(String),
}

impl FetchOutcome {
    pub fn count(&self) -> Option<u64> {
        match self {
            FetchOutcome::Counted(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.count().is_none()
    }
}

/// A fetch outcome tagged with the feed it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedResult {
    /// Position of the feed in the catalog listing.
    pub index: usize,
    pub magazine: String,
    pub outcome: FetchOutcome,
}

impl FeedResult {
    /// The counted articles for this feed, or `None` when the count is unknown.
    pub fn ingestion_count(&self) -> Option<IngestionCount> {
        self.outcome.count().map(|article_count| IngestionCount {
            magazine: self.magazine.clone(),
            article_count,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Upper bound on a single HTTP attempt, connect through body.
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub max_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Feed-Health/1.0".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 10,
            retry_delay: Duration::from_secs(1),
            max_concurrency: 16,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed catalog error: {0}")]
    Catalog(String),

    #[error("Credential exchange failed: {0}")]
    Credential(String),

    #[error("Owner lookup failed for {magazine}: {reason}")]
    OwnerLookup { magazine: String, reason: String },

    #[error("Notification failed: {0}")]
    Notify(String),
}

pub type Result<T> = std::result::Result<T, HealthError>;
