use crate::types::{FeedDescriptor, FetchOutcome, OwnerMatches, PausedFeedNotice, Result};
use async_trait::async_trait;

/// Source of the tracked feed list for a run.
#[async_trait]
pub trait FeedCatalog: Send + Sync {
    /// Human-readable name for logs
    fn catalog_name(&self) -> String;

    /// Load every tracked feed, in catalog order.
    async fn load_feeds(&self) -> Result<Vec<FeedDescriptor>>;
}

/// Counts the articles ingested for one magazine in the run's window.
///
/// Implementations own their retry policy and never fail the caller: every
/// failure mode is folded into the returned outcome.
#[async_trait]
pub trait CountSource: Send + Sync {
    async fn count(&self, magazine: &str) -> FetchOutcome;
}

/// Looks up who is responsible for a magazine.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn find_owners(&self, magazine: &str) -> Result<OwnerMatches>;
}

/// Outbound delivery of the run's artifacts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the rendered report file.
    async fn send_report(&self, file_name: &str, content: &[u8]) -> Result<()>;

    /// Tell one owner about all of their paused feeds.
    async fn send_paused_reminder(&self, owner: &str, feeds: &[PausedFeedNotice]) -> Result<()>;
}
