use crate::traits::CountSource;
use crate::types::{FeedDescriptor, FeedResult, FetchOutcome};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info};

/// Fans out one count request per feed and waits for all of them.
pub struct FetchDispatcher {
    source: Arc<dyn CountSource>,
    max_concurrency: usize,
}

impl FetchDispatcher {
    pub fn new(source: Arc<dyn CountSource>, max_concurrency: usize) -> Self {
        Self {
            source,
            max_concurrency: max_concurrency.clamp(1, Semaphore::MAX_PERMITS),
        }
    }

    /// Returns exactly one result per feed, sorted by catalog index.
    ///
    /// A failing feed never cancels the others; the call returns only after
    /// every worker has finished.
    pub async fn dispatch(&self, feeds: &[FeedDescriptor]) -> Vec<FeedResult> {
        let total = feeds.len();
        info!(
            "Counting ingested articles for {} feeds ({} at a time)",
            total, self.max_concurrency
        );

        let (tx, mut rx) = mpsc::channel::<FeedResult>(total.max(1));
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut workers = JoinSet::new();

        for (index, feed) in feeds.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            let magazine = feed.magazine().to_string();
            workers.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => source.count(&magazine).await,
                    Err(e) => FetchOutcome::Aborted(e.to_string()),
                };
                // The channel holds one slot per feed, so this never waits
                let _ = tx.send(FeedResult { index, magazine, outcome }).await;
            });
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Count worker did not finish: {}", e);
            }
        }

        let mut slots: Vec<Option<FeedResult>> = vec![None; total];
        while let Some(result) = rx.recv().await {
            let index = result.index;
            slots[index] = Some(result);
        }

        let results: Vec<FeedResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| FeedResult {
                    index,
                    magazine: feeds[index].magazine().to_string(),
                    outcome: FetchOutcome::Aborted("worker exited without reporting".to_string()),
                })
            })
            .collect();

        let unknown = results.iter().filter(|r| r.outcome.is_unknown()).count();
        info!("Counted {}/{} feeds ({} unknown)", total - unknown, total, unknown);
        results
    }
}
