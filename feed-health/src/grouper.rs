use crate::traits::OwnerResolver;
use crate::types::{FeedDescriptor, PausedFeedNotice};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Publisher whose feeds are always looked up under the publisher's own
/// name rather than the feed's magazine.
pub const NYT_PUBLISHER: &str = "The New York Times";

/// Why a paused feed produced no reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No active magazine matched; nobody to remind.
    Inactive,
    /// More than one record matched; ownership is ambiguous.
    Ambiguous(usize),
    /// The single match carries no owner email.
    NoOwnerEmail,
    LookupFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFeed {
    pub feed: FeedDescriptor,
    pub query: String,
    pub reason: SkipReason,
}

/// Paused feeds bucketed by the owner to remind.
#[derive(Debug, Clone, Default)]
pub struct OwnerGroups {
    pub groups: BTreeMap<String, Vec<FeedDescriptor>>,
    pub skipped: Vec<SkippedFeed>,
}

impl OwnerGroups {
    pub fn owner_count(&self) -> usize {
        self.groups.len()
    }

    /// One notice list per owner, owners in sorted order.
    pub fn notices(&self) -> Vec<(String, Vec<PausedFeedNotice>)> {
        self.groups
            .iter()
            .map(|(owner, feeds)| {
                (owner.clone(), feeds.iter().map(PausedFeedNotice::from).collect())
            })
            .collect()
    }

    fn skip(&mut self, feed: &FeedDescriptor, query: &str, reason: SkipReason) {
        self.skipped.push(SkippedFeed {
            feed: feed.clone(),
            query: query.to_string(),
            reason,
        });
    }
}

/// Name to query the owner lookup with for `feed`.
pub fn owner_query(feed: &FeedDescriptor) -> &str {
    if feed.publisher == NYT_PUBLISHER {
        NYT_PUBLISHER
    } else {
        feed.magazine()
    }
}

pub struct PausedFeedGrouper<'a> {
    resolver: &'a dyn OwnerResolver,
}

impl<'a> PausedFeedGrouper<'a> {
    pub fn new(resolver: &'a dyn OwnerResolver) -> Self {
        Self { resolver }
    }

    /// Resolve an owner for every paused feed, one lookup at a time.
    pub async fn group(&self, feeds: &[FeedDescriptor]) -> OwnerGroups {
        let mut result = OwnerGroups::default();

        for feed in feeds.iter().filter(|f| f.paused) {
            let query = owner_query(feed);
            let matches = match self.resolver.find_owners(query).await {
                Ok(matches) => matches,
                Err(e) => {
                    error!(
                        "Owner lookup for paused feed {} ({}) failed: {}",
                        feed.feed_name, feed.publisher, e
                    );
                    result.skip(feed, query, SkipReason::LookupFailed(e.to_string()));
                    continue;
                }
            };

            match matches.total_size {
                0 => {
                    debug!("No active magazine for {}; not reminding anyone", query);
                    result.skip(feed, query, SkipReason::Inactive);
                }
                1 => match matches.owners.into_iter().next().flatten() {
                    Some(owner) => {
                        info!(
                            "Queueing paused feed reminder for {} from {} to {}",
                            feed.feed_name, feed.publisher, owner
                        );
                        result.groups.entry(owner).or_default().push(feed.clone());
                    }
                    None => {
                        warn!("Magazine {} has no owner email on record", query);
                        result.skip(feed, query, SkipReason::NoOwnerEmail);
                    }
                },
                n => {
                    warn!(
                        "Owner lookup for {} returned {} records; expected at most one",
                        query, n
                    );
                    result.skip(feed, query, SkipReason::Ambiguous(n));
                }
            }
        }

        result
    }
}
