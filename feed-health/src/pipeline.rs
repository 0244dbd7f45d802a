use crate::aggregator::{aggregate, AggregatedReport};
use crate::dispatcher::FetchDispatcher;
use crate::grouper::{OwnerGroups, PausedFeedGrouper};
use crate::report::{render_csv, report_file_name};
use crate::traits::{CountSource, FeedCatalog, Notifier, OwnerResolver};
use crate::types::{FeedDescriptor, FeedResult, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of the paused-feed reminder step.
#[derive(Debug, Default)]
pub struct ReminderSummary {
    pub groups: OwnerGroups,
    pub sent: usize,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub feed_count: usize,
    pub report: AggregatedReport,
    pub report_file_name: String,
    pub report_csv: String,
    /// Feeds whose article count could not be determined.
    pub unknown_feeds: Vec<FeedResult>,
    pub reminders: Option<ReminderSummary>,
}

/// One health-check pass: load feeds, remind owners of paused feeds, count
/// ingested articles and deliver the report.
pub struct HealthCheck<'a> {
    catalog: &'a dyn FeedCatalog,
    dispatcher: FetchDispatcher,
    notifier: &'a dyn Notifier,
    owners: Option<&'a dyn OwnerResolver>,
}

impl<'a> HealthCheck<'a> {
    pub fn new(
        catalog: &'a dyn FeedCatalog,
        counts: Arc<dyn CountSource>,
        max_concurrency: usize,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            catalog,
            dispatcher: FetchDispatcher::new(counts, max_concurrency),
            notifier,
            owners: None,
        }
    }

    /// Enable paused-feed reminders through `resolver`.
    pub fn with_owner_resolver(mut self, resolver: &'a dyn OwnerResolver) -> Self {
        self.owners = Some(resolver);
        self
    }

    /// Only a catalog failure or a failed report delivery fails the run.
    /// Per-feed problems end up in the summary.
    pub async fn run(&self, run_date: NaiveDate) -> Result<RunSummary> {
        info!("Loading feeds from {}", self.catalog.catalog_name());
        let feeds = self.catalog.load_feeds().await?;

        let reminders = match self.owners {
            Some(resolver) => Some(self.send_reminders(resolver, &feeds).await),
            None => None,
        };

        let results = self.dispatcher.dispatch(&feeds).await;
        let unknown_feeds: Vec<FeedResult> =
            results.iter().filter(|r| r.outcome.is_unknown()).cloned().collect();
        for failed in &unknown_feeds {
            warn!("No article count for {}: {:?}", failed.magazine, failed.outcome);
        }

        let report = aggregate(results);
        let report_csv = render_csv(&report);
        let report_file_name = report_file_name(run_date);
        self.notifier.send_report(&report_file_name, report_csv.as_bytes()).await?;
        info!(
            "Reported {} magazines from {} feeds ({} unknown)",
            report.len(),
            feeds.len(),
            report.unknown_count()
        );

        Ok(RunSummary {
            feed_count: feeds.len(),
            report,
            report_file_name,
            report_csv,
            unknown_feeds,
            reminders,
        })
    }

    async fn send_reminders(
        &self,
        resolver: &dyn OwnerResolver,
        feeds: &[FeedDescriptor],
    ) -> ReminderSummary {
        let paused = feeds.iter().filter(|f| f.paused).count();
        info!("Checking owners for {} paused feeds", paused);

        let groups = PausedFeedGrouper::new(resolver).group(feeds).await;
        let mut summary = ReminderSummary::default();

        for (owner, notices) in groups.notices() {
            match self.notifier.send_paused_reminder(&owner, &notices).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    error!("Failed to send paused feed reminder to {}: {}", owner, e);
                    summary.failed.push((owner, e.to_string()));
                }
            }
        }

        summary.groups = groups;
        summary
    }
}
