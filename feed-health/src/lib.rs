pub mod types;
pub mod config;
pub mod traits;
pub mod fetcher;
pub mod dispatcher;
pub mod aggregator;
pub mod grouper;
pub mod report;
pub mod sources;
pub mod crm;
pub mod notify;
pub mod pipeline;

pub use types::*;
pub use config::{ConfigArgs, HealthConfig};
pub use fetcher::Fetcher;
pub use dispatcher::FetchDispatcher;
pub use aggregator::{aggregate, AggregatedReport};
pub use grouper::{OwnerGroups, PausedFeedGrouper};
pub use crm::CrmOwnerResolver;
pub use notify::{BrevoNotifier, LogNotifier};
pub use pipeline::{HealthCheck, RunSummary};
