pub mod defs;

pub use defs::{FeedDescriptor, IngestionCount, OwnerMatches, PausedFeedNotice, ReportRow};
