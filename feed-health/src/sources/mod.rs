pub mod cloudant;
pub mod file;

pub use cloudant::CloudantCatalog;
pub use file::JsonFileCatalog;

use crate::types::FeedDescriptor;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// A publisher document as stored in the catalog database.
/// A `null` in any field reads as that field's empty value.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherDocument {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "Publisher_Name", default, deserialize_with = "null_as_default")]
    pub publisher_name: String,
    #[serde(rename = "RSS_Feeds", default, deserialize_with = "null_as_default")]
    pub rss_feeds: Vec<RssFeedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RssFeedEntry {
    #[serde(rename = "RSS_Feed_Name", default, deserialize_with = "null_as_default")]
    pub feed_name: String,
    #[serde(rename = "RSS_Feed_URL", default, deserialize_with = "null_as_default")]
    pub feed_url: String,
    #[serde(rename = "Last_Updated_Date", default)]
    pub last_updated: Option<String>,
    #[serde(rename = "Pause_Ingestion", default, deserialize_with = "null_as_default")]
    pub pause_ingestion: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Flatten publisher documents into one descriptor per feed, in document
/// order. Feeds without a name cannot be counted or reported and are dropped.
pub fn flatten_documents(documents: Vec<PublisherDocument>) -> Vec<FeedDescriptor> {
    let mut feeds = Vec::new();
    for doc in documents {
        for entry in doc.rss_feeds {
            let feed_name = entry.feed_name.trim().to_string();
            if feed_name.is_empty() {
                warn!(
                    "Skipping unnamed feed {} from {} (document {})",
                    entry.feed_url,
                    doc.publisher_name,
                    doc.id.as_deref().unwrap_or("?")
                );
                continue;
            }
            feeds.push(FeedDescriptor {
                publisher: doc.publisher_name.clone(),
                feed_name,
                feed_url: entry.feed_url,
                last_updated: entry.last_updated.as_deref().and_then(parse_timestamp),
                paused: entry.pause_ingestion,
            });
        }
    }
    feeds
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
