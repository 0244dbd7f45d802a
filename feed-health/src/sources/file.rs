use super::{flatten_documents, PublisherDocument};
use crate::traits::FeedCatalog;
use crate::types::{FeedDescriptor, HealthError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

// Accepts either a bare array or a saved `_find` response
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Documents(Vec<PublisherDocument>),
    FindResponse { docs: Vec<PublisherDocument> },
}

/// Feed catalog read from a local JSON export of the publisher documents.
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedCatalog for JsonFileCatalog {
    fn catalog_name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn load_feeds(&self) -> Result<Vec<FeedDescriptor>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| {
                HealthError::Catalog(format!("cannot read {}: {}", self.path.display(), e))
            })?;
        let documents = match serde_json::from_slice::<CatalogFile>(&raw)? {
            CatalogFile::Documents(docs) => docs,
            CatalogFile::FindResponse { docs } => docs,
        };
        let feeds = flatten_documents(documents);
        info!("Loaded {} feeds from {}", feeds.len(), self.path.display());
        Ok(feeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_find_response_export() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"docs": [{{"Publisher_Name": "Hearst", "RSS_Feeds": [
                {{"RSS_Feed_Name": "Esquire", "RSS_Feed_URL": "https://esq.example.com/rss", "Pause_Ingestion": false}}
            ]}}], "bookmark": "nil"}}"#
        )
        .unwrap();

        let feeds = JsonFileCatalog::new(file.path()).load_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed_name, "Esquire");
        assert_eq!(feeds[0].publisher, "Hearst");
    }

    #[tokio::test]
    async fn test_missing_file_is_a_catalog_error() {
        let err = JsonFileCatalog::new("/nonexistent/feeds.json").load_feeds().await.unwrap_err();
        assert!(matches!(err, HealthError::Catalog(_)));
    }
}
