use super::{flatten_documents, PublisherDocument};
use crate::config::CloudantConfig;
use crate::traits::FeedCatalog;
use crate::types::{FeedDescriptor, HealthError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    docs: Vec<PublisherDocument>,
    bookmark: Option<String>,
    warning: Option<String>,
}

/// Feed catalog backed by a Cloudant (CouchDB) database of publisher
/// documents, queried through `_find`.
pub struct CloudantCatalog {
    client: Client,
    config: CloudantConfig,
}

impl CloudantCatalog {
    pub fn new(config: CloudantConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    /// `{url}/{db}/_find`, with the database name escaped as one segment.
    fn find_url(&self) -> Result<Url> {
        let mut url = self.config.url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                HealthError::Config(format!("{} cannot hold a database path", self.config.url))
            })?
            .pop_if_empty()
            .push(&self.config.db_name)
            .push("_find");
        Ok(url)
    }

    async fn find_page(&self, bookmark: Option<&str>) -> Result<FindResponse> {
        let url = self.find_url()?;
        let mut body = json!({
            "selector": {
                "_id": { "$gt": "0" },
                "Publisher_Name": { "$exists": true },
                "RSS_Feeds": { "$exists": true }
            },
            "limit": PAGE_SIZE,
        });
        if let Some(bookmark) = bookmark {
            body["bookmark"] = json!(bookmark);
        }

        let mut request = self.client.post(url).json(&body);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HealthError::Catalog(format!(
                "_find on {} returned HTTP {}: {}",
                self.config.db_name, status, text
            )));
        }

        let page: FindResponse = response.json().await?;
        if let Some(warning) = &page.warning {
            debug!("Cloudant warning: {}", warning);
        }
        Ok(page)
    }
}

#[async_trait]
impl FeedCatalog for CloudantCatalog {
    fn catalog_name(&self) -> String {
        format!("cloudant:{}", self.config.db_name)
    }

    async fn load_feeds(&self) -> Result<Vec<FeedDescriptor>> {
        let mut documents = Vec::new();
        let mut bookmark: Option<String> = None;

        loop {
            let page = self.find_page(bookmark.as_deref()).await?;
            let fetched = page.docs.len();
            documents.extend(page.docs);
            debug!("Fetched {} publisher documents", fetched);

            match page.bookmark {
                Some(next)
                    if fetched == PAGE_SIZE && bookmark.as_deref() != Some(next.as_str()) =>
                {
                    bookmark = Some(next);
                }
                _ => break,
            }
        }

        let publishers = documents.len();
        let feeds = flatten_documents(documents);
        info!("Loaded {} feeds from {} publishers", feeds.len(), publishers);
        Ok(feeds)
    }
}
