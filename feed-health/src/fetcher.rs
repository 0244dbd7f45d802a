use crate::config::CountServiceConfig;
use crate::traits::CountSource;
use crate::types::{FetchConfig, FetchOutcome, Result};
use async_trait::async_trait;
use backoff::backoff::{Backoff, Constant};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Client;
use serde::de::IgnoredAny;
use tracing::{debug, error, info, warn};
use url::Url;

const COUNT_ENDPOINT: &str = "v2/get-article-by-ingestdate-magazine";

/// Calendar date (UTC) of the 24 hours preceding `run_start`.
pub fn ingest_window(run_start: DateTime<Utc>) -> NaiveDate {
    (run_start - ChronoDuration::hours(24)).date_naive()
}

/// The counting service's date format: `YYYY-M-D`, no zero padding.
pub fn format_ingest_date(date: NaiveDate) -> String {
    date.format("%Y-%-m-%-d").to_string()
}

/// Number of rows in a successful response body. Row contents are ignored.
pub fn decode_row_count(body: &[u8]) -> serde_json::Result<u64> {
    let rows: Vec<IgnoredAny> = serde_json::from_slice(body)?;
    Ok(rows.len() as u64)
}

struct AttemptFailure {
    error: String,
    body: String,
}

/// Queries the counting service for one magazine at a time.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    endpoint: Url,
    api_key: String,
    ingest_date: String,
}

impl Fetcher {
    pub fn new(
        config: FetchConfig,
        service: &CountServiceConfig,
        run_start: DateTime<Utc>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        let endpoint = service.base_url.join(COUNT_ENDPOINT)?;
        let ingest_date = format_ingest_date(ingest_window(run_start));
        info!("Counting articles ingested on {} via {}", ingest_date, endpoint);

        Ok(Self {
            client,
            config,
            endpoint,
            api_key: service.api_key.clone(),
            ingest_date,
        })
    }

    pub fn ingest_date(&self) -> &str {
        &self.ingest_date
    }

    fn request_url(&self, magazine: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("ingestdate", &self.ingest_date)
            .append_pair("magazine", magazine);
        url
    }

    pub async fn count_magazine(&self, magazine: &str) -> FetchOutcome {
        let url = self.request_url(magazine);
        let mut delays = Constant::new(self.config.retry_delay);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.config.max_attempts {
            match self.attempt(&url).await {
                Ok(body) => {
                    return match decode_row_count(&body) {
                        Ok(count) => {
                            debug!("{}: {} articles (attempt {})", magazine, count, attempt);
                            FetchOutcome::Counted(count)
                        }
                        Err(e) => {
                            error!(
                                "Malformed count response for {}: {} body: {}",
                                magazine,
                                e,
                                String::from_utf8_lossy(&body)
                            );
                            FetchOutcome::Malformed(e.to_string())
                        }
                    };
                }
                Err(failure) => {
                    warn!(
                        "Attempt {}/{} failed for {}: {} body: {}",
                        attempt, self.config.max_attempts, magazine, failure.error, failure.body
                    );
                    last_error = failure.error;
                }
            }

            if attempt < self.config.max_attempts {
                if let Some(delay) = delays.next_backoff() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        error!(
            "Giving up on {} after {} attempts: {}",
            magazine, self.config.max_attempts, last_error
        );
        FetchOutcome::Exhausted {
            attempts: self.config.max_attempts,
            last_error,
        }
    }

    async fn attempt(&self, url: &Url) -> std::result::Result<Vec<u8>, AttemptFailure> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| AttemptFailure {
            error: e.to_string(),
            body: String::new(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptFailure {
                error: format!(
                    "HTTP {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown")
                ),
                body,
            });
        }

        // A body cut off mid-read is a transport problem, not malformed data
        let body = response.bytes().await.map_err(|e| AttemptFailure {
            error: e.to_string(),
            body: String::new(),
        })?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl CountSource for Fetcher {
    async fn count(&self, magazine: &str) -> FetchOutcome {
        self.count_magazine(magazine).await
    }
}
