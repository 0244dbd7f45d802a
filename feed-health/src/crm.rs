use crate::config::CrmConfig;
use crate::traits::OwnerResolver;
use crate::types::{HealthError, OwnerMatches, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const QUERY_PATH: &str = "v61.0/query/";

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "totalSize")]
    total_size: usize,
    #[serde(default)]
    records: Vec<MagazineRecord>,
}

#[derive(Debug, Deserialize)]
struct MagazineRecord {
    #[serde(rename = "Client_Success_Manager__r")]
    client_success_manager: Option<ContactRecord>,
}

#[derive(Debug, Deserialize)]
struct ContactRecord {
    #[serde(rename = "Email", alias = "email")]
    email: Option<String>,
}

/// SOQL string literal contents for `value`.
pub fn escape_soql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn owner_soql(magazine: &str) -> String {
    format!(
        "SELECT Client_Success_Manager__r.Email from Magazine__c where Inactive__c = false AND Name like '{}'",
        escape_soql(magazine)
    )
}

/// Resolves magazine owners (client success managers) from the CRM.
pub struct CrmOwnerResolver {
    client: Client,
    config: CrmConfig,
    access_token: String,
}

impl CrmOwnerResolver {
    /// Exchange the refresh token for an access token. Fails if the CRM
    /// will not hand out credentials.
    pub async fn connect(config: CrmConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("refresh_token", config.refresh_token.as_str()),
        ];
        let response = client
            .post(config.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| HealthError::Credential(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HealthError::Credential(format!(
                "token endpoint returned HTTP {}: {}",
                status, body
            )));
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| HealthError::Credential(format!("unreadable token response: {}", e)))?;
        info!("Obtained CRM access token");

        Ok(Self {
            client,
            config,
            access_token: token.access_token,
        })
    }
}

#[async_trait]
impl OwnerResolver for CrmOwnerResolver {
    async fn find_owners(&self, magazine: &str) -> Result<OwnerMatches> {
        let lookup_error = |reason: String| HealthError::OwnerLookup {
            magazine: magazine.to_string(),
            reason,
        };

        let mut url = self.config.api_url.join(QUERY_PATH)?;
        url.query_pairs_mut().append_pair("q", &owner_soql(magazine));
        debug!("Looking up owner for {}", magazine);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| lookup_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(lookup_error(format!("HTTP {}: {}", status, body)));
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| lookup_error(format!("unreadable query response: {}", e)))?;

        Ok(OwnerMatches {
            total_size: result.total_size,
            owners: result
                .records
                .into_iter()
                .map(|r| r.client_success_manager.and_then(|c| c.email))
                .collect(),
        })
    }
}
