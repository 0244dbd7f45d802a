use crate::config::MailConfig;
use crate::traits::Notifier;
use crate::types::{HealthError, PausedFeedNotice, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

pub const REPORT_SUBJECT: &str = "RSS Feed Health Status";
pub const REMINDER_SUBJECT: &str = "Paused Feed Reminder";

#[derive(Debug, Serialize)]
struct Sender<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    content: String,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailRequest<'a> {
    sender: Sender<'a>,
    to: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<Recipient<'a>>,
    subject: &'a str,
    html_content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachment: Vec<Attachment<'a>>,
}

fn recipients(emails: &[String]) -> Vec<Recipient<'_>> {
    emails.iter().map(|email| Recipient { email: email.as_str() }).collect()
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn report_html() -> String {
    "<html><head></head><body>See attached for the total ingested articles in the past 24 hours by magazine.</body></html>"
        .to_string()
}

pub fn reminder_html(feeds: &[PausedFeedNotice]) -> String {
    let mut body = String::new();
    for feed in feeds {
        let url = escape_html(&feed.feed_url);
        body.push_str(&format!(
            "The feed for <b>{}</b> ({}) is paused. Please work with the Publisher to resolve the errors and unpause the feed.<br><br>URL: <a href='{}'>{}</a><br><br><br>",
            escape_html(&feed.feed_name),
            escape_html(&feed.publisher),
            url,
            url
        ));
    }
    format!("<html><head></head><body>{}<br><br><br>RSS Mailer</body></html>", body)
}

/// Sends mail through Brevo's transactional email API.
pub struct BrevoNotifier {
    client: Client,
    config: MailConfig,
}

impl BrevoNotifier {
    pub fn new(config: MailConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    async fn send(&self, request: &EmailRequest<'_>) -> Result<()> {
        let response = self
            .client
            .post(self.config.api_url.clone())
            .header("api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HealthError::Notify(format!("mail API returned HTTP {}: {}", status, body)));
        }
        Ok(())
    }

    fn sender(&self) -> Sender<'_> {
        Sender {
            name: &self.config.sender_name,
            email: &self.config.sender_email,
        }
    }
}

#[async_trait]
impl Notifier for BrevoNotifier {
    async fn send_report(&self, file_name: &str, content: &[u8]) -> Result<()> {
        let request = EmailRequest {
            sender: self.sender(),
            to: recipients(&self.config.operators),
            bcc: Vec::new(),
            subject: REPORT_SUBJECT,
            html_content: report_html(),
            attachment: vec![Attachment {
                content: base64::engine::general_purpose::STANDARD.encode(content),
                name: file_name,
            }],
        };
        self.send(&request).await?;
        info!("Sent {} to {} recipients", file_name, self.config.operators.len());
        Ok(())
    }

    async fn send_paused_reminder(&self, owner: &str, feeds: &[PausedFeedNotice]) -> Result<()> {
        let mut to = recipients(&self.config.operators);
        if !self.config.operators.iter().any(|o| o == owner) {
            to.push(Recipient { email: owner });
        }
        let request = EmailRequest {
            sender: self.sender(),
            to,
            bcc: recipients(&self.config.reminder_bcc),
            subject: REMINDER_SUBJECT,
            html_content: reminder_html(feeds),
            attachment: Vec::new(),
        };
        self.send(&request).await?;
        info!("Sent paused feed reminder for {} feeds to {}", feeds.len(), owner);
        Ok(())
    }
}

/// Writes what would have been sent to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_report(&self, file_name: &str, content: &[u8]) -> Result<()> {
        info!("[dry run] would send {} ({} bytes)", file_name, content.len());
        Ok(())
    }

    async fn send_paused_reminder(&self, owner: &str, feeds: &[PausedFeedNotice]) -> Result<()> {
        for feed in feeds {
            info!(
                "[dry run] would remind {} that {} ({}) is paused: {}",
                owner, feed.feed_name, feed.publisher, feed.feed_url
            );
        }
        Ok(())
    }
}
