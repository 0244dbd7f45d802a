use crate::types::{FetchConfig, HealthError, Result};
use chrono::Weekday;
use clap::Args;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Everything a run needs, resolved once at startup and handed to each
/// component by reference.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub fetch: FetchConfig,
    pub count_service: CountServiceConfig,
    pub catalog: CatalogSource,
    pub crm: Option<CrmConfig>,
    pub mail: Option<MailConfig>,
    pub reminder_day: Weekday,
}

#[derive(Debug, Clone)]
pub struct CountServiceConfig {
    pub base_url: Url,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub enum CatalogSource {
    Cloudant(CloudantConfig),
    File(std::path::PathBuf),
}

#[derive(Debug, Clone)]
pub struct CloudantConfig {
    pub url: Url,
    pub db_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub token_url: Url,
    pub api_url: Url,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: Url,
    pub api_key: String,
    pub sender_name: String,
    pub sender_email: String,
    /// Receive the daily report and are copied on every reminder.
    pub operators: Vec<String>,
    pub reminder_bcc: Vec<String>,
}

/// Command-line flags, each backed by an environment variable.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    #[arg(long, env = "COUNT_SERVICE_URL")]
    pub count_service_url: Option<String>,
    #[arg(long, env = "COUNT_SERVICE_APIKEY", hide_env_values = true)]
    pub count_service_apikey: Option<String>,

    /// Read the feed catalog from a local JSON file instead of Cloudant
    #[arg(long)]
    pub catalog_file: Option<std::path::PathBuf>,
    #[arg(long, env = "CLOUDANT_URL")]
    pub cloudant_url: Option<String>,
    #[arg(long, env = "CATALOG_DB")]
    pub catalog_db: Option<String>,
    #[arg(long, env = "CLOUDANT_USERNAME")]
    pub cloudant_username: Option<String>,
    #[arg(long, env = "CLOUDANT_PASSWORD", hide_env_values = true)]
    pub cloudant_password: Option<String>,

    #[arg(long, env = "CRM_TOKEN_URL")]
    pub crm_token_url: Option<String>,
    #[arg(long, env = "CRM_API_URL")]
    pub crm_api_url: Option<String>,
    #[arg(long, env = "CRM_CLIENT_ID")]
    pub crm_client_id: Option<String>,
    #[arg(long, env = "CRM_CLIENT_SECRET", hide_env_values = true)]
    pub crm_client_secret: Option<String>,
    #[arg(long, env = "CRM_REFRESH_TOKEN", hide_env_values = true)]
    pub crm_refresh_token: Option<String>,

    #[arg(long, env = "BREVO_API_URL", default_value = "https://api.brevo.com/v3/smtp/email")]
    pub brevo_api_url: String,
    #[arg(long, env = "BREVO_API_KEY", hide_env_values = true)]
    pub brevo_api_key: Option<String>,
    #[arg(long, env = "MAIL_SENDER_NAME", default_value = "RSS Mailer")]
    pub sender_name: String,
    #[arg(long, env = "MAIL_SENDER_EMAIL")]
    pub sender_email: Option<String>,
    /// Comma-separated list of report recipients
    #[arg(long, env = "REPORT_RECIPIENTS", value_delimiter = ',')]
    pub report_recipients: Vec<String>,
    #[arg(long, env = "REMINDER_BCC", value_delimiter = ',')]
    pub reminder_bcc: Vec<String>,

    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 10)]
    pub max_attempts: u32,
    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 16)]
    pub max_concurrency: usize,
    /// Weekday on which paused-feed reminders go out (e.g. "fri")
    #[arg(long, env = "REMINDER_DAY", default_value = "fri")]
    pub reminder_day: String,
}

impl HealthConfig {
    /// Resolve CLI/env values. `require_mail` is false for dry runs, which
    /// never talk to the mail API.
    pub fn from_args(args: ConfigArgs, require_mail: bool) -> Result<Self> {
        if args.max_attempts == 0 {
            return Err(HealthError::Config("max attempts must be at least 1".to_string()));
        }
        if args.max_concurrency == 0 || args.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(HealthError::Config(format!(
                "max concurrency must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }

        let fetch = FetchConfig {
            timeout: Duration::from_secs(args.timeout_secs),
            max_attempts: args.max_attempts,
            retry_delay: Duration::from_millis(args.retry_delay_ms),
            max_concurrency: args.max_concurrency,
            ..FetchConfig::default()
        };

        let count_service = CountServiceConfig {
            base_url: directory_url(&required(args.count_service_url, "COUNT_SERVICE_URL")?)?,
            api_key: required(args.count_service_apikey, "COUNT_SERVICE_APIKEY")?,
        };

        let catalog = match args.catalog_file {
            Some(path) => CatalogSource::File(path),
            None => CatalogSource::Cloudant(CloudantConfig {
                url: directory_url(&required(args.cloudant_url, "CLOUDANT_URL")?)?,
                db_name: required(args.catalog_db, "CATALOG_DB")?,
                username: non_empty(args.cloudant_username),
                password: non_empty(args.cloudant_password),
            }),
        };

        let crm = match (
            non_empty(args.crm_token_url),
            non_empty(args.crm_api_url),
            non_empty(args.crm_client_id),
            non_empty(args.crm_client_secret),
            non_empty(args.crm_refresh_token),
        ) {
            (
                Some(token_url),
                Some(api_url),
                Some(client_id),
                Some(client_secret),
                Some(refresh_token),
            ) => {
                Some(CrmConfig {
                    token_url: Url::parse(&token_url)?,
                    api_url: directory_url(&api_url)?,
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            _ => None,
        };

        let operators = clean_list(args.report_recipients);
        let mail = match (non_empty(args.brevo_api_key), non_empty(args.sender_email)) {
            (Some(api_key), Some(sender_email)) => {
                if operators.is_empty() {
                    return Err(HealthError::Config(
                        "REPORT_RECIPIENTS must name at least one address".to_string(),
                    ));
                }
                Some(MailConfig {
                    api_url: Url::parse(&args.brevo_api_url)?,
                    api_key,
                    sender_name: args.sender_name,
                    sender_email,
                    operators,
                    reminder_bcc: clean_list(args.reminder_bcc),
                })
            }
            _ if require_mail => {
                return Err(HealthError::Config(
                    "BREVO_API_KEY and MAIL_SENDER_EMAIL are required".to_string(),
                ));
            }
            _ => None,
        };

        let reminder_day = args
            .reminder_day
            .parse::<Weekday>()
            .map_err(|_| HealthError::Config(format!("unknown weekday: {}", args.reminder_day)))?;

        Ok(Self {
            fetch,
            count_service,
            catalog,
            crm,
            mail,
            reminder_day,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| HealthError::Config(format!("{} is not set", name)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Parse a base URL so that relative paths join beneath it.
pub fn directory_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> ConfigArgs {
        ConfigArgs {
            count_service_url: Some("https://counts.example.com/api".to_string()),
            count_service_apikey: Some("secret".to_string()),
            catalog_file: Some("feeds.json".into()),
            brevo_api_url: "https://api.brevo.com/v3/smtp/email".to_string(),
            sender_name: "RSS Mailer".to_string(),
            max_attempts: 10,
            retry_delay_ms: 1000,
            timeout_secs: 30,
            max_concurrency: 16,
            reminder_day: "fri".to_string(),
            ..ConfigArgs::default()
        }
    }

    #[test]
    fn test_dry_run_config_without_mail() {
        let config = HealthConfig::from_args(base_args(), false).unwrap();
        assert!(config.mail.is_none());
        assert!(config.crm.is_none());
        assert_eq!(config.reminder_day, Weekday::Fri);
        assert_eq!(config.count_service.base_url.as_str(), "https://counts.example.com/api/");
        assert_eq!(config.fetch.max_attempts, 10);
    }

    #[test]
    fn test_mail_required_outside_dry_run() {
        let err = HealthConfig::from_args(base_args(), true).unwrap_err();
        assert!(matches!(err, HealthError::Config(_)));
    }

    #[test]
    fn test_recipients_come_from_configuration() {
        let mut args = base_args();
        args.brevo_api_key = Some("key".to_string());
        args.sender_email = Some("mailer@example.com".to_string());
        args.report_recipients = vec![" ops@example.com".to_string(), "".to_string()];
        args.reminder_bcc = vec!["audit@example.com".to_string()];

        let mail = HealthConfig::from_args(args, true).unwrap().mail.unwrap();
        assert_eq!(mail.operators, vec!["ops@example.com".to_string()]);
        assert_eq!(mail.reminder_bcc, vec!["audit@example.com".to_string()]);
    }

    #[test]
    fn test_partial_crm_settings_disable_reminders() {
        let mut args = base_args();
        args.crm_token_url = Some("https://login.example.com/token".to_string());
        let config = HealthConfig::from_args(args, false).unwrap();
        assert!(config.crm.is_none());
    }

    #[test]
    fn test_rejects_zero_attempts_and_bad_weekday() {
        let mut args = base_args();
        args.max_attempts = 0;
        assert!(HealthConfig::from_args(args, false).is_err());

        let mut args = base_args();
        args.reminder_day = "someday".to_string();
        assert!(HealthConfig::from_args(args, false).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_concurrency() {
        let mut args = base_args();
        args.max_concurrency = 0;
        assert!(matches!(HealthConfig::from_args(args, false), Err(HealthError::Config(_))));

        let mut args = base_args();
        args.max_concurrency = usize::MAX;
        assert!(matches!(HealthConfig::from_args(args, false), Err(HealthError::Config(_))));
    }
}
