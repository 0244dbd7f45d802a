use chrono::{Datelike, Local, Utc};
use clap::Parser;
use feed_health::config::CatalogSource;
use feed_health::sources::{CloudantCatalog, JsonFileCatalog};
use feed_health::traits::{CountSource, FeedCatalog, Notifier};
use feed_health::{
    BrevoNotifier, ConfigArgs, CrmOwnerResolver, Fetcher, HealthCheck, HealthConfig, LogNotifier,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "feed-health", about = "Daily ingestion report and paused feed reminders")]
struct Cli {
    /// Log emails instead of sending them
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Send paused feed reminders regardless of the weekday
    #[arg(long, default_value_t = false)]
    force_reminder: bool,
    /// Also write the CSV report to this path
    #[arg(long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Respects RUST_LOG (default `info`); FEED_HEALTH_LOG_FORMAT=json switches
/// to JSON lines.
fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);
    let builder = tracing_subscriber::registry().with(filter);

    match std::env::var("FEED_HEALTH_LOG_FORMAT").as_deref() {
        Ok("json") => {
            let _ = builder.with(fmt_layer.json().flatten_event(true)).try_init();
        }
        _ => {
            let _ = builder.with(fmt_layer.compact()).try_init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let run_start = Utc::now();
    let today = Local::now();
    let config = HealthConfig::from_args(cli.config, !cli.dry_run)?;
    let timeout = config.fetch.timeout;

    info!("Starting feed health check{}", if cli.dry_run { " (dry run)" } else { "" });

    let catalog: Box<dyn FeedCatalog> = match &config.catalog {
        CatalogSource::Cloudant(cloudant) => {
            Box::new(CloudantCatalog::new(cloudant.clone(), timeout)?)
        }
        CatalogSource::File(path) => Box::new(JsonFileCatalog::new(path.clone())),
    };

    let counts: Arc<dyn CountSource> = Arc::new(Fetcher::new(
        config.fetch.clone(),
        &config.count_service,
        run_start,
    )?);

    let notifier: Box<dyn Notifier> = match (&config.mail, cli.dry_run) {
        (Some(mail), false) => Box::new(BrevoNotifier::new(mail.clone(), timeout)?),
        (None, false) => anyhow::bail!("mail settings are required unless --dry-run is given"),
        (_, true) => Box::new(LogNotifier),
    };

    let reminders_due = cli.force_reminder || today.weekday() == config.reminder_day;
    let resolver = if !reminders_due {
        info!(
            "Today is {}; paused feed reminders go out on {}",
            today.weekday(),
            config.reminder_day
        );
        None
    } else {
        match &config.crm {
            Some(crm) => match CrmOwnerResolver::connect(crm.clone(), timeout).await {
                Ok(resolver) => Some(resolver),
                Err(e) => {
                    error!("Skipping paused feed reminders: {}", e);
                    None
                }
            },
            None => {
                warn!("Skipping paused feed reminders: CRM settings are incomplete");
                None
            }
        }
    };

    let mut check = HealthCheck::new(
        catalog.as_ref(),
        counts,
        config.fetch.max_concurrency,
        notifier.as_ref(),
    );
    if let Some(resolver) = &resolver {
        check = check.with_owner_resolver(resolver);
    }

    let summary = check.run(today.date_naive()).await?;

    if let Some(path) = &cli.output {
        tokio::fs::write(path, summary.report_csv.as_bytes()).await?;
        info!("Wrote report to {}", path.display());
    }

    if let Some(reminders) = &summary.reminders {
        info!(
            "Paused feed reminders: {} sent, {} failed, {} feeds skipped",
            reminders.sent,
            reminders.failed.len(),
            reminders.groups.skipped.len()
        );
    }
    if !summary.unknown_feeds.is_empty() {
        warn!(
            "{} of {} feeds have no article count",
            summary.unknown_feeds.len(),
            summary.feed_count
        );
    }

    info!("Feed health check finished");
    Ok(())
}
