use async_trait::async_trait;
use chrono::NaiveDate;
use feed_health::traits::{CountSource, FeedCatalog, Notifier, OwnerResolver};
use feed_health::types::*;
use feed_health::HealthCheck;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

struct StaticCatalog {
    feeds: Option<Vec<FeedDescriptor>>,
}

#[async_trait]
impl FeedCatalog for StaticCatalog {
    fn catalog_name(&self) -> String {
        "static".to_string()
    }

    async fn load_feeds(&self) -> Result<Vec<FeedDescriptor>> {
        self.feeds
            .clone()
            .ok_or_else(|| HealthError::Catalog("catalog unreachable".to_string()))
    }
}

/// Answers per magazine; later magazines in the map answer sooner.
struct ScriptedCounts {
    answers: HashMap<String, (u64, FetchOutcome)>,
}

#[async_trait]
impl CountSource for ScriptedCounts {
    async fn count(&self, magazine: &str) -> FetchOutcome {
        let (delay_ms, outcome) = self.answers[magazine].clone();
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        outcome
    }
}

struct DirectoryResolver {
    owners: HashMap<String, Vec<String>>,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl OwnerResolver for DirectoryResolver {
    async fn find_owners(&self, magazine: &str) -> Result<OwnerMatches> {
        self.queries.lock().unwrap().push(magazine.to_string());
        let owners: Vec<Option<String>> = self
            .owners
            .get(magazine)
            .map(|o| o.iter().cloned().map(Some).collect())
            .unwrap_or_default();
        Ok(OwnerMatches {
            total_size: owners.len(),
            owners,
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    reports: Mutex<Vec<(String, String)>>,
    reminders: Mutex<Vec<(String, Vec<PausedFeedNotice>)>>,
    fail_reports: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_report(&self, file_name: &str, content: &[u8]) -> Result<()> {
        if self.fail_reports {
            return Err(HealthError::Notify("mail API returned HTTP 401".to_string()));
        }
        self.reports
            .lock()
            .unwrap()
            .push((file_name.to_string(), String::from_utf8_lossy(content).into_owned()));
        Ok(())
    }

    async fn send_paused_reminder(&self, owner: &str, feeds: &[PausedFeedNotice]) -> Result<()> {
        self.reminders.lock().unwrap().push((owner.to_string(), feeds.to_vec()));
        Ok(())
    }
}

fn feed(publisher: &str, name: &str, paused: bool) -> FeedDescriptor {
    FeedDescriptor {
        publisher: publisher.to_string(),
        feed_name: name.to_string(),
        feed_url: format!("https://feeds.example.com/{}.xml", name.replace(' ', "-")),
        last_updated: None,
        paused,
    }
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()
}

#[tokio::test]
async fn test_duplicate_magazine_and_paused_feed_end_to_end() {
    init_tracing();
    info!("Testing end-to-end run with a duplicated magazine");

    let catalog = StaticCatalog {
        feeds: Some(vec![feed("Pub", "A", false), feed("Pub", "A", false), feed("Pub", "B", true)]),
    };
    let counts = Arc::new(ScriptedCounts {
        answers: HashMap::from([
            ("A".to_string(), (20, FetchOutcome::Counted(5))),
            ("B".to_string(), (0, FetchOutcome::Counted(0))),
        ]),
    });
    let resolver = DirectoryResolver {
        owners: HashMap::from([("B".to_string(), vec!["csm@example.com".to_string()])]),
        queries: Mutex::new(Vec::new()),
    };
    let notifier = RecordingNotifier::default();

    let summary = HealthCheck::new(&catalog, counts, 4, &notifier)
        .with_owner_resolver(&resolver)
        .run(run_date())
        .await
        .unwrap();

    let rows: Vec<(&str, Option<u64>)> = summary
        .report
        .rows()
        .iter()
        .map(|r| (r.magazine.as_str(), r.article_count))
        .collect();
    assert_eq!(rows, vec![("B", Some(0)), ("A", Some(5))]);
    assert_eq!(summary.feed_count, 3);
    assert!(summary.unknown_feeds.is_empty());

    let reports = notifier.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "daily_article_data_2024-6-7.csv");
    assert_eq!(reports[0].1, "magazine,articles\nB,0\nA,5\n");

    let reminders = notifier.reminders.lock().unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].0, "csm@example.com");
    assert_eq!(reminders[0].1[0].feed_name, "B");
    assert_eq!(*resolver.queries.lock().unwrap(), vec!["B".to_string()]);
}

#[tokio::test]
async fn test_partial_failures_are_reported_as_unknown() {
    init_tracing();

    let catalog = StaticCatalog {
        feeds: Some(vec![
            feed("Pub", "Healthy", false),
            feed("Pub", "Down", false),
            feed("Pub", "Garbled", false),
        ]),
    };
    let counts = Arc::new(ScriptedCounts {
        answers: HashMap::from([
            ("Healthy".to_string(), (0, FetchOutcome::Counted(8))),
            (
                "Down".to_string(),
                (
                    10,
                    FetchOutcome::Exhausted {
                        attempts: 10,
                        last_error: "HTTP 502".to_string(),
                    },
                ),
            ),
            (
                "Garbled".to_string(),
                (5, FetchOutcome::Malformed("expected a sequence".to_string())),
            ),
        ]),
    });
    let notifier = RecordingNotifier::default();

    let summary = HealthCheck::new(&catalog, counts, 2, &notifier).run(run_date()).await.unwrap();

    assert_eq!(summary.unknown_feeds.len(), 2);
    assert!(summary.reminders.is_none());
    assert_eq!(summary.report_csv, "magazine,articles\nDown,unknown\nGarbled,unknown\nHealthy,8\n");
}

#[tokio::test]
async fn test_new_york_times_reminder_uses_publisher_name() {
    init_tracing();

    let catalog = StaticCatalog {
        feeds: Some(vec![
            feed("The New York Times", "NYT > World", true),
            feed("The New York Times", "NYT > Arts", true),
            feed("Indie", "Retired Mag", true),
        ]),
    };
    let counts = Arc::new(ScriptedCounts {
        answers: HashMap::from([
            ("NYT > World".to_string(), (0, FetchOutcome::Counted(40))),
            ("NYT > Arts".to_string(), (0, FetchOutcome::Counted(12))),
            ("Retired Mag".to_string(), (0, FetchOutcome::Counted(0))),
        ]),
    });
    let resolver = DirectoryResolver {
        owners: HashMap::from([(
            "The New York Times".to_string(),
            vec!["nyt@example.com".to_string()],
        )]),
        queries: Mutex::new(Vec::new()),
    };
    let notifier = RecordingNotifier::default();

    let summary = HealthCheck::new(&catalog, counts, 4, &notifier)
        .with_owner_resolver(&resolver)
        .run(run_date())
        .await
        .unwrap();

    assert_eq!(
        *resolver.queries.lock().unwrap(),
        vec![
            "The New York Times".to_string(),
            "The New York Times".to_string(),
            "Retired Mag".to_string()
        ]
    );
    let reminders = notifier.reminders.lock().unwrap();
    assert_eq!(reminders.len(), 1);
    let names: Vec<&str> = reminders[0].1.iter().map(|n| n.feed_name.as_str()).collect();
    assert_eq!(names, vec!["NYT > World", "NYT > Arts"]);

    let summary_reminders = summary.reminders.unwrap();
    assert_eq!(summary_reminders.sent, 1);
    assert_eq!(summary_reminders.groups.skipped.len(), 1);
}

#[tokio::test]
async fn test_catalog_failure_aborts_run() {
    init_tracing();

    let catalog = StaticCatalog { feeds: None };
    let counts = Arc::new(ScriptedCounts { answers: HashMap::new() });
    let notifier = RecordingNotifier::default();

    let err = HealthCheck::new(&catalog, counts, 4, &notifier).run(run_date()).await.unwrap_err();

    assert!(matches!(err, HealthError::Catalog(_)));
    assert!(notifier.reports.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_report_delivery_failure_fails_run() {
    init_tracing();

    let catalog = StaticCatalog {
        feeds: Some(vec![feed("Pub", "A", false)]),
    };
    let counts = Arc::new(ScriptedCounts {
        answers: HashMap::from([("A".to_string(), (0, FetchOutcome::Counted(1)))]),
    });
    let notifier = RecordingNotifier {
        fail_reports: true,
        ..RecordingNotifier::default()
    };

    let err = HealthCheck::new(&catalog, counts, 4, &notifier).run(run_date()).await.unwrap_err();
    assert!(matches!(err, HealthError::Notify(_)));
}
