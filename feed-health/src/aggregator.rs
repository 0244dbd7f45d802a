use crate::types::{FeedResult, ReportRow};
use std::collections::HashMap;
use tracing::warn;

/// Per-magazine article counts for one run, ordered for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedReport {
    rows: Vec<ReportRow>,
}

impl AggregatedReport {
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn unknown_count(&self) -> usize {
        self.rows.iter().filter(|r| r.article_count.is_none()).count()
    }

    pub fn get(&self, magazine: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.magazine == magazine)
    }
}

/// Merge per-feed outcomes into one row per magazine.
///
/// Results are folded in catalog order whatever order they completed in.
/// When a magazine appears more than once, the last known count wins and an
/// unknown outcome never replaces a known one. Rows are then sorted
/// ascending by count (unknown first), keeping first-seen order on ties.
pub fn aggregate(mut results: Vec<FeedResult>) -> AggregatedReport {
    results.sort_by_key(|r| r.index);

    let mut rows: Vec<ReportRow> = Vec::with_capacity(results.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for result in results {
        let count = result.ingestion_count().map(|c| c.article_count);
        match positions.get(&result.magazine) {
            Some(&pos) => {
                let row = &mut rows[pos];
                match (row.article_count, count) {
                    (Some(previous), Some(current)) if previous != current => {
                        warn!(
                            "Magazine {} is listed by several feeds with different counts \
                             ({} vs {}); keeping {}",
                            result.magazine, previous, current, current
                        );
                        row.article_count = Some(current);
                    }
                    (_, Some(current)) => row.article_count = Some(current),
                    (_, None) => {}
                }
            }
            None => {
                positions.insert(result.magazine.clone(), rows.len());
                rows.push(ReportRow {
                    magazine: result.magazine,
                    article_count: count,
                });
            }
        }
    }

    // Stable sort; None orders before Some
    rows.sort_by_key(|r| r.article_count);
    AggregatedReport { rows }
}
