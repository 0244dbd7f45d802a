use crate::aggregator::AggregatedReport;
use chrono::NaiveDate;

pub const UNKNOWN_COUNT: &str = "unknown";

/// File name the report is delivered under for a given run date.
pub fn report_file_name(run_date: NaiveDate) -> String {
    format!("daily_article_data_{}.csv", run_date.format("%Y-%-m-%-d"))
}

/// Render the report as CSV with a `magazine,articles` header.
pub fn render_csv(report: &AggregatedReport) -> String {
    let mut out = String::from("magazine,articles\n");
    for row in report.rows() {
        let count = match row.article_count {
            Some(n) => n.to_string(),
            None => UNKNOWN_COUNT.to_string(),
        };
        out.push_str(&csv_field(&row.magazine));
        out.push(',');
        out.push_str(&count);
        out.push('\n');
    }
    out
}

// RFC 4180: quote fields containing separators, quotes or line breaks
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
