//! Client-side views over backend data: history filtering, report export
//! and search snippets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::models::{HistoryEntry, OperationResult, SearchHit};
use crate::CoreError;

/// Backend timestamp format (SQLite `CURRENT_TIMESTAMP`, UTC).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Maximum number of characters shown for a search hit.
pub const SNIPPET_LEN: usize = 300;

/// Time window for the history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPeriod {
    Today,
    Week,
    #[default]
    Month,
    All,
}

impl FromStr for HistoryPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" | "day" => Ok(HistoryPeriod::Today),
            "week" => Ok(HistoryPeriod::Week),
            "month" => Ok(HistoryPeriod::Month),
            "all" => Ok(HistoryPeriod::All),
            other => Err(CoreError::Validation(format!(
                "unknown period {:?} (expected today, week, month or all)",
                other
            ))),
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HistoryPeriod::Today => "today",
            HistoryPeriod::Week => "week",
            HistoryPeriod::Month => "month",
            HistoryPeriod::All => "all",
        })
    }
}

/// Parse a backend timestamp as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

impl HistoryPeriod {
    /// Whether an entry stamped `timestamp` falls in this period as seen at `now`.
    pub fn contains(self, timestamp: Option<&str>, now: DateTime<Utc>) -> bool {
        if self == HistoryPeriod::All {
            return true;
        }
        let Some(at) = timestamp.and_then(parse_timestamp) else {
            return false;
        };
        match self {
            HistoryPeriod::Today => at.date_naive() == now.date_naive(),
            HistoryPeriod::Week => at >= now - Duration::days(7),
            HistoryPeriod::Month => at >= now - Duration::days(30),
            HistoryPeriod::All => true,
        }
    }
}

/// Entries of `history` that fall within `period`, order preserved.
pub fn filter_history(
    history: &[HistoryEntry],
    period: HistoryPeriod,
    now: DateTime<Utc>,
) -> Vec<&HistoryEntry> {
    history
        .iter()
        .filter(|entry| period.contains(entry.timestamp.as_deref(), now))
        .collect()
}

/// Decode a stored `report_data` column.
pub fn parse_report(report_data: &str) -> Result<Vec<OperationResult>, CoreError> {
    Ok(serde_json::from_str(report_data)?)
}

fn quote_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render a report as `Operation,Result` CSV, every field quoted.
pub fn report_to_csv(results: &[OperationResult]) -> String {
    let mut csv = String::from("Operation,Result\n");
    for r in results {
        csv.push_str(&quote_csv(&r.title));
        csv.push(',');
        csv.push_str(&quote_csv(&r.output));
        csv.push('\n');
    }
    csv
}

/// Default download name for the report of inbox message `id`.
pub fn report_filename(id: i64) -> String {
    format!("Report_{}.csv", id)
}

/// Display text for a search hit: braces and single quotes removed,
/// truncated to [`SNIPPET_LEN`] characters.
pub fn search_snippet(hit: &SearchHit) -> String {
    hit.content
        .as_deref()
        .unwrap_or("")
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '\''))
        .take(SNIPPET_LEN)
        .collect()
}

/// Sign of a rule-based sentiment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    pub fn of(score: f64) -> Self {
        if score > 0.0 {
            Polarity::Positive
        } else if score < 0.0 {
            Polarity::Negative
        } else {
            Polarity::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: i64, timestamp: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            id,
            timestamp: timestamp.map(str::to_string),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn period_filters() {
        let history = vec![
            entry(1, Some("2026-10-19 08:00:00")),
            entry(2, Some("2026-10-15 08:00:00")),
            entry(3, Some("2026-09-25 08:00:00")),
            entry(4, Some("2026-06-01 08:00:00")),
            entry(5, Some("garbage")),
            entry(6, None),
        ];
        let ids = |p: HistoryPeriod| -> Vec<i64> {
            filter_history(&history, p, now()).iter().map(|e| e.id).collect()
        };
        assert_eq!(ids(HistoryPeriod::Today), vec![1]);
        assert_eq!(ids(HistoryPeriod::Week), vec![1, 2]);
        assert_eq!(ids(HistoryPeriod::Month), vec![1, 2, 3]);
        assert_eq!(ids(HistoryPeriod::All), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn period_parses() {
        assert_eq!("Week".parse::<HistoryPeriod>().unwrap(), HistoryPeriod::Week);
        assert!("fortnight".parse::<HistoryPeriod>().is_err());
        assert_eq!(HistoryPeriod::default(), HistoryPeriod::Month);
    }

    #[test]
    fn report_csv_escapes_quotes() {
        let report = parse_report(
            r#"[{"title": "Summarization", "output": "Mean \"age\": 31"},
                {"title": "Translation", "output": "line1\nline2"}]"#,
        )
        .unwrap();
        assert_eq!(
            report_to_csv(&report),
            "Operation,Result\n\"Summarization\",\"Mean \"\"age\"\": 31\"\n\"Translation\",\"line1\nline2\"\n"
        );
        assert_eq!(report_filename(12), "Report_12.csv");
    }

    #[test]
    fn snippet_strips_and_truncates() {
        let hit = SearchHit {
            id: 1,
            content: Some(format!("{{'k': 'v'}}{}", "x".repeat(400))),
            ..Default::default()
        };
        let snippet = search_snippet(&hit);
        assert!(snippet.starts_with("k: v"));
        assert_eq!(snippet.chars().count(), SNIPPET_LEN);
        assert_eq!(Polarity::of(-0.5), Polarity::Negative);
        assert_eq!(Polarity::of(0.0), Polarity::Neutral);
    }
}
