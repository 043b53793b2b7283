//! CSV export of issues over a day range.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use domains::models::ExportRow;
use domains::{DomainError, IssueStore, Result};

use crate::texts;

pub const CSV_HEADER: &str = "id,created_at,status,user_id,tg_user_id,text,latitude,longitude";

/// A closed day range, stored as the half-open instant range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPeriod {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl ExportPeriod {
    pub fn new(first_day: NaiveDate, last_day: NaiveDate) -> Self {
        Self {
            first_day,
            last_day,
        }
    }

    /// `YYYY-MM-DD..YYYY-MM-DD`, both ends inclusive.
    pub fn parse(raw: &str) -> Result<Self> {
        let (from, to) = raw
            .split_once("..")
            .ok_or_else(|| DomainError::Validation(texts::EXPORT_USAGE.to_string()))?;
        Ok(Self::new(parse_day(from)?, parse_day(to)?))
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.first_day.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper bound: midnight after the last day.
    pub fn to(&self) -> DateTime<Utc> {
        self.last_day.and_time(chrono::NaiveTime::MIN).and_utc() + TimeDelta::days(1)
    }

    pub fn label(&self) -> (String, String) {
        (
            self.first_day.format("%Y-%m-%d").to_string(),
            self.last_day.format("%Y-%m-%d").to_string(),
        )
    }
}

pub fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::Validation(texts::EXPORT_USAGE.to_string()))
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn coordinate(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

fn csv_line(row: &ExportRow) -> String {
    [
        row.id.to_string(),
        row.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        row.status.label().to_string(),
        row.user_id.to_string(),
        row.tg_user_id.to_string(),
        escape(&row.text),
        coordinate(row.latitude),
        coordinate(row.longitude),
    ]
    .join(",")
}

pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + rows.len() * 64);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&csv_line(row));
        out.push('\n');
    }
    out
}

pub struct ExportService {
    store: Arc<dyn IssueStore>,
}

impl ExportService {
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self { store }
    }

    pub async fn csv(&self, period: ExportPeriod) -> Result<String> {
        let rows = self.store.export_issues(period.from(), period.to()).await?;
        tracing::info!(rows = rows.len(), "csv export built");
        Ok(to_csv(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domains::models::IssueStatus;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn period_is_inclusive_of_last_day() {
        let period = assert_ok!(ExportPeriod::parse(" 2024-03-01 .. 2024-03-31 "));
        assert_eq!(period.from(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(period.to(), Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());

        assert!(matches!(
            ExportPeriod::parse("2024-03-01"),
            Err(DomainError::Validation(_))
        ));
        assert_err!(ExportPeriod::parse("2024-13-01..2024-03-02"));
    }

    #[test]
    fn csv_quotes_free_text_and_formats_coordinates() {
        let row = ExportRow {
            id: 3,
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap(),
            status: IssueStatus::InProgress,
            user_id: 4,
            tg_user_id: 900,
            text: "Яма, \"глубокая\"".into(),
            latitude: Some(48.5),
            longitude: None,
        };
        let csv = to_csv(&[row]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("3,2024-03-05T10:30:00Z,В обработке,4,900,\"Яма, \"\"глубокая\"\"\",48.500000,")
        );
    }
}
