//! Report requests and response shaping

use crate::error::{ConnectorError, Result};
use crate::table::{Cell, Table};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Rows requested per report
pub const REPORT_LIMIT: u32 = 10_000;

const PAGE_DIMENSIONS: &[&str] = &[
    "date",
    "country",
    "pageLocation",
    "sessionSource",
    "sessionMedium",
    "sessionCampaignName",
    "sessionDefaultChannelGroup",
    "sessionManualTerm",
];

const PAGE_METRICS: &[&str] = &[
    "newUsers",
    "activeUsers",
    "scrolledUsers",
    "totalUsers",
    "sessions",
    "engagedSessions",
    "bounceRate",
    "userEngagementDuration",
    "screenPageViews",
    "averageSessionDuration",
];

const EVENT_DIMENSIONS: &[&str] = &[
    "date",
    "country",
    "pageLocation",
    "sessionSource",
    "sessionMedium",
    "sessionCampaignName",
    "sessionDefaultChannelGroup",
    "sessionManualTerm",
    "eventName",
];

const EVENT_METRICS: &[&str] = &[
    "newUsers",
    "activeUsers",
    "scrolledUsers",
    "totalUsers",
    "sessions",
    "eventCount",
    "eventCountPerUser",
    "eventsPerSession",
];

/// Preset field selections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportCategory {
    Page,
    Event,
}

impl ReportCategory {
    pub fn dimensions(self) -> &'static [&'static str] {
        match self {
            ReportCategory::Page => PAGE_DIMENSIONS,
            ReportCategory::Event => EVENT_DIMENSIONS,
        }
    }

    pub fn metrics(self) -> &'static [&'static str] {
        match self {
            ReportCategory::Page => PAGE_METRICS,
            ReportCategory::Event => EVENT_METRICS,
        }
    }
}

impl std::str::FromStr for ReportCategory {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "page" => Ok(ReportCategory::Page),
            "event" => Ok(ReportCategory::Event),
            other => Err(ConnectorError::Config(format!("unknown report category '{other}'"))),
        }
    }
}

/// What to report on. A category overrides the explicit field lists.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub property_id: String,
    pub category: Option<ReportCategory>,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    /// Defaults to yesterday
    pub start_date: Option<NaiveDate>,
    /// Defaults to yesterday
    pub end_date: Option<NaiveDate>,
}

impl ReportRequest {
    pub fn category(property_id: impl Into<String>, category: ReportCategory) -> Self {
        Self {
            property_id: property_id.into(),
            category: Some(category),
            ..Default::default()
        }
    }

    /// Dimension and metric names to request; both must be non-empty
    pub fn fields(&self) -> Result<(Vec<String>, Vec<String>)> {
        let (dimensions, metrics) = match self.category {
            Some(category) => (
                category.dimensions().iter().map(|s| s.to_string()).collect(),
                category.metrics().iter().map(|s| s.to_string()).collect(),
            ),
            None => (self.dimensions.clone(), self.metrics.clone()),
        };

        if dimensions.is_empty() || metrics.is_empty() {
            return Err(ConnectorError::missing("dimensions and metrics"));
        }
        Ok((dimensions, metrics))
    }

    /// Wire body for `properties/{id}:runReport`
    pub fn to_body(&self) -> Result<RunReportBody> {
        if self.property_id.is_empty() {
            return Err(ConnectorError::missing("analytics property id"));
        }

        let (dimensions, metrics) = self.fields()?;
        let yesterday = Local::now().date_naive() - Duration::days(1);
        let start = self.start_date.unwrap_or(yesterday);
        let end = self.end_date.unwrap_or(yesterday);

        Ok(RunReportBody {
            dimensions: dimensions.into_iter().map(|name| Named { name }).collect(),
            metrics: metrics.into_iter().map(|name| Named { name }).collect(),
            date_ranges: vec![DateRange {
                start_date: start.format("%Y-%m-%d").to_string(),
                end_date: end.format("%Y-%m-%d").to_string(),
            }],
            limit: REPORT_LIMIT.to_string(),
            offset: "0".to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportBody {
    pub dimensions: Vec<Named>,
    pub metrics: Vec<Named>,
    pub date_ranges: Vec<DateRange>,
    pub limit: String,
    pub offset: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub dimension_headers: Vec<Named>,
    #[serde(default)]
    pub metric_headers: Vec<Named>,
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<ReportValue>,
    #[serde(default)]
    pub metric_values: Vec<ReportValue>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReportValue {
    #[serde(default)]
    pub value: String,
}

/// Dimension columns then metric columns. Dimensions stay text except
/// `date`, parsed from `YYYYMMDD`; metrics are typed numerically.
pub fn shape_report(response: &RunReportResponse) -> Table {
    let dimension_count = response.dimension_headers.len();
    let columns = response
        .dimension_headers
        .iter()
        .chain(&response.metric_headers)
        .map(|h| h.name.clone());
    let mut table = Table::new(columns);

    let date_column = response
        .dimension_headers
        .iter()
        .position(|h| h.name == "date");

    for row in &response.rows {
        let mut cells = Vec::with_capacity(table.num_columns());
        for (i, value) in row.dimension_values.iter().take(dimension_count).enumerate() {
            let cell = if Some(i) == date_column {
                parse_report_date(&value.value)
            } else {
                Cell::Text(value.value.clone())
            };
            cells.push(cell);
        }
        // Pad short dimension rows so metrics land under their headers
        cells.resize(dimension_count, Cell::Null);
        cells.extend(row.metric_values.iter().map(|v| Cell::infer(&v.value)));
        table.push_row(cells);
    }

    table.normalize_numeric();
    table
}

fn parse_report_date(raw: &str) -> Cell {
    match NaiveDate::parse_from_str(raw, "%Y%m%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map(Cell::DateTime)
            .unwrap_or(Cell::Null),
        Err(_) => Cell::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_overrides_fields() {
        let request = ReportRequest {
            property_id: "1".into(),
            category: Some(ReportCategory::Event),
            dimensions: vec!["x".into()],
            metrics: vec!["y".into()],
            ..Default::default()
        };
        let (dims, metrics) = request.fields().unwrap();
        assert_eq!(dims.last().map(String::as_str), Some("eventName"));
        assert_eq!(metrics.len(), EVENT_METRICS.len());
    }

    #[test]
    fn test_missing_fields() {
        let request = ReportRequest {
            property_id: "1".into(),
            dimensions: vec!["date".into()],
            ..Default::default()
        };
        assert!(matches!(request.fields(), Err(ConnectorError::MissingArgument(_))));
    }

    #[test]
    fn test_body_defaults() {
        let body = ReportRequest::category("123", ReportCategory::Page).to_body().unwrap();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["limit"], "10000");
        assert_eq!(value["offset"], "0");
        assert_eq!(value["dateRanges"][0]["startDate"], value["dateRanges"][0]["endDate"]);
        assert_eq!(value["dimensions"][0]["name"], "date");
    }

    #[test]
    fn test_shape_report() {
        let response: RunReportResponse = serde_json::from_value(json!({
            "dimensionHeaders": [{"name": "date"}, {"name": "country"}],
            "metricHeaders": [{"name": "sessions", "type": "TYPE_INTEGER"}, {"name": "bounceRate"}],
            "rows": [
                {"dimensionValues": [{"value": "20240131"}, {"value": "France"}],
                 "metricValues": [{"value": "12"}, {"value": "0.5"}]},
                {"dimensionValues": [{"value": "20240201"}, {"value": "Spain"}],
                 "metricValues": [{"value": "3"}, {"value": "1"}]}
            ]
        }))
        .unwrap();

        let table = shape_report(&response);
        assert_eq!(table.columns(), ["date", "country", "sessions", "bounceRate"]);

        let expected = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(table.rows()[0][0], Cell::DateTime(expected));
        assert_eq!(table.rows()[0][1], Cell::Text("France".into()));
        assert_eq!(table.rows()[1][2], Cell::Int(3));
        assert_eq!(table.rows()[1][3], Cell::Float(1.0));
    }

    #[test]
    fn test_empty_response() {
        let table = shape_report(&RunReportResponse::default());
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 0);
    }
}
