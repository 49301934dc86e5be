//! Integration tests for the analytics report client using wiremock

use chrono::NaiveDate;
use dataconnect::analytics::auth::AnalyticsCredentials;
use dataconnect::analytics::client::AnalyticsClient;
use dataconnect::analytics::report::{ReportCategory, ReportRequest, REPORT_LIMIT};
use dataconnect::config::AnalyticsSettings;
use dataconnect::{Cell, ConnectorError};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, property: Option<&str>) -> AnalyticsClient {
    let settings = AnalyticsSettings {
        base_url: server.uri(),
        property_id: property.map(str::to_string),
        credentials_file: None,
    };
    AnalyticsClient::new(&settings, AnalyticsCredentials::static_token("test-token")).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_report_is_shaped_into_table() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/properties/123:runReport"))
        .and(bearer_token("test-token"))
        .and(body_partial_json(json!({
            "dimensions": [{"name": "date"}, {"name": "pagePath"}],
            "metrics": [{"name": "screenPageViews"}, {"name": "bounceRate"}],
            "dateRanges": [{"startDate": "2024-03-01", "endDate": "2024-03-02"}],
            "limit": REPORT_LIMIT.to_string(),
            "offset": "0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dimensionHeaders": [{"name": "date"}, {"name": "pagePath"}],
            "metricHeaders": [
                {"name": "screenPageViews", "type": "TYPE_INTEGER"},
                {"name": "bounceRate", "type": "TYPE_FLOAT"}
            ],
            "rows": [
                {
                    "dimensionValues": [{"value": "20240301"}, {"value": "/home"}],
                    "metricValues": [{"value": "42"}, {"value": "0.5"}]
                },
                {
                    "dimensionValues": [{"value": "20240302"}, {"value": "/pricing"}],
                    "metricValues": [{"value": "7"}, {"value": "1"}]
                }
            ],
            "rowCount": 2,
            "kind": "analyticsData#runReport"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = ReportRequest {
        property_id: "123".to_string(),
        dimensions: vec!["date".into(), "pagePath".into()],
        metrics: vec!["screenPageViews".into(), "bounceRate".into()],
        start_date: Some(day(2024, 3, 1)),
        end_date: Some(day(2024, 3, 2)),
        ..Default::default()
    };

    let table = client_for(&server, None).extract(&request).await.unwrap();

    assert_eq!(table.columns(), ["date", "pagePath", "screenPageViews", "bounceRate"]);
    assert_eq!(
        table.rows()[0][0],
        Cell::DateTime(day(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap())
    );
    assert_eq!(table.rows()[0][2], Cell::Int(42));
    assert_eq!(table.rows()[1][3], Cell::Float(1.0));
}

#[tokio::test]
async fn test_configured_property_is_the_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/properties/999:runReport"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dimensionHeaders": [{"name": "eventName"}],
            "metricHeaders": [{"name": "eventCount"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = ReportRequest::category("", ReportCategory::Event);
    let table = client_for(&server, Some("999")).extract(&request).await.unwrap();

    assert_eq!(table.num_rows(), 0);
    assert_eq!(table.columns(), ["eventName", "eventCount"]);
}

#[tokio::test]
async fn test_missing_fields_never_reach_the_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = ReportRequest {
        property_id: "123".to_string(),
        dimensions: vec!["date".into()],
        ..Default::default()
    };
    let result = client_for(&server, None).extract(&request).await;
    assert!(matches!(result, Err(ConnectorError::MissingArgument(_))));
}

#[tokio::test]
async fn test_upstream_error_keeps_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/properties/123:runReport"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let request = ReportRequest::category("123", ReportCategory::Page);
    match client_for(&server, None).extract(&request).await {
        Err(ConnectorError::Api { status, body }) => {
            assert_eq!(status, 403);
            assert_eq!(body, "PERMISSION_DENIED");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
