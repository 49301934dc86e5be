//! Analytics Client

use super::auth::AnalyticsCredentials;
use super::report::{shape_report, ReportRequest, RunReportResponse};
use crate::config::AnalyticsSettings;
use crate::error::{ConnectorError, Result};
use crate::graph::http::sanitize_for_log;
use crate::table::Table;
use reqwest::Client;
use std::time::Duration;

/// Report calls can run long on wide date ranges
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(500);

/// Reporting API client
#[derive(Clone)]
pub struct AnalyticsClient {
    pub credentials: AnalyticsCredentials,
    http: Client,
    base_url: String,
    default_property: Option<String>,
}

impl AnalyticsClient {
    pub fn new(settings: &AnalyticsSettings, credentials: AnalyticsCredentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("dataconnect/", env!("CARGO_PKG_VERSION")))
            .timeout(REPORT_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            credentials,
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_property: settings.property_id.clone(),
        })
    }

    /// Client with credentials resolved from the settings
    pub async fn from_settings(settings: &AnalyticsSettings) -> Result<Self> {
        let credentials = AnalyticsCredentials::resolve(settings.credentials_file.as_deref()).await?;
        Self::new(settings, credentials)
    }

    fn report_url(&self, property_id: &str) -> String {
        format!("{}/v1beta/properties/{}:runReport", self.base_url, property_id)
    }

    /// Run one report and shape it into a table. An empty property id in
    /// the request falls back to the configured one.
    pub async fn extract(&self, request: &ReportRequest) -> Result<Table> {
        let mut request = request.clone();
        if request.property_id.is_empty() {
            if let Some(default) = &self.default_property {
                request.property_id = default.clone();
            }
        }

        let body = request.to_body()?;
        let url = self.report_url(&request.property_id);
        let token = self.credentials.get_token().await?;

        tracing::debug!("POST {}", url);
        let response = self.http.post(&url).bearer_auth(token).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::error!("Report request failed: {} - {}", status, sanitize_for_log(&text));
            return Err(ConnectorError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let report: RunReportResponse = serde_json::from_str(&text)?;
        let table = shape_report(&report);
        tracing::info!(
            "Report for property {}: {} row(s), {} column(s)",
            request.property_id,
            table.num_rows(),
            table.num_columns()
        );
        Ok(table)
    }
}
