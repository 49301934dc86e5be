//! Execution audit log
//!
//! Mutating and listing operations append one row to a shared workbook.
//! The workbook is read in full, extended, and written back, so concurrent
//! writers race and the last one wins.

use super::client::GraphClient;
use super::content;
use super::locator::FileRef;
use crate::codec::ReadOptions;
use crate::config::env_value;
use crate::error::Result;
use crate::table::{Cell, Table, DATETIME_FORMAT};
use chrono::Local;

/// Column layout of the log sheet
pub const LOG_COLUMNS: [&str; 5] = [
    "execution_at",
    "username",
    "function_used",
    "kwargs",
    "response_code",
];

/// One log row
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub execution_at: String,
    pub username: String,
    pub function_used: String,
    pub kwargs: String,
    pub response_code: u16,
}

impl AuditRecord {
    pub fn now(operation: &str, arguments: &str, status: u16) -> Self {
        Self {
            execution_at: Local::now().format(DATETIME_FORMAT).to_string(),
            username: current_user(),
            function_used: operation.to_string(),
            kwargs: arguments.to_string(),
            response_code: status,
        }
    }

    fn into_row(self) -> Vec<Cell> {
        vec![
            Cell::Text(self.execution_at),
            Cell::Text(self.username),
            Cell::Text(self.function_used),
            Cell::Text(self.kwargs),
            Cell::Int(i64::from(self.response_code)),
        ]
    }
}

fn current_user() -> String {
    env_value("USER")
        .or_else(|| env_value("USERNAME"))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Append `record` to the log workbook
pub async fn record(client: &GraphClient, record: AuditRecord) -> Result<u16> {
    let settings = &client.settings.audit;
    let file = FileRef::path(settings.file_path.as_str());
    let options = ReadOptions {
        sheet_name: settings.sheet.clone(),
        ..Default::default()
    };

    let mut log = content::read_item(client, &file, &options).await?;

    // Timestamps come back typed from the workbook; write them as text
    log.map_column("execution_at", |cell| match cell {
        Cell::DateTime(dt) => Cell::Text(dt.format(DATETIME_FORMAT).to_string()),
        other => other.clone(),
    });

    let mut entry = Table::new(LOG_COLUMNS);
    entry.push_row(record.into_row());
    log.append(entry);

    content::write_range(client, &file, &log, &settings.sheet).await
}

impl GraphClient {
    /// Record an operation in the audit log when auditing is enabled.
    /// Failures are logged and never reach the caller.
    pub async fn audit(&self, operation: &str, arguments: &str, status: u16) {
        if !self.settings.audit.enabled {
            return;
        }

        let entry = AuditRecord::now(operation, arguments, status);
        if let Err(e) = record(self, entry).await {
            tracing::warn!("Failed to record '{}' in audit log: {}", operation, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_row_matches_columns() {
        let row = AuditRecord::now("delete_item", "Id(\"7\")", 204).into_row();
        assert_eq!(row.len(), LOG_COLUMNS.len());
        assert_eq!(row[2], Cell::Text("delete_item".into()));
        assert_eq!(row[4], Cell::Int(204));
    }

    #[test]
    fn test_timestamp_layout() {
        let record = AuditRecord::now("x", "", 200);
        assert!(chrono::NaiveDateTime::parse_from_str(&record.execution_at, DATETIME_FORMAT).is_ok());
    }
}
