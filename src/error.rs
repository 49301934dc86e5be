//! Error types for connector operations

use thiserror::Error;

/// Errors that can occur during connector operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// A required argument was not supplied (e.g. no file reference at all)
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// Remote API answered with a non-success status
    #[error("API request failed ({status}): {body}")]
    Api { status: u16, body: String },

    /// Several remote entries matched and no parent was given to disambiguate
    #[error("ambiguous match: {0}")]
    Ambiguous(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote payload lacked a field we rely on
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// File type cannot be decoded into a table
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Content could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Token acquisition failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingArgument(what.into())
    }

    pub fn malformed(what: impl Into<String>) -> Self {
        Self::MalformedResponse(what.into())
    }

    /// Upstream status code, when the error came from a remote answer
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<csv::Error> for ConnectorError {
    fn from(e: csv::Error) -> Self {
        Self::Decode(format!("csv: {e}"))
    }
}

impl From<zip::result::ZipError> for ConnectorError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Decode(format!("zip: {e}"))
    }
}

impl From<calamine::Error> for ConnectorError {
    fn from(e: calamine::Error) -> Self {
        Self::Decode(format!("workbook: {e}"))
    }
}

impl From<parquet::errors::ParquetError> for ConnectorError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        Self::Decode(format!("parquet: {e}"))
    }
}

/// A convenience Result alias that defaults to [`ConnectorError`].
pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_status_and_body() {
        let err = ConnectorError::Api {
            status: 404,
            body: "itemNotFound".into(),
        };
        assert_eq!(err.to_string(), "API request failed (404): itemNotFound");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn missing_argument_display() {
        let err = ConnectorError::missing("file reference");
        assert_eq!(err.to_string(), "missing argument: file reference");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConnectorError::from(io_err);
        assert!(matches!(err, ConnectorError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
