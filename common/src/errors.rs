// Error handling framework

use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

/// A polling interval string that could not be read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid interval '{0}'")]
pub struct InvalidInterval(pub String);

/// Errors talking to the PRTG HTTP API
#[derive(Error, Debug)]
pub enum PrtgError {
    /// Transport-level failure (connect, timeout, reset). Retryable.
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("PRTG responded with status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Invalid PRTG response: {0}")]
    InvalidResponse(String),

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

impl PrtgError {
    /// Whether the request may succeed if sent again
    pub fn is_transient(&self) -> bool {
        matches!(self, PrtgError::Http(_))
    }
}

/// Sensor table parsing errors
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to parse CSV table: {0}")]
    Csv(String),

    #[error("Sensor table is missing required column: {0}")]
    MissingColumn(String),
}

impl From<csv::Error> for TableError {
    fn from(err: csv::Error) -> Self {
        TableError::Csv(err.to_string())
    }
}

/// Inheritance toggle script errors
#[derive(Error, Debug)]
pub enum InheritanceError {
    #[error("Failed to run inheritance script: {0}")]
    Spawn(String),

    #[error("Inheritance script exited with {code:?} for sensor {sensor_id}")]
    ExitStatus {
        sensor_id: String,
        code: Option<i32>,
    },
}

/// Errors that abort an interval edit run
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Failed to retrieve sensors: {0}")]
    Fetch(#[from] PrtgError),

    #[error("Failed to read sensor table: {0}")]
    Table(#[from] TableError),

    #[error("Maximum connection retries ({attempts}) exceeded for {url}")]
    RetriesExhausted { attempts: u32, url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_transient() {
        assert!(PrtgError::Http("connection reset".to_string()).is_transient());
        assert!(!PrtgError::Status {
            status: 401,
            reason: "Unauthorized".to_string()
        }
        .is_transient());
        assert!(!PrtgError::InvalidResponse("empty".to_string()).is_transient());
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = EditorError::RetriesExhausted {
            attempts: 3,
            url: "https://prtg.local/api/setobjectproperty.htm".to_string(),
        };
        assert!(err.to_string().contains("(3)"));
    }

    #[test]
    fn test_invalid_interval_display() {
        let err = "soon".parse::<crate::models::Interval>().unwrap_err();
        assert_eq!(err, InvalidInterval("soon".to_string()));
        assert_eq!(err.to_string(), "invalid interval 'soon'");
    }

    #[test]
    fn test_table_error_wraps_into_editor_error() {
        let err: EditorError = TableError::MissingColumn("ID".to_string()).into();
        assert!(err.to_string().contains("missing required column: ID"));
    }
}
