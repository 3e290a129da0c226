//! Error types for the event normalizer.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the event normalizer.
#[derive(Error, Debug)]
pub enum Error {
    /// A record passed filtering but holds a field that cannot be resolved.
    #[error("Data error in event {event_id}: field `{field}` {reason}")]
    Data {
        /// Identifier of the offending record.
        event_id: String,
        /// Input key that could not be resolved.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a data error for a field of a specific record.
    pub fn data(
        event_id: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Data {
            event_id: event_id.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Is this a per-record data error (as opposed to a setup failure)?
    pub fn is_data(&self) -> bool {
        matches!(self, Error::Data { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_message() {
        let err = Error::data("e9", "currency", "has no rate for `JPY`");
        assert_eq!(
            err.to_string(),
            "Data error in event e9: field `currency` has no rate for `JPY`"
        );
        assert!(err.is_data());
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_data());
    }
}
