//! Error types for surveyboard-core
//!
//! Lookup failures never escape [`StatusCache::fetch`](crate::StatusCache::fetch);
//! they are downgraded into per-category error reasons on the record.
//! `CoreError` is what lookups, config loading and key parsing return.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for surveyboard operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Input Errors
    // ===================
    #[error("Invalid subject key: {reason}")]
    InvalidSubject { reason: String },

    #[error("Invalid category '{value}': expected a four-digit year or 'current'")]
    InvalidCategory { value: String },

    // ===================
    // Lookup Errors
    // ===================
    #[error("Lookup failed for category {category}: {message}")]
    Lookup { category: String, message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Background task failed: {message}")]
    TaskJoin { message: String },

    // ===================
    // Config Errors
    // ===================
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config in {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        message: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CoreError {
    /// Wrap a rusqlite error with a short description of what was attempted
    pub fn database(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Database {
            message: message.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_message_names_category() {
        let err = CoreError::Lookup {
            category: "2023".to_string(),
            message: "no such table: survey_2023_responses".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("2023"));
        assert!(text.contains("no such table"));
    }

    #[test]
    fn test_database_error_keeps_source() {
        let err = CoreError::database(
            "query survey_2022_responses",
            rusqlite::Error::QueryReturnedNoRows,
        );
        assert!(err.to_string().contains("survey_2022_responses"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
