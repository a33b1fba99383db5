//! Report domain errors

use thiserror::Error;

/// Errors raised while generating reports
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    /// Date string did not match the expected format
    #[error("Incorrect date format, should be YYYY-MM-DD: {value}")]
    InvalidDate { value: String },

    /// A worker result row could not be interpreted as a stack record
    #[error("Malformed analysis record: {reason}")]
    MalformedRecord { reason: String },

    /// Relational store query failed
    #[error("Database error: {message}")]
    Database { message: String },

    /// Object storage read or write failed
    #[error("Object storage error: {message}")]
    Storage { message: String },

    /// Graph query collaborator failed
    #[error("Graph query error: {message}")]
    Graph { message: String },

    /// Remote API returned a non-success status
    #[error("{service} returned status {status}")]
    Http { service: String, status: u16 },

    /// Network-level failure talking to a remote API
    #[error("Network error calling {service}: {message}")]
    Network { service: String, message: String },

    /// Outbound call exceeded its bounded timeout
    #[error("Request to {service} timed out after {seconds}s")]
    Timeout { service: String, seconds: u64 },

    /// JSON (de)serialization failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ReportError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            message: message.into(),
        }
    }

    pub fn network(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            service: service.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
