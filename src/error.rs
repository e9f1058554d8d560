//! Unified error type hierarchy for the job-board audit
//!
//! Provides structured error handling with StoreError (data-store collaborator)
//! and AuditError (configuration, usage and category-level failures).

use std::io;
use thiserror::Error;

/// Data-store collaborator errors.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The request never produced a response (DNS, TLS, timeout, connection reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status
    #[error("Store returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded into the expected shape
    #[error("Failed to decode store response: {0}")]
    Decode(String),

    /// Failure injected by an in-memory store
    #[error("{0}")]
    Injected(String),
}

impl StoreError {
    /// True when the store itself rejected the request (missing relation,
    /// missing column, permission denied) as opposed to an unreachable store.
    pub fn is_api(&self) -> bool {
        matches!(self, StoreError::Api { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

/// Global error type for audit operations.
///
/// Only `ConfigurationMissing`, `InvalidConfig` and `UnknownCategory` are allowed
/// to abort a run; everything else is caught at the category boundary and turned
/// into report data.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Required endpoint or credential absent at startup
    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(String),

    /// Configuration present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Category key outside the fixed set
    #[error("Unknown audit category: {0}")]
    UnknownCategory(String),

    /// Data-store call failed inside a category auditor
    #[error(transparent)]
    Store(#[from] StoreError),

    /// File system call failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Config, snapshot or report JSON was malformed
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl AuditError {
    /// Process exit status for errors that abort the whole run.
    pub fn exit_code(&self) -> i32 {
        match self {
            AuditError::ConfigurationMissing(_)
            | AuditError::InvalidConfig(_)
            | AuditError::UnknownCategory(_) => 2,
            _ => 1,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Api {
            status: 404,
            message: "relation \"public.wallet\" does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Store returned 404: relation \"public.wallet\" does not exist"
        );
        assert!(err.is_api());
        assert!(!StoreError::Transport("timed out".into()).is_api());
    }

    #[test]
    fn test_store_error_is_transparent_in_audit_error() {
        let err: AuditError = StoreError::Injected("connection refused".into()).into();
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_configuration_errors_are_usage_errors() {
        let err = AuditError::ConfigurationMissing("SUPABASE_URL".to_string());
        assert_eq!(err.to_string(), "Missing required configuration: SUPABASE_URL");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(AuditError::UnknownCategory("seo".into()).exit_code(), 2);
    }
}
