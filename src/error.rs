//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Porta.
//! All errors are structured and map to stable error codes for JSON output.
//!
//! # Error Categories
//! - Gate denials (`FeatureDisabled`, `ReadOnlyMode`, `TableBlocked`,
//!   `TableNotAllowed`): produced locally before any SQL is built, logged as
//!   security events
//! - `InvalidRequest`: malformed input, rejected before execution
//! - `QueryFailed`: opaque failure from the execution layer, underlying
//!   message preserved
//! - `ConnectionFailed`: database connection errors
//! - `ConfigError`: configuration resolution errors

use thiserror::Error;

/// Main error type for Porta operations
#[derive(Error, Debug)]
pub enum PortaError {
    /// Operation kind is not enabled by the policy snapshot
    #[error("Feature disabled: {operation} is not enabled on this server")]
    FeatureDisabled { operation: String },

    /// Mutation attempted while the server is in read-only mode
    #[error("Read-only mode: {operation} is a write operation and this server is read-only")]
    ReadOnlyMode { operation: String },

    /// Table appears on the block-list
    #[error("Table blocked: access to table '{table}' is blocked by policy")]
    TableBlocked { table: String },

    /// Allow-list is in force and the table is not on it
    #[error("Table not allowed: table '{table}' is not on the allow-list")]
    TableNotAllowed { table: String },

    /// Malformed input or missing required parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Statement execution failed (driver/server error, propagated unchanged)
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Configuration resolution error (bad env var, missing parameter, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PortaError {
    /// Convert error to a stable error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling by agents.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::FeatureDisabled { .. } => "FEATURE_DISABLED",
            Self::ReadOnlyMode { .. } => "READ_ONLY_MODE",
            Self::TableBlocked { .. } => "TABLE_BLOCKED",
            Self::TableNotAllowed { .. } => "TABLE_NOT_ALLOWED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Whether this error is an authorization denial from the access gate
    ///
    /// Denials are logged as security events, distinct from ordinary
    /// operational errors. `InvalidRequest` is deliberately not a denial.
    #[must_use]
    pub const fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::FeatureDisabled { .. }
                | Self::ReadOnlyMode { .. }
                | Self::TableBlocked { .. }
                | Self::TableNotAllowed { .. }
        )
    }

    /// Get human-readable error message (agent-appropriate, no sensitive data)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a feature-disabled denial
    pub fn feature_disabled(operation: impl Into<String>) -> Self {
        Self::FeatureDisabled { operation: operation.into() }
    }

    /// Create a read-only-mode denial
    pub fn read_only(operation: impl Into<String>) -> Self {
        Self::ReadOnlyMode { operation: operation.into() }
    }

    /// Create a blocked-table denial
    pub fn table_blocked(table: impl Into<String>) -> Self {
        Self::TableBlocked { table: table.into() }
    }

    /// Create a not-on-allow-list denial
    pub fn table_not_allowed(table: impl Into<String>) -> Self {
        Self::TableNotAllowed { table: table.into() }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a query failed error
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for Porta operations
pub type Result<T> = std::result::Result<T, PortaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PortaError::feature_disabled("insert").error_code(), "FEATURE_DISABLED");
        assert_eq!(PortaError::read_only("delete").error_code(), "READ_ONLY_MODE");
        assert_eq!(PortaError::table_blocked("secrets").error_code(), "TABLE_BLOCKED");
        assert_eq!(PortaError::table_not_allowed("orders").error_code(), "TABLE_NOT_ALLOWED");
        assert_eq!(PortaError::invalid_request("test").error_code(), "INVALID_REQUEST");
        assert_eq!(PortaError::query_failed("test").error_code(), "QUERY_FAILED");
        assert_eq!(PortaError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(PortaError::config_error("test").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_denial_classification() {
        assert!(PortaError::feature_disabled("insert").is_denial());
        assert!(PortaError::read_only("update").is_denial());
        assert!(PortaError::table_blocked("secrets").is_denial());
        assert!(PortaError::table_not_allowed("orders").is_denial());

        assert!(!PortaError::invalid_request("empty filter").is_denial());
        assert!(!PortaError::query_failed("syntax error").is_denial());
        assert!(!PortaError::connection_failed("refused").is_denial());
        assert!(!PortaError::config_error("bad port").is_denial());
    }

    #[test]
    fn test_error_messages() {
        let err = PortaError::table_blocked("audit_log");
        assert!(err.message().contains("audit_log"));

        let err = PortaError::read_only("create_table");
        assert!(err.message().contains("read-only"));
        assert!(err.message().contains("create_table"));
    }
}
