//! Execution Engine Seam
//!
//! This module defines the boundary between statement construction and
//! statement execution. The [`Executor`] trait is the only thing the service
//! layer knows about the database: hand it a parameterized statement, get
//! back a raw outcome (or a failure, propagated unchanged).
//!
//! The production implementation lives in [`mysql`] and delegates pooling,
//! wire protocol and transaction handling entirely to `mysql_async`. Tests
//! substitute a recording fake.

use crate::error::Result;
use crate::statement::Statement;

pub mod mysql;

/// Database connection parameters
///
/// Produced once by configuration resolution and handed to the executor at
/// startup.
#[derive(Clone)]
pub struct ConnectionSettings {
    /// Hostname or IP address
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Username
    pub user: String,

    /// Password (redacted from Debug output)
    pub password: String,

    /// Database (schema) name
    pub database: String,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Raw result of one executed statement, before normalization
///
/// Row-returning statements populate `columns`/`rows`; mutations populate
/// `affected_rows` and leave the rest empty.
#[derive(Debug, Clone, Default)]
pub struct RawOutcome {
    /// Column names in result-set order
    pub columns: Vec<String>,

    /// Rows as ordered scalar values, one inner vec per row
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Affected-row count for mutations
    pub affected_rows: u64,
}

/// Execution collaborator
///
/// One pooled connection is acquired per call and released unconditionally
/// when the call completes, success or failure. Implementations never retry
/// and never rewrite errors beyond wrapping the driver message.
pub trait Executor: Send + Sync {
    /// Execute one parameterized statement
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl std::future::Future<Output = Result<RawOutcome>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_settings_debug_redacts_password() {
        let settings = ConnectionSettings {
            host: "localhost".to_string(),
            port: 3306,
            user: "app".to_string(),
            password: "hunter2".to_string(),
            database: "appdb".to_string(),
        };
        let debug = format!("{settings:?}");
        assert!(debug.contains("localhost"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }
}
