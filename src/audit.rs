//! Audit Logging
//!
//! Structured event emission for the three event classes the server cares
//! about: completed operations, security denials, and execution errors.
//!
//! [`AuditLog`] is an explicitly constructed collaborator handed to the
//! service at startup; nothing in the library reaches for ambient mutable
//! state. Events flow through `tracing` to stderr (stdout is reserved for
//! protocol/JSON output), under two targets so operators can filter
//! security events separately from operational noise:
//! - `porta::security` — gate denials
//! - `porta::audit` — completions, rejected requests, execution errors
//!
//! Execution errors log the statement text but never bound parameter
//! values.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::request::OperationKind;

/// Injected logging collaborator
///
/// Zero-sized and cloneable; construction is explicit so tests can pass one
/// in without touching global subscriber state.
#[derive(Debug, Clone, Default)]
pub struct AuditLog;

impl AuditLog {
    /// Create a new audit log handle
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// A gated operation completed successfully
    pub fn operation_completed(
        &self,
        kind: OperationKind,
        table: Option<&str>,
        rows: u64,
        elapsed_ms: u64,
    ) {
        tracing::info!(
            target: "porta::audit",
            operation = %kind,
            table = table.unwrap_or("-"),
            rows,
            elapsed_ms,
            "operation completed"
        );
    }

    /// The access gate denied an operation (security event)
    pub fn access_denied(&self, kind: OperationKind, table: Option<&str>, reason: &'static str) {
        tracing::warn!(
            target: "porta::security",
            operation = %kind,
            table = table.unwrap_or("-"),
            reason,
            "operation denied"
        );
    }

    /// A request was structurally invalid (ordinary error, not a denial)
    pub fn request_rejected(&self, kind: OperationKind, message: &str) {
        tracing::error!(
            target: "porta::audit",
            operation = %kind,
            error = message,
            "request rejected"
        );
    }

    /// Statement execution failed
    ///
    /// Logs the statement text only; bound parameter values stay out of the
    /// logs.
    pub fn execution_failed(&self, kind: OperationKind, statement: &str, message: &str) {
        tracing::error!(
            target: "porta::audit",
            operation = %kind,
            statement,
            error = message,
            "statement execution failed"
        );
    }
}

/// Initialize tracing for the process
///
/// Logs go to stderr with environment-based filtering via `RUST_LOG`
/// (default level `info` for this crate). Set `LOG_FORMAT=json` for
/// structured JSON output suitable for log aggregation.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("porta=info".parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .init();
    }

    Ok(())
}
