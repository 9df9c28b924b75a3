//! Porta - Least-Privilege MySQL Tool Server
//!
//! Porta exposes a MySQL database's CRUD operations as a fixed set of MCP
//! tools for autonomous AI coding agents, behind an access gate driven by an
//! immutable policy snapshot: per-operation feature flags, a read-only mode,
//! table allow/block lists, and a row ceiling.
//!
//! # Core Principles
//! - Least privilege by default (reads only; each mutation opted in)
//! - Deny before build (no SQL is assembled for a rejected request)
//! - Values bind as parameters, never as interpolated text
//! - Deterministic, structured output with stable error codes
//!
//! # Architecture
//! The CLI and the MCP server are thin wrappers over the same service
//! pipeline: access gate → statement builder → executor → normalization.
//! Pooling and wire protocol belong to `mysql_async`; audit logging is an
//! injected collaborator, not ambient state.
//!
//! # Module Organization
//! - [`error`] - Error types with stable codes
//! - [`request`] - Operation requests and the closed value model
//! - [`gate`] - Access policy snapshot and admissibility checks
//! - [`statement`] - Parameterized SQL assembly
//! - [`engine`] - Executor seam and the MySQL implementation
//! - [`service`] - Per-request orchestration and result normalization
//! - [`audit`] - Structured audit/security logging
//! - [`config`] - One-shot configuration resolution
//! - [`output`] - JSON envelopes and table rendering
//! - [`mcp`] - JSON-RPC 2.0 MCP server over stdio

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod mcp;
pub mod output;
pub mod request;
pub mod service;
pub mod statement;

// Re-export commonly used types for convenience
pub use audit::AuditLog;
pub use config::{resolve, resolve_from, Overrides, Settings};
pub use engine::{mysql::MySqlExecutor, ConnectionSettings, Executor, RawOutcome};
pub use error::{PortaError, Result};
pub use gate::{AccessGate, AccessPolicy};
pub use mcp::McpServer;
pub use output::{render_table, ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use request::{ColumnSpec, OperationKind, OperationRequest, SqlValue, TableOptions};
pub use service::{
    ColumnDescriptor, DbService, OperationOutput, QueryResult, TableDescription, TableList,
};
pub use statement::Statement;
