//! Access Gate
//!
//! This module decides, for every incoming operation request, whether it is
//! permitted before any SQL is assembled. Porta is read-only by default;
//! each mutation kind must be enabled explicitly, and table access can be
//! narrowed with an allow-list and a block-list.
//!
//! # Check Order
//! 1. Feature flag — read kinds are always enabled, mutation kinds default
//!    to disabled
//! 2. Read-only mode — denies every mutation kind, independent of its flag
//! 3. Table authorization — block-list beats allow-list beats default-allow
//! 4. Shape — structural requirements per kind (non-empty filter for
//!    update/delete, non-empty column list for create_table)
//!
//! # Fail-Safe Defaults
//! The default policy permits reads only. Nothing in this module talks to
//! the database; a denied request never produces SQL.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{PortaError, Result};
use crate::request::{OperationKind, OperationRequest};

/// Default row ceiling applied when the configuration does not set one
pub const DEFAULT_MAX_ROWS: u64 = 1000;

/// Immutable policy snapshot consumed by the gate
///
/// Loaded once at startup by configuration resolution and never mutated
/// during a request's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct AccessPolicy {
    /// Deny every mutation kind regardless of its feature flag
    pub read_only: bool,

    /// Feature flag: `insert` tool
    pub allow_insert: bool,

    /// Feature flag: `update` tool
    pub allow_update: bool,

    /// Feature flag: `delete` tool
    pub allow_delete: bool,

    /// Feature flag: `create_table` tool
    pub allow_create_table: bool,

    /// When non-empty, only these tables are accessible
    pub allowed_tables: BTreeSet<String>,

    /// These tables are never accessible, even if also allow-listed
    pub blocked_tables: BTreeSet<String>,

    /// Upper bound on rows returned by `select`; per-request limits may
    /// lower it but never raise it
    pub max_rows: u64,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            read_only: false,
            allow_insert: false,
            allow_update: false,
            allow_delete: false,
            allow_create_table: false,
            allowed_tables: BTreeSet::new(),
            blocked_tables: BTreeSet::new(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl AccessPolicy {
    /// Whether the given operation kind is enabled
    ///
    /// Read kinds are always enabled; mutation kinds follow their flag.
    #[must_use]
    pub const fn feature_enabled(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::ListTables | OperationKind::DescribeTable | OperationKind::Select => {
                true
            }
            OperationKind::Insert => self.allow_insert,
            OperationKind::Update => self.allow_update,
            OperationKind::Delete => self.allow_delete,
            OperationKind::CreateTable => self.allow_create_table,
        }
    }

    /// Per-table predicate shared by up-front checks and the `list_tables`
    /// post-filter
    ///
    /// Block-list membership wins unconditionally; a non-empty allow-list is
    /// exhaustive. Names match byte-for-byte (see DESIGN.md).
    #[must_use]
    pub fn table_allowed(&self, table: &str) -> bool {
        if self.blocked_tables.contains(table) {
            return false;
        }
        if !self.allowed_tables.is_empty() {
            return self.allowed_tables.contains(table);
        }
        true
    }

    /// Like [`Self::table_allowed`], but with the specific denial reason
    pub fn check_table(&self, table: &str) -> Result<()> {
        if self.blocked_tables.contains(table) {
            return Err(PortaError::table_blocked(table));
        }
        if !self.allowed_tables.is_empty() && !self.allowed_tables.contains(table) {
            return Err(PortaError::table_not_allowed(table));
        }
        Ok(())
    }

    /// Clamp a requested row limit to the policy ceiling
    ///
    /// With no request limit the ceiling itself applies.
    #[must_use]
    pub fn effective_limit(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(limit) => limit.min(self.max_rows),
            None => self.max_rows,
        }
    }
}

/// The gate itself: admissibility decisions over a policy snapshot
///
/// Stateless beyond the snapshot; safe to share across concurrent requests.
#[derive(Debug, Clone)]
pub struct AccessGate {
    policy: AccessPolicy,
}

impl AccessGate {
    /// Create a gate over an immutable policy snapshot
    #[must_use]
    pub const fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    /// The policy snapshot this gate enforces
    #[must_use]
    pub const fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Decide admissibility of a request
    ///
    /// Checks run in the documented order; the first failure is returned and
    /// no SQL is built. `Ok(())` means the request may proceed to statement
    /// assembly.
    pub fn admit(&self, request: &OperationRequest) -> Result<()> {
        let kind = request.kind();

        // 1. Feature flag
        if !self.policy.feature_enabled(kind) {
            return Err(PortaError::feature_disabled(kind.as_str()));
        }

        // 2. Read-only mode (both checks must pass for mutations)
        if kind.is_mutation() && self.policy.read_only {
            return Err(PortaError::read_only(kind.as_str()));
        }

        // 3. Table authorization (list_tables filters post-hoc instead)
        if let Some(table) = request.table() {
            self.policy.check_table(table)?;
        }

        // 4. Shape
        self.check_shape(request)
    }

    /// Request-specific structural requirements
    ///
    /// The non-empty filter rule for update/delete only checks that a filter
    /// is syntactically present, not that it is semantically safe.
    fn check_shape(&self, request: &OperationRequest) -> Result<()> {
        match request {
            OperationRequest::Update { filter, .. } | OperationRequest::Delete { filter, .. } => {
                if filter.trim().is_empty() {
                    return Err(PortaError::invalid_request(format!(
                        "{} requires a non-empty filter (unscoped mass mutation is rejected)",
                        request.kind()
                    )));
                }
                Ok(())
            }
            OperationRequest::Insert { values, .. } => {
                if values.is_empty() {
                    return Err(PortaError::invalid_request(
                        "insert requires at least one column value",
                    ));
                }
                Ok(())
            }
            OperationRequest::CreateTable { table, columns, .. } => {
                if table.trim().is_empty() {
                    return Err(PortaError::invalid_request(
                        "create_table requires a table name",
                    ));
                }
                if columns.is_empty() {
                    return Err(PortaError::invalid_request(
                        "create_table requires at least one column definition",
                    ));
                }
                Ok(())
            }
            OperationRequest::ListTables
            | OperationRequest::DescribeTable { .. }
            | OperationRequest::Select { .. } => Ok(()),
        }
    }
}
