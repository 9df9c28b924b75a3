//! Operation Service
//!
//! The service ties the pieces together, one pass per request:
//! gate → statement builder → executor → result normalization, with audit
//! events emitted along the way. It is stateless beyond the policy snapshot
//! and safe to share across concurrent in-flight requests.
//!
//! `describe_table` is the one operation that issues two statements for a
//! single logical request; they run concurrently over separate pooled
//! connections and both must succeed.

use std::time::Instant;

use serde::Serialize;

use crate::audit::AuditLog;
use crate::engine::{Executor, RawOutcome};
use crate::error::{PortaError, Result};
use crate::gate::{AccessGate, AccessPolicy};
use crate::request::{OperationKind, OperationRequest, SqlValue};
use crate::statement::{self, Statement};

/// Normalized result of an executed statement
///
/// Row statements populate `columns`/`rows`; mutations report
/// `rows_affected` with an empty column list. Elapsed time is measured from
/// statement dispatch to result receipt and always reported.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Column names in result-set order
    pub columns: Vec<String>,

    /// Rows as ordered scalar values
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned
    pub row_count: usize,

    /// Number of rows affected (mutations only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,

    /// Execution time in milliseconds
    pub elapsed_ms: u64,
}

impl QueryResult {
    fn from_rows(outcome: RawOutcome, elapsed_ms: u64) -> Self {
        Self {
            row_count: outcome.rows.len(),
            columns: outcome.columns,
            rows: outcome.rows,
            rows_affected: None,
            elapsed_ms,
        }
    }

    fn from_mutation(outcome: &RawOutcome, elapsed_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            rows_affected: Some(outcome.affected_rows),
            elapsed_ms,
        }
    }
}

/// Result of `list_tables`: accessible table names, policy-filtered
#[derive(Debug, Clone, Serialize)]
pub struct TableList {
    pub tables: Vec<String>,

    /// Execution time in milliseconds
    pub elapsed_ms: u64,
}

/// One column descriptor from `describe_table`
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Engine-reported data type (e.g. `varchar`, `int`)
    #[serde(rename = "type")]
    pub data_type: String,

    /// Whether the column accepts NULL
    pub nullable: bool,

    /// Key role as reported by the engine: `PRI`, `UNI`, `MUL` or empty
    pub key: String,

    /// Default value, if declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Engine extras such as `auto_increment`
    pub extra: String,
}

/// Joined result of `describe_table`: schema plus total row count
#[derive(Debug, Clone, Serialize)]
pub struct TableDescription {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub total_rows: u64,

    /// Execution time in milliseconds (whole join)
    pub elapsed_ms: u64,
}

/// Output of one admitted operation
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    Tables(TableList),
    Description(TableDescription),
    Query(QueryResult),
}

/// The per-request orchestrator: gate, build, execute, normalize
#[derive(Clone)]
pub struct DbService<E: Executor> {
    gate: AccessGate,
    executor: E,
    audit: AuditLog,
}

impl<E: Executor> DbService<E> {
    /// Create a service over a policy snapshot, an executor and an injected
    /// audit log
    pub const fn new(policy: AccessPolicy, executor: E, audit: AuditLog) -> Self {
        Self { gate: AccessGate::new(policy), executor, audit }
    }

    /// The policy snapshot in force
    #[must_use]
    pub const fn policy(&self) -> &AccessPolicy {
        self.gate.policy()
    }

    /// Run one operation request through the full pipeline
    ///
    /// Denials and invalid requests never reach the executor.
    pub async fn run(&self, request: OperationRequest) -> Result<OperationOutput> {
        self.admit(&request)?;

        let kind = request.kind();
        let result = self.dispatch(request).await;

        // Builder-originated shape errors (bad identifiers) are ordinary
        // errors, logged like gate-level InvalidRequest.
        if let Err(PortaError::InvalidRequest(message)) = &result {
            self.audit.request_rejected(kind, message);
        }

        result
    }

    /// Gate check with denial/rejection audit events
    fn admit(&self, request: &OperationRequest) -> Result<()> {
        match self.gate.admit(request) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.is_denial() {
                    self.audit.access_denied(request.kind(), request.table(), err.error_code());
                } else {
                    self.audit.request_rejected(request.kind(), &err.message());
                }
                Err(err)
            }
        }
    }

    async fn dispatch(&self, request: OperationRequest) -> Result<OperationOutput> {
        match request {
            OperationRequest::ListTables => self.list_tables().await.map(OperationOutput::Tables),
            OperationRequest::DescribeTable { table } => {
                self.describe_table(&table).await.map(OperationOutput::Description)
            }
            OperationRequest::Select { table, columns, filter, order_by, limit, offset, params } => {
                self.select(&table, &columns, filter.as_deref(), order_by.as_deref(), limit, offset, params)
                    .await
                    .map(OperationOutput::Query)
            }
            OperationRequest::Insert { table, values } => {
                let stmt = statement::insert(&table, &values)?;
                self.mutate(OperationKind::Insert, &table, stmt).await.map(OperationOutput::Query)
            }
            OperationRequest::Update { table, values, filter, params } => {
                let stmt = statement::update(&table, &values, &filter, params)?;
                self.mutate(OperationKind::Update, &table, stmt).await.map(OperationOutput::Query)
            }
            OperationRequest::Delete { table, filter, params } => {
                let stmt = statement::delete(&table, &filter, params)?;
                self.mutate(OperationKind::Delete, &table, stmt).await.map(OperationOutput::Query)
            }
            OperationRequest::CreateTable { table, columns, options } => {
                let stmt = statement::create_table(&table, &columns, &options)?;
                self.mutate(OperationKind::CreateTable, &table, stmt)
                    .await
                    .map(OperationOutput::Query)
            }
        }
    }

    /// Execute one statement, timing dispatch → receipt
    ///
    /// Failures are logged with the statement text (never bound values) and
    /// propagated unchanged.
    async fn run_statement(&self, kind: OperationKind, stmt: &Statement) -> Result<(RawOutcome, u64)> {
        let start = Instant::now();
        match self.executor.execute(stmt).await {
            Ok(outcome) => Ok((outcome, elapsed_ms(start))),
            Err(err) => {
                self.audit.execution_failed(kind, &stmt.sql, &err.message());
                Err(err)
            }
        }
    }

    async fn list_tables(&self) -> Result<TableList> {
        let stmt = statement::list_tables();
        let (outcome, elapsed_ms) = self.run_statement(OperationKind::ListTables, &stmt).await?;

        // Re-filter through the same per-table predicate the gate uses.
        let tables: Vec<String> = outcome
            .rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|value| value.as_str().map(str::to_string))
            .filter(|name| self.gate.policy().table_allowed(name))
            .collect();

        self.audit.operation_completed(
            OperationKind::ListTables,
            None,
            tables.len() as u64,
            elapsed_ms,
        );
        Ok(TableList { tables, elapsed_ms })
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        let kind = OperationKind::DescribeTable;
        let columns_stmt = statement::describe_columns(table)?;
        let count_stmt = statement::count_rows(table)?;

        let start = Instant::now();
        let ((columns_out, _), (count_out, _)) = tokio::try_join!(
            self.run_statement(kind, &columns_stmt),
            self.run_statement(kind, &count_stmt),
        )?;
        let elapsed_ms = elapsed_ms(start);

        if columns_out.rows.is_empty() {
            return Err(PortaError::query_failed(format!("Table '{table}' not found")));
        }

        let columns = columns_out
            .rows
            .iter()
            .map(|row| parse_column_descriptor(row))
            .collect::<Result<Vec<_>>>()?;

        let total_rows = count_out
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);

        self.audit.operation_completed(kind, Some(table), columns.len() as u64, elapsed_ms);
        Ok(TableDescription { table: table.to_string(), columns, total_rows, elapsed_ms })
    }

    #[allow(clippy::too_many_arguments)]
    async fn select(
        &self,
        table: &str,
        columns: &[String],
        filter: Option<&str>,
        order_by: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
        params: Vec<SqlValue>,
    ) -> Result<QueryResult> {
        // The policy ceiling always applies; a request may only lower it.
        let effective_limit = self.gate.policy().effective_limit(limit);
        let stmt = statement::select(table, columns, filter, order_by, effective_limit, offset, params)?;

        let (outcome, elapsed_ms) = self.run_statement(OperationKind::Select, &stmt).await?;
        let result = QueryResult::from_rows(outcome, elapsed_ms);

        self.audit.operation_completed(
            OperationKind::Select,
            Some(table),
            result.row_count as u64,
            elapsed_ms,
        );
        Ok(result)
    }

    async fn mutate(&self, kind: OperationKind, table: &str, stmt: Statement) -> Result<QueryResult> {
        let (outcome, elapsed_ms) = self.run_statement(kind, &stmt).await?;
        let result = QueryResult::from_mutation(&outcome, elapsed_ms);

        self.audit.operation_completed(kind, Some(table), outcome.affected_rows, elapsed_ms);
        Ok(result)
    }
}

/// Parse one `information_schema.columns` row into a descriptor
fn parse_column_descriptor(row: &[serde_json::Value]) -> Result<ColumnDescriptor> {
    let text = |idx: usize| -> String {
        row.get(idx).and_then(serde_json::Value::as_str).unwrap_or_default().to_string()
    };

    if row.len() < 6 {
        return Err(PortaError::query_failed("Malformed schema introspection row"));
    }

    Ok(ColumnDescriptor {
        name: text(0),
        data_type: text(1),
        nullable: text(2).eq_ignore_ascii_case("YES"),
        key: text(3),
        default: row.get(4).and_then(serde_json::Value::as_str).map(str::to_string),
        extra: text(5),
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
