//! MCP (Model Context Protocol) Server
//!
//! Manual JSON-RPC 2.0 over stdio, one request per line. Each tool call is
//! stateless and routes through the same service pipeline the CLI uses:
//! access gate, statement builder, executor, normalization.
//!
//! # Tool Surface
//!
//! - `list_tables` — accessible table names (policy-filtered)
//! - `describe_table` — column schema plus total row count
//! - `select` — constrained reads, row limit capped by policy
//! - `insert` / `update` / `delete` — only listed when the matching feature
//!   flag is enabled
//! - `create_table` — only listed when enabled
//!
//! Calling a mutation tool that is hidden from `tools/list` still goes
//! through the gate and returns the structured denial envelope, so agents
//! see the actionable reason code instead of a protocol error.
//!
//! # Usage
//!
//! Start the server with: `porta serve`
//!
//! Configure in an MCP client:
//! ```json
//! {
//!   "mcpServers": {
//!     "porta": {
//!       "command": "porta",
//!       "args": ["serve"]
//!     }
//!   }
//! }
//! ```

use anyhow::{anyhow, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};

use crate::engine::Executor;
use crate::error::PortaError;
use crate::output::{ErrorEnvelope, Metadata, SuccessEnvelope};
use crate::request::{ColumnSpec, OperationRequest, SqlValue, TableOptions};
use crate::service::{DbService, OperationOutput};

// ============================================================================
// JSON-RPC 2.0 Structures
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

// ============================================================================
// MCP Tool Result Structures
// ============================================================================

/// Text content block for MCP tool results
#[derive(Debug, Serialize)]
struct TextContent {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

impl TextContent {
    fn new(text: String) -> Self {
        Self { content_type: "text".to_string(), text }
    }
}

/// MCP tool call result
#[derive(Debug, Serialize)]
struct CallToolResult {
    content: Vec<TextContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl CallToolResult {
    /// Successful tool result carrying a pretty-printed JSON envelope
    fn success(data: impl Serialize) -> Result<Value> {
        let json_text = serde_json::to_string_pretty(&data)?;
        let result = Self { content: vec![TextContent::new(json_text)], is_error: false };
        Ok(serde_json::to_value(result)?)
    }

    /// Failed tool result; the envelope carries the stable error code
    fn failure(data: impl Serialize) -> Result<Value> {
        let json_text = serde_json::to_string_pretty(&data)?;
        let result = Self { content: vec![TextContent::new(json_text)], is_error: true };
        Ok(serde_json::to_value(result)?)
    }
}

// ============================================================================
// Tool Parameter Types (schemas generated with schemars)
// ============================================================================

/// Parameters for the `list_tables` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTablesParams {}

/// Parameters for the `describe_table` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DescribeTableParams {
    /// Name of the table to describe
    pub table: String,
}

/// Parameters for the `select` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectParams {
    /// Table to read from
    pub table: String,

    /// Columns to return; omit for all columns
    #[serde(default)]
    pub columns: Vec<String>,

    /// Raw WHERE clause body. May contain `?` placeholders bound via
    /// `params`. The caller is responsible for sanitizing this fragment.
    #[serde(rename = "where")]
    pub filter: Option<String>,

    /// Raw ORDER BY clause body (e.g. `created_at DESC`)
    pub order_by: Option<String>,

    /// Maximum rows to return; the server-side ceiling always applies
    pub limit: Option<u64>,

    /// Row offset, applied after the limit clause
    pub offset: Option<u64>,

    /// Bound values for `?` placeholders in `where`
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Parameters for the `insert` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct InsertParams {
    /// Table to insert into
    pub table: String,

    /// Column → value map; insertion order is preserved
    pub values: serde_json::Map<String, Value>,
}

/// Parameters for the `update` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateParams {
    /// Table to update
    pub table: String,

    /// Column → value map; insertion order is preserved
    pub values: serde_json::Map<String, Value>,

    /// Raw WHERE clause body; must be non-empty
    #[serde(rename = "where")]
    pub filter: String,

    /// Bound values for `?` placeholders in `where`
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Parameters for the `delete` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteParams {
    /// Table to delete from
    pub table: String,

    /// Raw WHERE clause body; must be non-empty
    #[serde(rename = "where")]
    pub filter: String,

    /// Bound values for `?` placeholders in `where`
    #[serde(default)]
    pub params: Vec<Value>,
}

/// One column definition for the `create_table` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ColumnSpecParams {
    /// Column name
    pub name: String,

    /// Declared type, e.g. `VARCHAR`, `INT`
    #[serde(rename = "type")]
    pub data_type: String,

    /// Optional length/precision
    pub length: Option<u32>,

    /// Whether the column accepts NULL (default true)
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,

    /// AUTO_INCREMENT column
    #[serde(default)]
    pub auto_increment: bool,

    /// UNIQUE constraint
    #[serde(default)]
    pub unique: bool,

    /// Default value (scalar)
    pub default: Option<Value>,
}

const fn default_true() -> bool {
    true
}

/// Parameters for the `create_table` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTableParams {
    /// Name of the table to create
    pub table: String,

    /// Ordered column definitions
    pub columns: Vec<ColumnSpecParams>,

    /// Emit CREATE TABLE IF NOT EXISTS
    #[serde(default)]
    pub if_not_exists: bool,

    /// Storage engine (e.g. `InnoDB`), appended verbatim
    pub engine: Option<String>,

    /// Character set (e.g. `utf8mb4`), appended verbatim
    pub charset: Option<String>,

    /// Collation (e.g. `utf8mb4_unicode_ci`), appended verbatim
    pub collation: Option<String>,
}

// ============================================================================
// MCP Server
// ============================================================================

/// MCP server over one service instance
pub struct McpServer<E: Executor> {
    service: DbService<E>,
}

impl<E: Executor> McpServer<E> {
    /// Create a server over a configured service
    pub const fn new(service: DbService<E>) -> Self {
        Self { service }
    }

    /// Run the main server loop: JSON-RPC requests on stdin, responses on
    /// stdout, one JSON document per line
    #[allow(clippy::future_not_send)]
    pub async fn serve(&self) -> Result<()> {
        let stdin = io::stdin();
        let reader = stdin.lock();
        let mut stdout = io::stdout();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    let response = JsonRpcResponse {
                        jsonrpc: "2.0".to_string(),
                        id: None,
                        result: None,
                        error: Some(JsonRpcError {
                            code: -32700, // Parse error
                            message: format!("Parse error: {e}"),
                            data: None,
                        }),
                    };
                    writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
                    stdout.flush()?;
                    continue;
                }
            };

            // Notifications get no response.
            if let Some(response) = self.handle_request(request).await {
                writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    /// Route one JSON-RPC request; `None` means nothing is written back
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.method.starts_with("notifications/") {
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(handle_initialize()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(self.handle_list_tools()),
            "tools/call" => self.handle_call_tool(request.params).await,
            _ => Err(anyhow!("Unknown method: {}", request.method)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: Some(value),
                error: None,
            },
            Err(e) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32603, // Internal error
                    message: e.to_string(),
                    data: None,
                }),
            },
        })
    }

    /// `tools/list`: read tools always, mutation tools only when enabled
    fn handle_list_tools(&self) -> Value {
        let policy = self.service.policy();
        let mut tools = vec![
            tool_entry::<ListTablesParams>(
                "list_tables",
                "List accessible tables in the configured database. Tables excluded by the \
                 server's allow/block lists are filtered out.",
            ),
            tool_entry::<DescribeTableParams>(
                "describe_table",
                "Describe one table: column names, types, nullability, key roles, defaults, \
                 plus the total row count.",
            ),
            tool_entry::<SelectParams>(
                "select",
                "Read rows from one table. Identifiers are validated server-side; the 'where' \
                 and 'order_by' fragments are raw SQL text owned by the caller — bind untrusted \
                 values through 'params', never by string concatenation. Row count is capped by \
                 the server's max_rows policy regardless of 'limit'.",
            ),
        ];

        if policy.allow_insert {
            tools.push(tool_entry::<InsertParams>(
                "insert",
                "Insert one row. Values bind as parameters in the given column order.",
            ));
        }
        if policy.allow_update {
            tools.push(tool_entry::<UpdateParams>(
                "update",
                "Update rows matching a non-empty 'where' filter. Update values bind first, \
                 then filter params.",
            ));
        }
        if policy.allow_delete {
            tools.push(tool_entry::<DeleteParams>(
                "delete",
                "Delete rows matching a non-empty 'where' filter. Unscoped deletes are rejected.",
            ));
        }
        if policy.allow_create_table {
            tools.push(tool_entry::<CreateTableParams>(
                "create_table",
                "Create a table from ordered column definitions. Columns flagged primary_key \
                 form a composite PRIMARY KEY; engine/charset/collation are appended verbatim.",
            ));
        }

        serde_json::json!({ "tools": tools })
    }

    /// `tools/call`: parse, gate, execute, envelope
    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params = params.ok_or_else(|| anyhow!("Missing params"))?;
        let name = params["name"]
            .as_str()
            .ok_or_else(|| anyhow!("Missing tool name"))?
            .to_string();
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| serde_json::json!({}));

        let request = match parse_request(&name, arguments) {
            Ok(request) => request,
            Err(ParseError::UnknownTool) => return Err(anyhow!("Unknown tool: {name}")),
            Err(ParseError::Invalid(err)) => {
                return CallToolResult::failure(ErrorEnvelope::from_error(&name, &err));
            }
        };

        match self.service.run(request).await {
            Ok(output) => {
                let meta = output_metadata(&output);
                CallToolResult::success(SuccessEnvelope::new(&name, output, meta))
            }
            Err(err) => CallToolResult::failure(ErrorEnvelope::from_error(&name, &err)),
        }
    }
}

/// Handle MCP initialize request
fn handle_initialize() -> Value {
    serde_json::json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": "porta",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Build one tools/list entry with a schemars-generated input schema
fn tool_entry<P: JsonSchema>(name: &str, description: &str) -> Value {
    let schema = schemars::schema_for!(P);
    serde_json::json!({
        "name": name,
        "description": description,
        "inputSchema": serde_json::to_value(schema.schema).unwrap_or_else(|_| serde_json::json!({"type": "object"})),
    })
}

/// Why tool-call parsing failed
enum ParseError {
    UnknownTool,
    Invalid(PortaError),
}

impl From<PortaError> for ParseError {
    fn from(err: PortaError) -> Self {
        Self::Invalid(err)
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Invalid(PortaError::invalid_request(format!("Invalid arguments: {err}")))
    }
}

/// Parse tool arguments into an operation request
///
/// Every tool name is recognized here regardless of whether it appears in
/// `tools/list`, so disabled tools produce gate denials, not protocol
/// errors.
fn parse_request(name: &str, arguments: Value) -> std::result::Result<OperationRequest, ParseError> {
    match name {
        "list_tables" => {
            let _: ListTablesParams = serde_json::from_value(arguments)?;
            Ok(OperationRequest::ListTables)
        }
        "describe_table" => {
            let p: DescribeTableParams = serde_json::from_value(arguments)?;
            Ok(OperationRequest::DescribeTable { table: p.table })
        }
        "select" => {
            let p: SelectParams = serde_json::from_value(arguments)?;
            Ok(OperationRequest::Select {
                table: p.table,
                columns: p.columns,
                filter: p.filter,
                order_by: p.order_by,
                limit: p.limit,
                offset: p.offset,
                params: SqlValue::params_from_json(&p.params)?,
            })
        }
        "insert" => {
            let p: InsertParams = serde_json::from_value(arguments)?;
            Ok(OperationRequest::Insert { table: p.table, values: convert_values(&p.values)? })
        }
        "update" => {
            let p: UpdateParams = serde_json::from_value(arguments)?;
            Ok(OperationRequest::Update {
                table: p.table,
                values: convert_values(&p.values)?,
                filter: p.filter,
                params: SqlValue::params_from_json(&p.params)?,
            })
        }
        "delete" => {
            let p: DeleteParams = serde_json::from_value(arguments)?;
            Ok(OperationRequest::Delete {
                table: p.table,
                filter: p.filter,
                params: SqlValue::params_from_json(&p.params)?,
            })
        }
        "create_table" => {
            let p: CreateTableParams = serde_json::from_value(arguments)?;
            let columns = p
                .columns
                .into_iter()
                .map(convert_column_spec)
                .collect::<std::result::Result<Vec<_>, ParseError>>()?;
            Ok(OperationRequest::CreateTable {
                table: p.table,
                columns,
                options: TableOptions {
                    if_not_exists: p.if_not_exists,
                    engine: p.engine,
                    charset: p.charset,
                    collation: p.collation,
                },
            })
        }
        _ => Err(ParseError::UnknownTool),
    }
}

/// Convert a JSON column→value map into ordered assignments
///
/// `serde_json` is built with `preserve_order`, so the map iterates in the
/// caller's key order and placeholder order matches it.
fn convert_values(
    map: &serde_json::Map<String, Value>,
) -> std::result::Result<Vec<(String, SqlValue)>, ParseError> {
    map.iter()
        .map(|(name, value)| Ok((name.clone(), SqlValue::from_json(value)?)))
        .collect()
}

fn convert_column_spec(p: ColumnSpecParams) -> std::result::Result<ColumnSpec, ParseError> {
    let default = p.default.as_ref().map(SqlValue::from_json).transpose()?;
    Ok(ColumnSpec {
        name: p.name,
        data_type: p.data_type,
        length: p.length,
        nullable: p.nullable,
        primary_key: p.primary_key,
        auto_increment: p.auto_increment,
        unique: p.unique,
        default,
    })
}

/// Envelope metadata per output shape
fn output_metadata(output: &OperationOutput) -> Metadata {
    match output {
        OperationOutput::Tables(t) => Metadata::with_rows(t.elapsed_ms, t.tables.len() as u64),
        OperationOutput::Description(d) => Metadata::with_rows(d.elapsed_ms, d.total_rows),
        OperationOutput::Query(q) => Metadata::with_rows(
            q.elapsed_ms,
            q.rows_affected.unwrap_or(q.row_count as u64),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_request() {
        let args = serde_json::json!({
            "table": "users",
            "columns": ["id", "name"],
            "where": "age > ?",
            "order_by": "name ASC",
            "limit": 10,
            "params": [21]
        });
        let request = parse_request("select", args).ok().unwrap();
        match request {
            OperationRequest::Select { table, columns, filter, order_by, limit, offset, params } => {
                assert_eq!(table, "users");
                assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
                assert_eq!(filter.as_deref(), Some("age > ?"));
                assert_eq!(order_by.as_deref(), Some("name ASC"));
                assert_eq!(limit, Some(10));
                assert_eq!(offset, None);
                assert_eq!(params, vec![SqlValue::Int(21)]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_parse_insert_preserves_value_order() {
        let args = serde_json::json!({
            "table": "users",
            "values": {"name": "a", "age": 1, "active": true}
        });
        let request = parse_request("insert", args).ok().unwrap();
        match request {
            OperationRequest::Insert { values, .. } => {
                let names: Vec<&str> = values.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["name", "age", "active"]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_parse_insert_rejects_nested_values() {
        let args = serde_json::json!({
            "table": "users",
            "values": {"profile": {"nested": true}}
        });
        match parse_request("insert", args) {
            Err(ParseError::Invalid(err)) => assert_eq!(err.error_code(), "INVALID_REQUEST"),
            _ => panic!("expected invalid-request error"),
        }
    }

    #[test]
    fn test_parse_create_table_request() {
        let args = serde_json::json!({
            "table": "users",
            "columns": [
                {"name": "id", "type": "INT", "primary_key": true, "auto_increment": true, "nullable": false},
                {"name": "email", "type": "VARCHAR", "length": 255, "unique": true, "nullable": false}
            ],
            "if_not_exists": true,
            "engine": "InnoDB"
        });
        let request = parse_request("create_table", args).ok().unwrap();
        match request {
            OperationRequest::CreateTable { table, columns, options } => {
                assert_eq!(table, "users");
                assert_eq!(columns.len(), 2);
                assert!(columns[0].primary_key);
                assert!(columns[0].auto_increment);
                assert_eq!(columns[1].length, Some(255));
                assert!(options.if_not_exists);
                assert_eq!(options.engine.as_deref(), Some("InnoDB"));
                assert_eq!(options.charset, None);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_tool() {
        assert!(matches!(
            parse_request("drop_database", serde_json::json!({})),
            Err(ParseError::UnknownTool)
        ));
    }

    #[test]
    fn test_disabled_tools_still_parse() {
        // Presence in tools/list is policy-driven, but parsing recognizes
        // every tool so the gate can report FEATURE_DISABLED.
        let args = serde_json::json!({"table": "users", "where": "id = 1"});
        assert!(parse_request("delete", args).is_ok());
    }

    #[test]
    fn test_tool_entry_schema_has_properties() {
        let entry = tool_entry::<SelectParams>("select", "test");
        assert_eq!(entry["name"], "select");
        let schema = &entry["inputSchema"];
        assert!(schema["properties"]["table"].is_object());
        assert!(schema["properties"]["where"].is_object());
    }

    #[test]
    fn test_initialize_reports_tool_capability() {
        let init = handle_initialize();
        assert_eq!(init["serverInfo"]["name"], "porta");
        assert!(init["capabilities"]["tools"].is_object());
    }
}
