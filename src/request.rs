//! Operation Requests and Value Model
//!
//! This module defines the closed data model for everything a caller can ask
//! the server to do: the seven operation kinds, their request payloads, and
//! the closed scalar value variant used for bound parameters.
//!
//! # Value Boundary
//! Insert/update payloads and bound filter parameters are converted from JSON
//! at the tool boundary into [`SqlValue`]. Arrays and objects are rejected
//! there with `INVALID_REQUEST` rather than being passed through as dynamic
//! blobs.

use serde::{Deserialize, Serialize};

use crate::error::{PortaError, Result};

/// The seven operation kinds exposed by the tool surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ListTables,
    DescribeTable,
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
}

impl OperationKind {
    /// Stable name, also used as the MCP tool name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CreateTable => "create_table",
        }
    }

    /// Whether this kind writes to the database (DDL included)
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete | Self::CreateTable)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed scalar value variant for bound parameters and column values
///
/// Dates and times travel as strings; MySQL coerces them server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Convert a JSON scalar into a `SqlValue`
    ///
    /// Arrays and objects are not representable as a single bound parameter
    /// and are rejected at this boundary.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::UInt(u))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(PortaError::invalid_request(format!("Unrepresentable number: {n}")))
                }
            }
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(PortaError::invalid_request(
                    "Column values and bound parameters must be scalars (string, number, boolean, or null)",
                ))
            }
        }
    }

    /// Convert a JSON array into an ordered parameter list
    pub fn params_from_json(values: &[serde_json::Value]) -> Result<Vec<Self>> {
        values.iter().map(Self::from_json).collect()
    }
}

/// Column definition for `create_table`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name (validated as an identifier before SQL assembly)
    pub name: String,

    /// Declared type, e.g. `VARCHAR`, `INT`, `DECIMAL`
    #[serde(rename = "type")]
    pub data_type: String,

    /// Optional length/precision, rendered as `TYPE(length)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Whether the column accepts NULL (default true)
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Part of the (possibly composite) primary key
    #[serde(default)]
    pub primary_key: bool,

    /// AUTO_INCREMENT column
    #[serde(default)]
    pub auto_increment: bool,

    /// UNIQUE constraint on this column
    #[serde(default)]
    pub unique: bool,

    /// Optional default value, rendered as a literal in the DDL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<SqlValue>,
}

const fn default_true() -> bool {
    true
}

/// Table-level options for `create_table`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOptions {
    /// Emit `CREATE TABLE IF NOT EXISTS`
    #[serde(default)]
    pub if_not_exists: bool,

    /// Storage engine clause, appended verbatim (e.g. `InnoDB`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    /// Character set clause, appended verbatim (e.g. `utf8mb4`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,

    /// Collation clause, appended verbatim (e.g. `utf8mb4_unicode_ci`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

/// A fully-parsed operation request, one variant per tool
///
/// Every request passes through the access gate before any SQL is assembled
/// from it.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    ListTables,
    DescribeTable {
        table: String,
    },
    Select {
        table: String,
        /// Explicit column list; empty means `*`
        columns: Vec<String>,
        /// Raw filter text (caller-trusted SQL fragment, see DESIGN.md)
        filter: Option<String>,
        /// Raw ordering text (caller-trusted SQL fragment)
        order_by: Option<String>,
        limit: Option<u64>,
        offset: Option<u64>,
        /// Bound values referenced by placeholders inside `filter`
        params: Vec<SqlValue>,
    },
    Insert {
        table: String,
        /// Ordered column → value assignments
        values: Vec<(String, SqlValue)>,
    },
    Update {
        table: String,
        values: Vec<(String, SqlValue)>,
        filter: String,
        params: Vec<SqlValue>,
    },
    Delete {
        table: String,
        filter: String,
        params: Vec<SqlValue>,
    },
    CreateTable {
        table: String,
        columns: Vec<ColumnSpec>,
        options: TableOptions,
    },
}

impl OperationRequest {
    /// The operation kind of this request
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::ListTables => OperationKind::ListTables,
            Self::DescribeTable { .. } => OperationKind::DescribeTable,
            Self::Select { .. } => OperationKind::Select,
            Self::Insert { .. } => OperationKind::Insert,
            Self::Update { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
            Self::CreateTable { .. } => OperationKind::CreateTable,
        }
    }

    /// The table this request targets, if it names one
    ///
    /// `ListTables` has no table up front; its result set is filtered
    /// post-hoc instead.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::ListTables => None,
            Self::DescribeTable { table }
            | Self::Select { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. }
            | Self::CreateTable { table, .. } => Some(table),
        }
    }
}
