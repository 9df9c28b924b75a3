//! MySQL Executor
//!
//! [`Executor`] implementation over `mysql_async` (MySQL and MariaDB).
//!
//! # Implementation Notes
//! - Pooling, handshake and wire protocol belong to `mysql_async::Pool`;
//!   one connection is checked out per statement and returned on drop,
//!   success or failure
//! - Values bind as positional placeholders, never as interpolated text
//! - ENUM and SET types arrive as strings
//! - BLOB data is Base64-encoded for JSON safety
//! - Temporal values are rendered as ISO-8601-style strings
//! - Driver errors propagate unchanged inside `QUERY_FAILED`

use mysql_async::{prelude::*, OptsBuilder, Params, Pool, Row, Value};

use crate::engine::{ConnectionSettings, Executor, RawOutcome};
use crate::error::{PortaError, Result};
use crate::request::SqlValue;
use crate::statement::Statement;

/// Server identity reported by the startup probe
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Bare version number, e.g. `8.0.35`
    pub version: String,

    /// Human-readable server description, e.g. `MySQL 8.0.35`
    pub server: String,
}

/// Pooled MySQL executor
///
/// Cheap to clone; clones share the underlying pool.
#[derive(Clone)]
pub struct MySqlExecutor {
    pool: Pool,
}

impl MySqlExecutor {
    /// Create an executor backed by a connection pool
    ///
    /// No connection is opened until the first statement (or [`Self::probe`])
    /// runs.
    #[must_use]
    pub fn new(settings: &ConnectionSettings) -> Self {
        let opts = OptsBuilder::default()
            .ip_or_hostname(settings.host.as_str())
            .tcp_port(settings.port)
            .user(Some(settings.user.as_str()))
            .pass(Some(settings.password.as_str()))
            .db_name(Some(settings.database.as_str()));
        Self { pool: Pool::new(opts) }
    }

    /// Validate connectivity and report the server identity
    pub async fn probe(&self) -> Result<ServerInfo> {
        let mut conn = self.pool.get_conn().await.map_err(|e| {
            PortaError::connection_failed(format!("Failed to connect to MySQL: {e}"))
        })?;

        let version_row: Row = conn
            .query_first("SELECT VERSION()")
            .await
            .map_err(|e| {
                PortaError::connection_failed(format!("Failed to query server version: {e}"))
            })?
            .ok_or_else(|| PortaError::connection_failed("No version returned"))?;

        let version_string: String = version_row
            .get(0)
            .ok_or_else(|| PortaError::connection_failed("Failed to extract version string"))?;

        let (version, server) = parse_server_version(&version_string);
        Ok(ServerInfo { version, server })
    }

    /// Close the pool gracefully
    pub async fn disconnect(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| PortaError::connection_failed(format!("Failed to close pool: {e}")))
    }
}

impl Executor for MySqlExecutor {
    async fn execute(&self, statement: &Statement) -> Result<RawOutcome> {
        let mut conn = self.pool.get_conn().await.map_err(|e| {
            PortaError::connection_failed(format!("Failed to acquire pooled connection: {e}"))
        })?;

        let params = to_params(&statement.params);

        if statement.returns_rows {
            let rows: Vec<Row> = conn
                .exec(statement.sql.as_str(), params)
                .await
                .map_err(|e| PortaError::query_failed(e.to_string()))?;

            // Empty result sets carry no column metadata on this path; the
            // service layer treats that as "no rows" rather than an error.
            let columns: Vec<String> = rows
                .first()
                .map(|row| {
                    row.columns_ref().iter().map(|c| c.name_str().to_string()).collect()
                })
                .unwrap_or_default();

            let mut data = Vec::with_capacity(rows.len());
            for row in &rows {
                data.push(row_values(row)?);
            }

            Ok(RawOutcome { columns, rows: data, affected_rows: 0 })
        } else {
            let result = conn
                .exec_iter(statement.sql.as_str(), params)
                .await
                .map_err(|e| PortaError::query_failed(e.to_string()))?;

            let affected_rows = result.affected_rows();
            drop(result);

            Ok(RawOutcome { columns: Vec::new(), rows: Vec::new(), affected_rows })
        }
    }
}

/// Convert bound values into driver parameters
fn to_params(values: &[SqlValue]) -> Params {
    if values.is_empty() {
        Params::Empty
    } else {
        Params::Positional(values.iter().map(to_mysql_value).collect())
    }
}

/// Map a closed scalar value onto the driver's value type
fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::UInt(u) => Value::UInt(*u),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
    }
}

/// Convert one row into ordered JSON scalars
fn row_values(row: &Row) -> Result<Vec<serde_json::Value>> {
    let mut values = Vec::with_capacity(row.columns_ref().len());
    for idx in 0..row.columns_ref().len() {
        let value = row
            .as_ref(idx)
            .ok_or_else(|| PortaError::query_failed(format!("Failed to get value at index {idx}")))?;
        values.push(value_to_json(value));
    }
    Ok(values)
}

/// Convert a driver value to a JSON-safe scalar
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NULL => serde_json::Value::Null,

        Value::Bytes(bytes) => {
            // Text columns arrive as bytes; fall back to Base64 for binary.
            if let Ok(s) = std::str::from_utf8(bytes) {
                serde_json::Value::String(s.to_string())
            } else {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::Value::String(encoded)
            }
        }

        Value::Int(i) => serde_json::Value::Number((*i).into()),

        Value::UInt(u) => serde_json::json!(*u),

        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),

        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),

        Value::Date(year, month, day, hour, minute, second, micro) => {
            serde_json::Value::String(format!(
                "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micro:06}"
            ))
        }

        Value::Time(is_negative, days, hours, minutes, seconds, micros) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            serde_json::Value::String(format!(
                "{sign}{total_hours}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    }
}

/// Split a `VERSION()` string into version and server description
///
/// MariaDB reports e.g. `10.11.2-MariaDB`, MySQL a bare `8.0.35`.
fn parse_server_version(version_string: &str) -> (String, String) {
    if version_string.to_uppercase().contains("MARIADB") {
        let version = version_string.split('-').next().unwrap_or("unknown").to_string();
        (version.clone(), format!("MariaDB {version}"))
    } else {
        let version =
            version_string.split_whitespace().next().unwrap_or(version_string).to_string();
        (version.clone(), format!("MySQL {version}"))
    }
}
