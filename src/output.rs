//! Output Envelopes and Presentation
//!
//! Structured JSON envelopes for tool responses plus the human-readable
//! table renderer used by the CLI subcommands.
//!
//! # Output Contract
//! - Success: `{"ok": true, "tool": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "tool": "...", "error": {"code": "...", "message": "..."}}`
//!
//! Envelopes are stable and suitable for programmatic parsing by agents.
//! The core produces structured data only; rendering is presentation-side.

use serde::Serialize;

use crate::error::PortaError;

/// Success envelope for tool results
#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Tool that produced this result
    pub tool: String,

    /// Operation-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    /// Create a new success envelope
    pub fn new(tool: impl Into<String>, data: T, meta: Metadata) -> Self {
        Self { ok: true, tool: tool.into(), data, meta }
    }
}

/// Error envelope for tool failures
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Tool that was attempted
    pub tool: String,

    /// Error information
    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    /// Create an error envelope from a library error
    pub fn from_error(tool: impl Into<String>, err: &PortaError) -> Self {
        Self {
            ok: false,
            tool: tool.into(),
            error: ErrorInfo { code: err.error_code().to_string(), message: err.message() },
        }
    }
}

/// Stable code plus human-readable message
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g. `TABLE_BLOCKED`, `QUERY_FAILED`)
    pub code: String,

    /// Human-readable message, free of sensitive data
    pub message: String,
}

/// Execution metadata included in success envelopes
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub elapsed_ms: u64,

    /// Number of rows returned or affected, when meaningful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
}

impl Metadata {
    /// Metadata with just an execution time
    #[must_use]
    pub const fn new(elapsed_ms: u64) -> Self {
        Self { elapsed_ms, rows: None }
    }

    /// Metadata with execution time and a row count
    #[must_use]
    pub const fn with_rows(elapsed_ms: u64, rows: u64) -> Self {
        Self { elapsed_ms, rows: Some(rows) }
    }
}

/// Render a result set as an ASCII table
///
/// Scalar cells render their bare value; NULL renders as `NULL`. Intended
/// for terminals, not for parsing.
#[must_use]
pub fn render_table(columns: &[String], rows: &[Vec<serde_json::Value>]) -> String {
    if columns.is_empty() {
        return "(empty set)\n".to_string();
    }

    let cells: Vec<Vec<String>> =
        rows.iter().map(|row| row.iter().map(render_cell).collect()).collect();

    let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
    for row in &cells {
        for (idx, cell) in row.iter().enumerate() {
            if idx < widths.len() && cell.len() > widths[idx] {
                widths[idx] = cell.len();
            }
        }
    }

    let separator = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let render_row = |row: &[String]| -> String {
        let mut line = String::from("|");
        for (idx, &width) in widths.iter().enumerate() {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            line.push_str(&format!(" {cell:<width$} |"));
        }
        line.push('\n');
        line
    };

    let header: Vec<String> = columns.to_vec();
    let mut out = String::new();
    out.push_str(&separator);
    out.push_str(&render_row(&header));
    out.push_str(&separator);
    for row in &cells {
        out.push_str(&render_row(row));
    }
    out.push_str(&separator);
    out
}

fn render_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
