//! Statement Builder
//!
//! This module turns admitted operation requests into parameterized MySQL
//! statements: SQL text plus an ordered list of bound values. Nothing here
//! executes anything; execution is the engine layer's job.
//!
//! # Interpolation Rules
//! - Values always travel as bound parameters (`?` placeholders), never as
//!   interpolated text
//! - Identifiers (table and column names) are validated against a strict
//!   pattern and then backtick-quoted
//! - Filter and ordering text are caller-trusted SQL fragments inserted
//!   as-is; see DESIGN.md for the recorded risk decision
//! - `create_table` is DDL and cannot bind parameters, so default values
//!   are rendered as escaped literals

use crate::error::{PortaError, Result};
use crate::request::{ColumnSpec, SqlValue, TableOptions};

/// MySQL's identifier length limit
const MAX_IDENTIFIER_LEN: usize = 64;

/// A parameterized statement ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders for bound values
    pub sql: String,

    /// Bound values, in placeholder order
    pub params: Vec<SqlValue>,

    /// Whether the statement produces a row set (vs. an affected-row count)
    pub returns_rows: bool,
}

impl Statement {
    fn rows(sql: String, params: Vec<SqlValue>) -> Self {
        Self { sql, params, returns_rows: true }
    }

    fn mutation(sql: String, params: Vec<SqlValue>) -> Self {
        Self { sql, params, returns_rows: false }
    }
}

/// Validate an identifier (table or column name)
///
/// ASCII letter or underscore first, then letters, digits and underscores,
/// at most 64 bytes. Everything else is rejected before it can reach SQL
/// text.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(PortaError::invalid_request(format!(
            "Identifier exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(PortaError::invalid_request("Identifier must not be empty"));
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(PortaError::invalid_request(format!(
            "Invalid identifier '{name}': must start with a letter or underscore"
        )));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PortaError::invalid_request(format!(
            "Invalid identifier '{name}': only letters, digits and underscores are allowed"
        )));
    }
    Ok(())
}

/// Validate a declared column type (e.g. `VARCHAR`, `DOUBLE PRECISION`)
fn validate_type(data_type: &str) -> Result<()> {
    if data_type.len() > MAX_IDENTIFIER_LEN {
        return Err(PortaError::invalid_request("Column type must be 1-64 characters"));
    }
    let mut chars = data_type.chars();
    let Some(first) = chars.next() else {
        return Err(PortaError::invalid_request("Column type must be 1-64 characters"));
    };
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
    {
        return Err(PortaError::invalid_request(format!(
            "Invalid column type '{data_type}'"
        )));
    }
    Ok(())
}

/// Validate then backtick-quote an identifier
fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{name}`"))
}

/// Render a `SqlValue` as a DDL literal (DEFAULT clauses only)
///
/// DML never goes through here; values there are bound, not rendered.
fn render_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(true) => "TRUE".to_string(),
        SqlValue::Bool(false) => "FALSE".to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::UInt(u) => u.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Text(s) => {
            let escaped = s.replace('\\', "\\\\").replace('\'', "''");
            format!("'{escaped}'")
        }
    }
}

/// Catalog listing, no parameters
#[must_use]
pub fn list_tables() -> Statement {
    Statement::rows("SHOW TABLES".to_string(), Vec::new())
}

/// Column/schema introspection for one table
pub fn describe_columns(table: &str) -> Result<Statement> {
    validate_identifier(table)?;
    let sql = "SELECT column_name, data_type, is_nullable, column_key, column_default, extra \
               FROM information_schema.columns \
               WHERE table_schema = DATABASE() AND table_name = ? \
               ORDER BY ordinal_position"
        .to_string();
    Ok(Statement::rows(sql, vec![SqlValue::Text(table.to_string())]))
}

/// Total row count for one table
pub fn count_rows(table: &str) -> Result<Statement> {
    let table = quote_identifier(table)?;
    Ok(Statement::rows(format!("SELECT COUNT(*) AS total_rows FROM {table}"), Vec::new()))
}

/// `SELECT <cols|*> FROM <table> [WHERE ..] [ORDER BY ..] LIMIT n [OFFSET m]`
///
/// `limit` is the already-clamped effective limit and is always emitted, so
/// the policy ceiling holds regardless of what the caller asked for.
pub fn select(
    table: &str,
    columns: &[String],
    filter: Option<&str>,
    order_by: Option<&str>,
    limit: u64,
    offset: Option<u64>,
    params: Vec<SqlValue>,
) -> Result<Statement> {
    let table = quote_identifier(table)?;

    let column_list = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ")
    };

    let mut sql = format!("SELECT {column_list} FROM {table}");
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if let Some(order) = order_by.map(str::trim).filter(|o| !o.is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    sql.push_str(&format!(" LIMIT {limit}"));
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    Ok(Statement::rows(sql, params))
}

/// `INSERT INTO <table> (<cols>) VALUES (?, ..)`, one parameter per value
pub fn insert(table: &str, values: &[(String, SqlValue)]) -> Result<Statement> {
    let table = quote_identifier(table)?;

    let columns = values
        .iter()
        .map(|(name, _)| quote_identifier(name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let placeholders = vec!["?"; values.len()].join(", ");
    let params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();

    Ok(Statement::mutation(
        format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})"),
        params,
    ))
}

/// `UPDATE <table> SET c = ?, .. WHERE <filter>`
///
/// Bound order is update values first, then the caller's filter parameters.
pub fn update(
    table: &str,
    values: &[(String, SqlValue)],
    filter: &str,
    filter_params: Vec<SqlValue>,
) -> Result<Statement> {
    let table = quote_identifier(table)?;

    let assignments = values
        .iter()
        .map(|(name, _)| Ok(format!("{} = ?", quote_identifier(name)?)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
    params.extend(filter_params);

    Ok(Statement::mutation(
        format!("UPDATE {table} SET {assignments} WHERE {}", filter.trim()),
        params,
    ))
}

/// `DELETE FROM <table> WHERE <filter>`
pub fn delete(table: &str, filter: &str, filter_params: Vec<SqlValue>) -> Result<Statement> {
    let table = quote_identifier(table)?;
    Ok(Statement::mutation(
        format!("DELETE FROM {table} WHERE {}", filter.trim()),
        filter_params,
    ))
}

/// `CREATE TABLE` DDL from column specifications and table options
///
/// Primary-key flags across columns are gathered into one composite
/// `PRIMARY KEY` clause. Engine/charset/collation strings are appended
/// verbatim.
pub fn create_table(
    table: &str,
    columns: &[ColumnSpec],
    options: &TableOptions,
) -> Result<Statement> {
    let quoted_table = quote_identifier(table)?;

    let mut defs: Vec<String> = Vec::with_capacity(columns.len() + 1);
    let mut primary_key: Vec<String> = Vec::new();

    for column in columns {
        let name = quote_identifier(&column.name)?;
        validate_type(&column.data_type)?;

        let mut def = format!("{name} {}", column.data_type.to_uppercase());
        if let Some(length) = column.length {
            def.push_str(&format!("({length})"));
        }
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if column.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        if column.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default) = &column.default {
            def.push_str(&format!(" DEFAULT {}", render_literal(default)));
        }
        defs.push(def);

        if column.primary_key {
            primary_key.push(name);
        }
    }

    if !primary_key.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    let if_not_exists = if options.if_not_exists { "IF NOT EXISTS " } else { "" };
    let mut sql = format!("CREATE TABLE {if_not_exists}{quoted_table} ({})", defs.join(", "));

    if let Some(engine) = &options.engine {
        sql.push_str(&format!(" ENGINE={engine}"));
    }
    if let Some(charset) = &options.charset {
        sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
    }
    if let Some(collation) = &options.collation {
        sql.push_str(&format!(" COLLATE={collation}"));
    }

    Ok(Statement::mutation(sql, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(name: &str, data_type: &str) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            data_type: data_type.to_string(),
            length: None,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
        }
    }

    // Identifier validation

    #[test]
    fn test_identifier_accepts_plain_names() {
        for name in ["users", "_tmp", "order_items2", "A"] {
            assert!(validate_identifier(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_identifier_rejects_hostile_shapes() {
        for name in [
            "",
            "1users",
            "user-name",
            "users; DROP TABLE users",
            "users`",
            "us ers",
            "naïve",
        ] {
            let err = validate_identifier(name).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_REQUEST", "{name:?}");
        }
    }

    #[test]
    fn test_identifier_rejects_overlong_names() {
        let name = "a".repeat(65);
        assert!(validate_identifier(&name).is_err());
        let name = "a".repeat(64);
        assert!(validate_identifier(&name).is_ok());
    }

    // Select

    #[test]
    fn test_select_star_with_limit_only() {
        let stmt = select("users", &[], None, None, 1000, None, Vec::new()).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM `users` LIMIT 1000");
        assert!(stmt.params.is_empty());
        assert!(stmt.returns_rows);
    }

    #[test]
    fn test_select_full_clause_ordering() {
        let stmt = select(
            "users",
            &["id".to_string(), "name".to_string()],
            Some("age > ?"),
            Some("name ASC"),
            10,
            Some(20),
            vec![SqlValue::Int(21)],
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `id`, `name` FROM `users` WHERE age > ? ORDER BY name ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.params, vec![SqlValue::Int(21)]);
    }

    #[test]
    fn test_select_blank_filter_is_dropped() {
        let stmt = select("users", &[], Some("   "), None, 50, None, Vec::new()).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM `users` LIMIT 50");
    }

    #[test]
    fn test_select_rejects_invalid_column() {
        let err = select("users", &["na me".to_string()], None, None, 10, None, Vec::new())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
    }

    // Insert

    #[test]
    fn test_insert_placeholders_match_column_order() {
        let stmt = insert(
            "users",
            &[
                ("name".to_string(), SqlValue::Text("a".to_string())),
                ("age".to_string(), SqlValue::Int(1)),
            ],
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `users` (`name`, `age`) VALUES (?, ?)");
        assert_eq!(stmt.params, vec![SqlValue::Text("a".to_string()), SqlValue::Int(1)]);
        assert!(!stmt.returns_rows);
    }

    // Update / Delete

    #[test]
    fn test_update_params_are_values_then_filter_params() {
        let stmt = update(
            "users",
            &[
                ("name".to_string(), SqlValue::Text("b".to_string())),
                ("age".to_string(), SqlValue::Int(2)),
            ],
            "id = ?",
            vec![SqlValue::Int(7)],
        )
        .unwrap();
        assert_eq!(stmt.sql, "UPDATE `users` SET `name` = ?, `age` = ? WHERE id = ?");
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("b".to_string()), SqlValue::Int(2), SqlValue::Int(7)]
        );
    }

    #[test]
    fn test_delete_binds_filter_params_in_order() {
        let stmt = delete("users", "id = ? AND age > ?", vec![SqlValue::Int(1), SqlValue::Int(18)])
            .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM `users` WHERE id = ? AND age > ?");
        assert_eq!(stmt.params, vec![SqlValue::Int(1), SqlValue::Int(18)]);
    }

    // Introspection statements

    #[test]
    fn test_describe_columns_binds_table_name() {
        let stmt = describe_columns("users").unwrap();
        assert!(stmt.sql.contains("information_schema.columns"));
        assert!(stmt.sql.contains("table_name = ?"));
        assert_eq!(stmt.params, vec![SqlValue::Text("users".to_string())]);
    }

    #[test]
    fn test_count_rows_quotes_table() {
        let stmt = count_rows("users").unwrap();
        assert_eq!(stmt.sql, "SELECT COUNT(*) AS total_rows FROM `users`");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_list_tables_has_no_parameters() {
        let stmt = list_tables();
        assert_eq!(stmt.sql, "SHOW TABLES");
        assert!(stmt.params.is_empty());
        assert!(stmt.returns_rows);
    }

    // Create table

    #[test]
    fn test_create_table_full_rendering() {
        let mut id = spec("id", "INT");
        id.nullable = false;
        id.primary_key = true;
        id.auto_increment = true;

        let mut email = spec("email", "VARCHAR");
        email.length = Some(255);
        email.nullable = false;
        email.unique = true;

        let mut status = spec("status", "VARCHAR");
        status.length = Some(16);
        status.default = Some(SqlValue::Text("new".to_string()));

        let options = TableOptions {
            if_not_exists: true,
            engine: Some("InnoDB".to_string()),
            charset: Some("utf8mb4".to_string()),
            collation: Some("utf8mb4_unicode_ci".to_string()),
        };

        let stmt = create_table("users", &[id, email, status], &options).unwrap();
        assert_eq!(
            stmt.sql,
            "CREATE TABLE IF NOT EXISTS `users` (\
             `id` INT NOT NULL AUTO_INCREMENT, \
             `email` VARCHAR(255) NOT NULL UNIQUE, \
             `status` VARCHAR(16) DEFAULT 'new', \
             PRIMARY KEY (`id`)) \
             ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"
        );
        assert!(stmt.params.is_empty());
        assert!(!stmt.returns_rows);
    }

    #[test]
    fn test_create_table_composite_primary_key() {
        let mut a = spec("order_id", "INT");
        a.primary_key = true;
        let mut b = spec("item_id", "INT");
        b.primary_key = true;

        let stmt = create_table("order_items", &[a, b], &TableOptions::default()).unwrap();
        assert!(stmt.sql.ends_with("PRIMARY KEY (`order_id`, `item_id`))"));
        assert!(stmt.sql.starts_with("CREATE TABLE `order_items` ("));
    }

    #[test]
    fn test_create_table_escapes_default_literals() {
        let mut name = spec("name", "VARCHAR");
        name.length = Some(64);
        name.default = Some(SqlValue::Text("O'Brien \\ co".to_string()));

        let stmt = create_table("people", &[name], &TableOptions::default()).unwrap();
        assert!(stmt.sql.contains(r"DEFAULT 'O''Brien \\ co'"));
    }

    #[test]
    fn test_create_table_rejects_bad_type() {
        let mut col = spec("id", "INT; DROP TABLE users");
        col.primary_key = true;
        let err = create_table("t", &[col], &TableOptions::default()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
    }
}
