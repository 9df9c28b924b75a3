//! Configuration Resolution
//!
//! One explicit resolution pass at startup:
//! `resolve(defaults, environment, overrides)` produces the immutable
//! [`Settings`] snapshot (connection parameters + access policy) the rest of
//! the process consumes. Nothing re-reads the environment afterwards; a
//! future reload would replace the whole snapshot, not fields within it.
//!
//! # Precedence
//! 1. CLI overrides (highest)
//! 2. Environment variables
//! 3. Built-in defaults
//!
//! # Environment Variables
//! Connection: `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_USER`, `MYSQL_PASSWORD`,
//! `MYSQL_DATABASE`.
//! Policy: `PORTA_READ_ONLY`, `PORTA_ALLOW_INSERT`, `PORTA_ALLOW_UPDATE`,
//! `PORTA_ALLOW_DELETE`, `PORTA_ALLOW_CREATE_TABLE`, `PORTA_ALLOWED_TABLES`,
//! `PORTA_BLOCKED_TABLES` (comma-separated lists), `PORTA_MAX_ROWS`.

use std::collections::{BTreeSet, HashMap};

use crate::engine::ConnectionSettings;
use crate::error::{PortaError, Result};
use crate::gate::AccessPolicy;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USER: &str = "root";

/// Resolved process settings: connection parameters plus policy snapshot
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub policy: AccessPolicy,
}

/// CLI-level overrides, the highest-precedence layer
///
/// `read_only` can only tighten the policy: the flag forces read-only even
/// when the environment says otherwise. Passwords are deliberately not
/// overridable from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub database: Option<String>,
    pub read_only: bool,
    pub max_rows: Option<u64>,
}

/// Resolve settings from the process environment
pub fn resolve(overrides: &Overrides) -> Result<Settings> {
    let environment: HashMap<String, String> = std::env::vars().collect();
    resolve_from(&environment, overrides)
}

/// Resolve settings from an explicit environment map
///
/// Separated from [`resolve`] so tests can exercise the full resolution
/// without touching process state.
pub fn resolve_from(
    environment: &HashMap<String, String>,
    overrides: &Overrides,
) -> Result<Settings> {
    let get = |key: &str| environment.get(key).map(String::as_str).filter(|v| !v.is_empty());

    let host = overrides
        .host
        .clone()
        .or_else(|| get("MYSQL_HOST").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match overrides.port {
        Some(port) => port,
        None => match get("MYSQL_PORT") {
            Some(raw) => parse_port(raw)?,
            None => DEFAULT_PORT,
        },
    };

    let user = overrides
        .user
        .clone()
        .or_else(|| get("MYSQL_USER").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_USER.to_string());

    let password = get("MYSQL_PASSWORD").unwrap_or_default().to_string();

    let database = overrides
        .database
        .clone()
        .or_else(|| get("MYSQL_DATABASE").map(str::to_string))
        .ok_or_else(|| {
            PortaError::config_error(
                "No database configured: set MYSQL_DATABASE or pass --database",
            )
        })?;

    let read_only = overrides.read_only || parse_flag(get("PORTA_READ_ONLY"), "PORTA_READ_ONLY")?;

    let max_rows = match overrides.max_rows {
        Some(n) => n,
        None => match get("PORTA_MAX_ROWS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                PortaError::config_error(format!("PORTA_MAX_ROWS must be an integer, got '{raw}'"))
            })?,
            None => AccessPolicy::default().max_rows,
        },
    };
    if max_rows == 0 {
        return Err(PortaError::config_error("PORTA_MAX_ROWS must be at least 1"));
    }

    let policy = AccessPolicy {
        read_only,
        allow_insert: parse_flag(get("PORTA_ALLOW_INSERT"), "PORTA_ALLOW_INSERT")?,
        allow_update: parse_flag(get("PORTA_ALLOW_UPDATE"), "PORTA_ALLOW_UPDATE")?,
        allow_delete: parse_flag(get("PORTA_ALLOW_DELETE"), "PORTA_ALLOW_DELETE")?,
        allow_create_table: parse_flag(
            get("PORTA_ALLOW_CREATE_TABLE"),
            "PORTA_ALLOW_CREATE_TABLE",
        )?,
        allowed_tables: parse_table_list(get("PORTA_ALLOWED_TABLES")),
        blocked_tables: parse_table_list(get("PORTA_BLOCKED_TABLES")),
        max_rows,
    };

    Ok(Settings {
        connection: ConnectionSettings { host, port, user, password, database },
        policy,
    })
}

fn parse_port(raw: &str) -> Result<u16> {
    let port = raw
        .parse::<u16>()
        .map_err(|_| PortaError::config_error(format!("MYSQL_PORT must be a port number, got '{raw}'")))?;
    if port == 0 {
        return Err(PortaError::config_error("MYSQL_PORT must be non-zero"));
    }
    Ok(port)
}

/// Parse a boolean flag; absence means false
fn parse_flag(raw: Option<&str>, name: &str) -> Result<bool> {
    let Some(raw) = raw else { return Ok(false) };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PortaError::config_error(format!(
            "{name} must be a boolean (true/false), got '{other}'"
        ))),
    }
}

/// Parse a comma-separated table list; blank entries are dropped
fn parse_table_list(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_apply_when_environment_is_empty() {
        let settings =
            resolve_from(&env(&[("MYSQL_DATABASE", "appdb")]), &Overrides::default()).unwrap();
        assert_eq!(settings.connection.host, "127.0.0.1");
        assert_eq!(settings.connection.port, 3306);
        assert_eq!(settings.connection.user, "root");
        assert_eq!(settings.connection.database, "appdb");
        assert!(!settings.policy.read_only);
        assert!(!settings.policy.allow_insert);
        assert_eq!(settings.policy.max_rows, AccessPolicy::default().max_rows);
    }

    #[test]
    fn test_missing_database_is_an_error() {
        let err = resolve_from(&env(&[]), &Overrides::default()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains("MYSQL_DATABASE"));
    }

    #[test]
    fn test_environment_beats_defaults_and_overrides_beat_environment() {
        let environment = env(&[
            ("MYSQL_DATABASE", "appdb"),
            ("MYSQL_HOST", "db.internal"),
            ("MYSQL_PORT", "3307"),
        ]);

        let settings = resolve_from(&environment, &Overrides::default()).unwrap();
        assert_eq!(settings.connection.host, "db.internal");
        assert_eq!(settings.connection.port, 3307);

        let overrides =
            Overrides { host: Some("localhost".to_string()), port: Some(13306), ..Default::default() };
        let settings = resolve_from(&environment, &overrides).unwrap();
        assert_eq!(settings.connection.host, "localhost");
        assert_eq!(settings.connection.port, 13306);
    }

    #[test]
    fn test_policy_flags_parse() {
        let environment = env(&[
            ("MYSQL_DATABASE", "appdb"),
            ("PORTA_ALLOW_INSERT", "true"),
            ("PORTA_ALLOW_UPDATE", "1"),
            ("PORTA_ALLOW_DELETE", "off"),
            ("PORTA_READ_ONLY", "no"),
        ]);
        let policy = resolve_from(&environment, &Overrides::default()).unwrap().policy;
        assert!(policy.allow_insert);
        assert!(policy.allow_update);
        assert!(!policy.allow_delete);
        assert!(!policy.allow_create_table);
        assert!(!policy.read_only);
    }

    #[test]
    fn test_bad_flag_value_is_an_error() {
        let environment = env(&[("MYSQL_DATABASE", "appdb"), ("PORTA_READ_ONLY", "maybe")]);
        let err = resolve_from(&environment, &Overrides::default()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains("PORTA_READ_ONLY"));
    }

    #[test]
    fn test_read_only_override_only_tightens() {
        let environment = env(&[("MYSQL_DATABASE", "appdb"), ("PORTA_READ_ONLY", "false")]);
        let overrides = Overrides { read_only: true, ..Default::default() };
        let policy = resolve_from(&environment, &overrides).unwrap().policy;
        assert!(policy.read_only);
    }

    #[test]
    fn test_table_lists_parse_and_trim() {
        let environment = env(&[
            ("MYSQL_DATABASE", "appdb"),
            ("PORTA_ALLOWED_TABLES", "users, orders ,"),
            ("PORTA_BLOCKED_TABLES", "audit_log"),
        ]);
        let policy = resolve_from(&environment, &Overrides::default()).unwrap().policy;
        assert_eq!(
            policy.allowed_tables,
            ["users", "orders"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert!(policy.blocked_tables.contains("audit_log"));
    }

    #[test]
    fn test_zero_max_rows_rejected() {
        let environment = env(&[("MYSQL_DATABASE", "appdb"), ("PORTA_MAX_ROWS", "0")]);
        let err = resolve_from(&environment, &Overrides::default()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_bad_port_rejected() {
        let environment = env(&[("MYSQL_DATABASE", "appdb"), ("MYSQL_PORT", "70000")]);
        let err = resolve_from(&environment, &Overrides::default()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains("MYSQL_PORT"));
    }
}
