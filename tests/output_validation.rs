//! Output Validation Tests
//!
//! Validates that the JSON envelopes agents parse stay stable:
//! - Success envelopes match the documented schema
//! - Error envelopes carry stable codes
//! - Metadata is consistent and omits absent fields
//!
//! Uses `insta` inline snapshots to detect unintended output changes.

use porta::{
    ErrorEnvelope, Metadata, PortaError, QueryResult, SuccessEnvelope, TableList,
};

// ============================================================================
// Envelope Structure
// ============================================================================

#[test]
fn test_success_envelope_structure() {
    let envelope = SuccessEnvelope::new(
        "select",
        serde_json::json!({"x": 1}),
        Metadata::with_rows(5, 1),
    );

    let json_value = serde_json::to_value(&envelope).expect("Should serialize");
    assert_eq!(json_value["ok"], true);
    assert_eq!(json_value["tool"], "select");
    assert!(json_value["data"].is_object());
    assert_eq!(json_value["meta"]["elapsed_ms"], 5);
    assert_eq!(json_value["meta"]["rows"], 1);

    let top_level_keys: Vec<&str> =
        json_value.as_object().unwrap().keys().map(|s| s.as_str()).collect();
    assert_eq!(top_level_keys, vec!["ok", "tool", "data", "meta"]);
}

#[test]
fn test_error_envelope_structure() {
    let err = PortaError::table_blocked("secrets");
    let envelope = ErrorEnvelope::from_error("delete", &err);

    let json_value = serde_json::to_value(&envelope).expect("Should serialize");
    assert_eq!(json_value["ok"], false);
    assert_eq!(json_value["tool"], "delete");
    assert_eq!(json_value["error"]["code"], "TABLE_BLOCKED");
    assert!(json_value["error"]["message"].as_str().unwrap().contains("secrets"));
}

#[test]
fn test_query_result_omits_affected_count_for_reads() {
    let result = QueryResult {
        columns: vec!["id".to_string()],
        rows: vec![vec![serde_json::json!(1)]],
        row_count: 1,
        rows_affected: None,
        elapsed_ms: 2,
    };
    let json = serde_json::to_string(&result).unwrap();
    assert!(!json.contains("rows_affected"));

    let mutation = QueryResult {
        columns: Vec::new(),
        rows: Vec::new(),
        row_count: 0,
        rows_affected: Some(3),
        elapsed_ms: 2,
    };
    let json = serde_json::to_string(&mutation).unwrap();
    assert!(json.contains(r#""rows_affected":3"#));
}

// ============================================================================
// Snapshot Tests (using insta)
// ============================================================================

#[test]
fn test_success_envelope_snapshot() {
    let list = TableList { tables: vec!["users".to_string()], elapsed_ms: 4 };
    let envelope = SuccessEnvelope::new("list_tables", list, Metadata::with_rows(4, 1));
    let json = serde_json::to_string(&envelope).unwrap();
    insta::assert_snapshot!(
        json,
        @r#"{"ok":true,"tool":"list_tables","data":{"tables":["users"],"elapsed_ms":4},"meta":{"elapsed_ms":4,"rows":1}}"#
    );
}

#[test]
fn test_error_envelope_snapshot() {
    let err = PortaError::feature_disabled("insert");
    let envelope = ErrorEnvelope::from_error("insert", &err);
    let json = serde_json::to_string(&envelope).unwrap();
    insta::assert_snapshot!(
        json,
        @r#"{"ok":false,"tool":"insert","error":{"code":"FEATURE_DISABLED","message":"Feature disabled: insert is not enabled on this server"}}"#
    );
}

#[test]
fn test_metadata_snapshot_without_rows() {
    let json = serde_json::to_string(&Metadata::new(7)).unwrap();
    insta::assert_snapshot!(json, @r#"{"elapsed_ms":7}"#);
}
