//! End-to-end tests for assisted (searchable) encryption
//!
//! Verifies the deterministic/randomized split through the public surface:
//! randomized ciphertexts with equal plaintexts, equal assist values
//! enabling equality search, predicate rewriting to the assist column, and
//! fail-fast rejection of predicates that cannot be evaluated safely.

mod common;

use common::MemoryBackend;
use sqlcloak::{
    CloakError, ColumnBinding, EncryptDataSource, EncryptOptions, EncryptRuleConfig,
    EncryptorConfig, SqlValue,
};

fn rule_config() -> EncryptRuleConfig {
    EncryptRuleConfig::new()
        .with_encryptor(
            EncryptorConfig::new("assist-key", "assisted-aes-256-gcm")
                .with_property("passphrase", "assisted-query-test"),
        )
        .with_encryptor(
            EncryptorConfig::new("rand-key", "aes-256-gcm")
                .with_property("passphrase", "assisted-query-test"),
        )
        .with_binding(
            ColumnBinding::new("t_query_encrypt", "pwd", "assist-key")
                .with_assist("assist-key", "assist_pwd"),
        )
        .with_binding(ColumnBinding::new("t_rand", "secret", "rand-key"))
}

fn create_datasource() -> (EncryptDataSource<MemoryBackend>, MemoryBackend) {
    common::init_test_logging();
    let backend = MemoryBackend::new();
    let datasource =
        EncryptDataSource::new(backend.clone(), rule_config(), EncryptOptions::new()).unwrap();
    let conn = datasource.connection().unwrap();
    conn.execute_script(
        "
        CREATE TABLE t_query_encrypt (id INT, pwd VARCHAR(256), assist_pwd VARCHAR(256));
        CREATE TABLE t_rand (id INT, secret VARCHAR(256));
        ",
    )
    .unwrap();
    conn.close().unwrap();
    (datasource, backend)
}

#[test]
fn test_assisted_equality_finds_matching_row_only() {
    let (datasource, _backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    conn.execute_update(
        "INSERT INTO t_query_encrypt (id, pwd) VALUES (1, 'secret'), (2, 'other')",
        &[],
    )
    .unwrap();

    let mut rows = conn
        .execute_query(
            "SELECT * FROM t_query_encrypt WHERE pwd = ?",
            &[SqlValue::Text("secret".to_string())],
        )
        .unwrap();
    let row = rows.next().unwrap().unwrap();
    assert_eq!(row.get("id").unwrap(), Some(SqlValue::Integer(1)));
    assert_eq!(
        row.get("pwd").unwrap(),
        Some(SqlValue::Text("secret".to_string()))
    );
    assert!(rows.next().unwrap().is_none());

    let mut rows = conn
        .execute_query(
            "SELECT * FROM t_query_encrypt WHERE pwd = 'missing'",
            &[],
        )
        .unwrap();
    assert!(rows.next().unwrap().is_none());
    conn.close().unwrap();
}

#[test]
fn test_randomized_ciphertext_equal_assist_values() {
    let (datasource, backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    conn.execute_update(
        "INSERT INTO t_query_encrypt (id, pwd) VALUES (1, 'same'), (2, 'same')",
        &[],
    )
    .unwrap();

    let raw = backend.raw_rows("t_query_encrypt").unwrap();
    // Randomized primary encryption: equal plaintexts, different ciphertexts.
    assert_ne!(raw[0][1], raw[1][1]);
    // Deterministic assist pipeline: equal plaintexts, equal assist values.
    assert_eq!(raw[0][2], raw[1][2]);
    conn.close().unwrap();
}

#[test]
fn test_in_list_matches_multiple_rows() {
    let (datasource, _backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    conn.execute_update(
        "INSERT INTO t_query_encrypt (id, pwd) VALUES (1, 'a'), (2, 'b'), (3, 'c')",
        &[],
    )
    .unwrap();

    let mut rows = conn
        .execute_query(
            "SELECT id FROM t_query_encrypt WHERE pwd IN ('a', 'c')",
            &[],
        )
        .unwrap();
    let mut ids = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        ids.push(row.get("id").unwrap().unwrap());
    }
    assert_eq!(ids, vec![SqlValue::Integer(1), SqlValue::Integer(3)]);
    conn.close().unwrap();
}

#[test]
fn test_update_keeps_assist_in_sync() {
    let (datasource, _backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    conn.execute_update(
        "INSERT INTO t_query_encrypt (id, pwd) VALUES (1, 'before')",
        &[],
    )
    .unwrap();

    let affected = conn
        .execute_update(
            "UPDATE t_query_encrypt SET pwd = 'after' WHERE id = 1",
            &[],
        )
        .unwrap();
    assert_eq!(affected, 1);

    let mut rows = conn
        .execute_query(
            "SELECT id FROM t_query_encrypt WHERE pwd = 'after'",
            &[],
        )
        .unwrap();
    assert!(rows.next().unwrap().is_some());

    let mut rows = conn
        .execute_query(
            "SELECT id FROM t_query_encrypt WHERE pwd = 'before'",
            &[],
        )
        .unwrap();
    assert!(rows.next().unwrap().is_none());
    conn.close().unwrap();
}

#[test]
fn test_delete_by_encrypted_equality() {
    let (datasource, _backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    conn.execute_update(
        "INSERT INTO t_query_encrypt (id, pwd) VALUES (1, 'keep'), (2, 'drop')",
        &[],
    )
    .unwrap();

    let affected = conn
        .execute_update("DELETE FROM t_query_encrypt WHERE pwd = 'drop'", &[])
        .unwrap();
    assert_eq!(affected, 1);

    let mut rows = conn
        .execute_query("SELECT * FROM t_query_encrypt", &[])
        .unwrap();
    let row = rows.next().unwrap().unwrap();
    assert_eq!(row.get("id").unwrap(), Some(SqlValue::Integer(1)));
    assert!(rows.next().unwrap().is_none());
    conn.close().unwrap();
}

#[test]
fn test_like_fails_before_touching_the_backend() {
    let (datasource, backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    let baseline = backend.statement_count();

    let err = conn
        .execute_query(
            "SELECT * FROM t_query_encrypt WHERE pwd LIKE '%x%'",
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, CloakError::UnsupportedPredicate { .. }));
    // Fail fast: nothing reached the real connection.
    assert_eq!(backend.statement_count(), baseline);
    conn.close().unwrap();
}

#[test]
fn test_equality_on_randomized_without_assist_fails_fast() {
    let (datasource, backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    conn.execute_update(
        "INSERT INTO t_rand (id, secret) VALUES (1, 'hidden')",
        &[],
    )
    .unwrap();
    let baseline = backend.statement_count();

    let err = conn
        .execute_query("SELECT * FROM t_rand WHERE secret = 'hidden'", &[])
        .unwrap_err();
    assert!(matches!(err, CloakError::UnsupportedPredicate { .. }));
    assert_eq!(backend.statement_count(), baseline);

    // The column still round-trips through an unconditional read.
    let mut rows = conn.execute_query("SELECT * FROM t_rand", &[]).unwrap();
    let row = rows.next().unwrap().unwrap();
    assert_eq!(
        row.get("secret").unwrap(),
        Some(SqlValue::Text("hidden".to_string()))
    );
    conn.close().unwrap();
}

#[test]
fn test_range_predicates_fail_on_encrypted_column() {
    let (datasource, _backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    for sql in [
        "SELECT * FROM t_query_encrypt WHERE pwd > 'a'",
        "SELECT * FROM t_query_encrypt WHERE pwd BETWEEN 'a' AND 'b'",
        "DELETE FROM t_query_encrypt WHERE pwd <> 'a'",
    ] {
        match conn.execute_query(sql, &[]) {
            Err(CloakError::UnsupportedPredicate { .. }) => {}
            Err(other) => panic!("expected UnsupportedPredicate for '{}', got {}", sql, other),
            Ok(_) => panic!("predicate should have been rejected: {}", sql),
        }
    }
    conn.close().unwrap();
}

#[test]
fn test_assist_column_rejects_direct_writes() {
    let (datasource, _backend) = create_datasource();
    let conn = datasource.connection().unwrap();
    let err = conn
        .execute_update(
            "INSERT INTO t_query_encrypt (id, pwd, assist_pwd) VALUES (1, 'a', 'b')",
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, CloakError::Configuration { .. }));
    conn.close().unwrap();
}
