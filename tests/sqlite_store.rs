use std::collections::BTreeMap;

use tabconv::config::{Config, InsertMode};
use tabconv::store::{self, SqliteStore, StoreConnection};
use tabconv::{ConvertError, Converter, Record, RecordSet};

fn sorted(set: &RecordSet) -> Vec<BTreeMap<String, Option<String>>> {
    let mut rows: Vec<_> = set
        .iter()
        .map(|r| {
            r.iter()
                .map(|(k, v)| (k.to_string(), v.flatten()))
                .collect::<BTreeMap<_, _>>()
        })
        .collect();
    rows.sort();
    rows
}

#[test]
fn insert_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    let source = Converter::from_csv("id,name,city\n1,Ann,Oslo\n2,Bo,\n3,Cy,Rome\n", b',').unwrap();
    let inserted = source.to_sqlite(&db, "people").unwrap();
    assert_eq!(inserted, 3);

    let back = Converter::from_sqlite(&db, "people").unwrap();
    assert_eq!(sorted(back.records()), sorted(source.records()));
    assert!(back
        .records()
        .iter()
        .flat_map(Record::iter)
        .all(|(_, v)| v.as_text().is_some()));
}

#[test]
fn sqlite_to_json_and_xml() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");
    Converter::from_json(r#"[{"id":"1","name":"Zoë"}]"#)
        .unwrap()
        .to_sqlite(&db, "people")
        .unwrap();

    let converter = Converter::from_sqlite(&db, "people").unwrap();
    assert!(converter.to_json().unwrap().contains("\"name\": \"Zoë\""));
    assert!(converter.to_xml().unwrap().contains("<name>Zoë</name>"));
}

#[test]
fn repeated_writes_append_rows() {
    let mut conn = SqliteStore::in_memory().unwrap();
    let converter = Converter::from_json(r#"[{"id":"1"}]"#).unwrap();
    converter.to_store(&mut conn, "t").unwrap();
    converter.to_store(&mut conn, "t").unwrap();

    let back = store::read_table(&mut conn, "t").unwrap();
    assert_eq!(back.len(), 2);
}

#[test]
fn row_at_a_time_keeps_rows_before_failure() {
    let mut conn = SqliteStore::in_memory().unwrap();
    conn.execute("CREATE TABLE t (`id` TEXT UNIQUE)").unwrap();

    let converter = Converter::from_json(r#"[{"id":"1"},{"id":"2"},{"id":"1"},{"id":"3"}]"#).unwrap();
    let err = converter.to_store(&mut conn, "t").unwrap_err();
    assert!(matches!(err, ConvertError::QueryExecution { committed: 2, .. }));
    assert_eq!(store::read_table(&mut conn, "t").unwrap().len(), 2);
}

#[test]
fn transactional_mode_rolls_back() {
    let mut conn = SqliteStore::in_memory().unwrap();
    conn.execute("CREATE TABLE t (`id` TEXT UNIQUE)").unwrap();

    let converter = Converter::from_json(r#"[{"id":"1"},{"id":"2"},{"id":"1"}]"#)
        .unwrap()
        .with_config(Config::new().with_insert_mode(InsertMode::Transactional));
    let err = converter.to_store(&mut conn, "t").unwrap_err();
    assert!(matches!(err, ConvertError::QueryExecution { committed: 0, .. }));
    assert!(store::read_table(&mut conn, "t").unwrap().is_empty());
}

#[test]
fn hostile_table_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");
    let converter = Converter::from_json(r#"[{"id":"1"}]"#).unwrap();

    let err = converter.to_sqlite(&db, "\"; DROP TABLE x; --").unwrap_err();
    assert!(matches!(err, ConvertError::InvalidIdentifier(_)));
    assert!(!db.exists());

    converter.to_sqlite(&db, "x").unwrap();
    let err = Converter::from_sqlite(&db, "x; DROP TABLE x").unwrap_err();
    assert!(matches!(err, ConvertError::InvalidIdentifier(_)));
    assert_eq!(Converter::from_sqlite(&db, "x").unwrap().records().len(), 1);
}

#[test]
fn missing_database_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Converter::from_sqlite(&dir.path().join("none.db"), "t").unwrap_err();
    assert!(matches!(err, ConvertError::Connection(_)));
}
