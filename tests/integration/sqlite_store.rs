#![allow(missing_docs)]

use graphport::storage::{
    GraphStore, NewEdge, SqliteStore, StoreError, StoreOptions, Synchronous,
};
use graphport::types::{encode, LabelKind};
use graphport::value::{PropertyMap, Value};
use tempfile::TempDir;

fn props(entries: &[(&str, Value)]) -> PropertyMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn labels_and_entities_survive_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested/graph.db");
    let nested = props(&[
        ("id", Value::from("a")),
        ("score", Value::Float(1.5)),
        (
            "address",
            Value::Map(props(&[("city", Value::from("Oslo"))])),
        ),
        ("zip", Value::from("0150")),
    ]);
    let (person, ids) = {
        let opts = StoreOptions::create().synchronous(Synchronous::Normal);
        let mut store = SqliteStore::open(&path, &opts).expect("create store");
        let person = store
            .create_label("Person", LabelKind::Vertex)
            .expect("label");
        store.create_label("KNOWS", LabelKind::Edge).expect("label");
        let plain = props(&[("id", Value::Int(2))]);
        let ids = store
            .insert_vertices("Person", &[&nested, &plain])
            .expect("insert vertices");
        let weight = props(&[("weight", Value::Int(5))]);
        store
            .insert_edges(
                "KNOWS",
                &[NewEdge {
                    start: ids[0],
                    end: ids[1],
                    properties: &weight,
                }],
            )
            .expect("insert edge");
        (person, ids)
    };

    let store = SqliteStore::open(&path, &StoreOptions::default()).expect("reopen");
    let labels = store.labels().expect("labels");
    assert_eq!(labels.len(), 2);
    assert_eq!(store.label("Person").expect("lookup"), Some(person.clone()));
    assert_eq!(store.max_sequence("Person").expect("max seq"), 2);

    let rows = store.scan_vertices("Person").expect("scan");
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    assert_eq!(rows[0].properties, nested);
    assert_eq!(rows[0].properties["zip"], Value::from("0150"));

    let edges = store.scan_edges("KNOWS").expect("scan edges");
    assert_eq!((edges[0].start, edges[0].end), (ids[0], ids[1]));
    assert_eq!(edges[0].id.label(), store.label_numeric_id("KNOWS").expect("id"));
}

#[test]
fn sequences_continue_after_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("graph.db");
    let empty = PropertyMap::new();
    let first = {
        let mut store = SqliteStore::open(&path, &StoreOptions::create()).expect("create");
        store
            .create_label("Person", LabelKind::Vertex)
            .expect("label");
        store
            .insert_vertices("Person", &[&empty])
            .expect("insert")[0]
    };
    let mut store = SqliteStore::open(&path, &StoreOptions::default()).expect("reopen");
    let second = store.insert_vertices("Person", &[&empty]).expect("insert")[0];
    assert_eq!(second.sequence(), first.sequence() + 1);

    let preallocated = encode(first.label(), 10).expect("encode");
    store
        .insert_vertices_with_ids("Person", &[(preallocated, &empty)])
        .expect("preallocated insert");
    assert_eq!(store.max_sequence("Person").expect("max seq"), 10);
    let err = store
        .insert_vertices_with_ids("Person", &[(preallocated, &empty)])
        .expect_err("duplicate id");
    assert!(matches!(err, StoreError::DuplicateId(id) if id == preallocated));
}

#[test]
fn opening_a_missing_database_without_create_fails() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.db");
    let err = match SqliteStore::open(&path, &StoreOptions::default()) {
        Ok(_) => panic!("store should not open"),
        Err(err) => err,
    };
    assert!(matches!(err, StoreError::MissingDatabase(p) if p == path));
    assert!(!path.exists());
}
