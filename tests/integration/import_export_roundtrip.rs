#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use graphport::cli::import_export::import_path;
use graphport::export::{Encoding, ExportOptions, ExportRouter};
use graphport::import::{IdMode, ImportOptions};
use graphport::report::{CollectingReporter, TracingReporter};
use graphport::storage::{GraphStore, MemoryStore, SqliteStore};
use graphport::types::LabelKind;
use graphport::value::{CellPolicy, Value};
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write fixture");
}

fn people_and_friends(dir: &Path) {
    write(dir, "Person.csv", "id,name,age\n1,John,30\n2,Jane,25\n");
    write(
        dir,
        "edge_KNOWS.csv",
        "start_id,start_vertex_type,end_id,end_vertex_type,since\n1,Person,2,Person,2019\n",
    );
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = ReaderBuilder::new().from_path(path).expect("open csv");
    let header = reader
        .headers()
        .expect("header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("row").iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

#[test]
fn csv_directory_round_trips_through_sqlite() {
    let input = TempDir::new().expect("tempdir");
    people_and_friends(input.path());
    let work = TempDir::new().expect("tempdir");
    let db_path = work.path().join("graph.db");

    let mut store = SqliteStore::open(&db_path, &graphport::storage::StoreOptions::create())
        .expect("open store");
    let summary = import_path(
        &mut store,
        &mut TracingReporter,
        input.path(),
        ImportOptions::default(),
    )
    .expect("import");
    assert_eq!((summary.vertices, summary.edges, summary.failures()), (2, 1, 0));

    let out = work.path().join("out");
    let options = ExportOptions::default();
    let mut reporter = CollectingReporter::new();
    let exported = ExportRouter::new(&store, &mut reporter, &options)
        .export_all(&out)
        .expect("export");
    assert!(exported
        .labels
        .iter()
        .all(|label| label.encoding == Encoding::Tabular));

    let (header, rows) = read_rows(&out.join("Person.csv"));
    assert_eq!(header, vec!["id", "age", "name"]);
    assert_eq!(
        rows,
        vec![vec!["1", "30", "John"], vec!["2", "25", "Jane"]]
    );

    let (header, rows) = read_rows(&out.join("edge_KNOWS.csv"));
    assert_eq!(
        header,
        vec!["start_id", "start_vertex_type", "end_id", "end_vertex_type", "since"]
    );
    assert_eq!(rows, vec![vec!["1", "Person", "2", "Person", "2019"]]);
}

#[test]
fn exported_directory_reimports_into_a_fresh_store() {
    let input = TempDir::new().expect("tempdir");
    people_and_friends(input.path());
    let mut first = MemoryStore::new();
    import_path(
        &mut first,
        &mut TracingReporter,
        input.path(),
        ImportOptions::default(),
    )
    .expect("first import");

    let out = TempDir::new().expect("tempdir");
    let options = ExportOptions::default();
    ExportRouter::new(&first, &mut TracingReporter, &options)
        .export_all(out.path())
        .expect("export");

    let mut second = MemoryStore::new();
    let options = ImportOptions {
        id_mode: IdMode::Preallocated,
        ..ImportOptions::default()
    };
    let summary =
        import_path(&mut second, &mut TracingReporter, out.path(), options).expect("reimport");
    assert_eq!((summary.vertices, summary.edges), (2, 1));

    let people = second.scan_vertices("Person").expect("scan people");
    let john = people
        .iter()
        .find(|row| row.properties["name"] == Value::from("John"))
        .expect("john");
    assert_eq!(john.properties["age"], Value::Int(30));
    let edges = second.scan_edges("KNOWS").expect("scan edges");
    assert_eq!(edges[0].start, john.id);
    assert_eq!(edges[0].properties["since"], Value::Int(2019));
}

#[test]
fn nested_properties_export_as_documents_and_reimport() {
    let input = TempDir::new().expect("tempdir");
    let people = json!([
        {"id": "a", "name": "Ada", "address": {"city": "London", "zip": "N1"}},
        {"id": "b", "name": "Grace", "tags": ["navy", "cobol"]}
    ]);
    write(input.path(), "Person.json", &people.to_string());
    let knows = json!([
        {"start_id": "a", "start_vertex_type": "Person", "end_id": "b",
         "end_vertex_type": "Person", "properties": {"context": {"met": 1950}}}
    ]);
    write(input.path(), "edge_KNOWS.json", &knows.to_string());

    let mut store = MemoryStore::new();
    let summary = import_path(
        &mut store,
        &mut TracingReporter,
        input.path(),
        ImportOptions::default(),
    )
    .expect("import");
    assert_eq!((summary.vertices, summary.edges), (2, 1));

    let out = TempDir::new().expect("tempdir");
    let options = ExportOptions::default();
    let exported = ExportRouter::new(&store, &mut TracingReporter, &options)
        .export_all(out.path())
        .expect("export");
    let kinds: Vec<_> = exported
        .labels
        .iter()
        .map(|label| (label.kind, label.encoding))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (LabelKind::Vertex, Encoding::Document),
            (LabelKind::Edge, Encoding::Document)
        ]
    );

    let edges: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join("edge_KNOWS.json")).expect("read"))
            .expect("parse");
    assert_eq!(edges[0]["start_id"], json!("a"));
    assert_eq!(edges[0]["end_id"], json!("b"));
    assert_eq!(edges[0]["properties"]["context"]["met"], json!(1950));

    let mut again = MemoryStore::new();
    let summary = import_path(
        &mut again,
        &mut TracingReporter,
        out.path(),
        ImportOptions::default(),
    )
    .expect("reimport");
    assert_eq!((summary.vertices, summary.edges), (2, 1));
}

#[test]
fn unresolved_endpoints_are_skipped_and_reported() {
    let input = TempDir::new().expect("tempdir");
    write(input.path(), "Person.csv", "id,name\n1,John\n2,Jane\n");
    write(
        input.path(),
        "edge_KNOWS.csv",
        "start_id,start_vertex_type,end_id,end_vertex_type\n1,Person,2,Person\n1,Person,7,Person\n",
    );
    let mut store = MemoryStore::new();
    let mut reporter = CollectingReporter::new();
    let summary = import_path(
        &mut store,
        &mut reporter,
        input.path(),
        ImportOptions::default(),
    )
    .expect("import");
    assert_eq!((summary.edges, summary.skipped), (1, 1));
    let skipped = reporter.skipped();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].0, 2);
}

#[test]
fn edges_against_unloaded_labels_fail_only_their_file() {
    let input = TempDir::new().expect("tempdir");
    write(input.path(), "Person.csv", "id\n1\n");
    write(
        input.path(),
        "edge_LIVES_IN.csv",
        "start_id,start_vertex_type,end_id,end_vertex_type\n1,Person,osl,City\n",
    );
    write(
        input.path(),
        "edge_KNOWS.csv",
        "start_id,start_vertex_type,end_id,end_vertex_type\n1,Person,1,Person\n",
    );
    let mut store = MemoryStore::new();
    let summary = import_path(
        &mut store,
        &mut TracingReporter,
        input.path(),
        ImportOptions::default(),
    )
    .expect("import");
    assert_eq!(summary.failures(), 1);
    let failed = summary
        .files
        .iter()
        .find(|file| file.error.is_some())
        .expect("failed file");
    assert_eq!(failed.label, "LIVES_IN");
    assert!(failed.error.as_deref().unwrap_or("").contains("City"));
    assert_eq!(summary.edges, 1);
}

#[test]
fn undecodable_rows_are_skipped_without_losing_siblings() {
    let input = TempDir::new().expect("tempdir");
    fs::write(
        input.path().join("Person.csv"),
        b"id,name\n1,John\n2,\xff\xfe\n3,Jane\n",
    )
    .expect("write fixture");
    let mut store = MemoryStore::new();
    let mut reporter = CollectingReporter::new();
    let summary = import_path(
        &mut store,
        &mut reporter,
        input.path(),
        ImportOptions::default(),
    )
    .expect("import");
    assert_eq!((summary.vertices, summary.skipped, summary.failures()), (2, 1, 0));
    assert_eq!(reporter.skipped()[0].0, 2);
    let names: Vec<Value> = store
        .scan_vertices("Person")
        .expect("scan")
        .into_iter()
        .map(|row| row.properties["name"].clone())
        .collect();
    assert_eq!(names, vec![Value::from("John"), Value::from("Jane")]);
}

#[test]
fn a_second_file_cannot_rebind_an_external_id() {
    let input = TempDir::new().expect("tempdir");
    write(input.path(), "Person.csv", "id,name\n1,John\n");
    write(input.path(), "Person.json", r#"[{"id": 1, "name": "Impostor"}]"#);
    write(
        input.path(),
        "edge_KNOWS.csv",
        "start_id,start_vertex_type,end_id,end_vertex_type\n1,Person,1,Person\n",
    );
    let mut store = MemoryStore::new();
    let summary = import_path(
        &mut store,
        &mut TracingReporter,
        input.path(),
        ImportOptions::default(),
    )
    .expect("import");
    assert_eq!((summary.vertices, summary.edges, summary.skipped), (1, 1, 1));

    let people = store.scan_vertices("Person").expect("scan people");
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].properties["name"], Value::from("John"));
    assert_eq!(store.scan_edges("KNOWS").expect("scan edges")[0].start, people[0].id);
}

#[test]
fn reinterpreted_ids_still_resolve_edges() {
    let input = TempDir::new().expect("tempdir");
    write(input.path(), "Tag.csv", "id,aliases\n'a',\"['x', 'y']\"\n");
    write(
        input.path(),
        "edge_SAME.csv",
        "start_id,start_vertex_type,end_id,end_vertex_type\n'a',Tag,'a',Tag\n",
    );
    let mut store = MemoryStore::new();
    let options = ImportOptions {
        cell_policy: CellPolicy::Reinterpret,
        ..ImportOptions::default()
    };
    let summary =
        import_path(&mut store, &mut TracingReporter, input.path(), options).expect("import");
    assert_eq!((summary.vertices, summary.edges, summary.skipped), (1, 1, 0));
    let tag = &store.scan_vertices("Tag").expect("scan")[0];
    assert!(matches!(tag.properties["aliases"], Value::List(_)));
}
