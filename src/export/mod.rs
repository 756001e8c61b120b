//! Store to file export.
//!
//! Every label is written whole, in one of two encodings. A label whose
//! properties are all scalars becomes a CSV table; a single nested value
//! anywhere in the label sends the entire label to a JSON document instead,
//! so one label never ends up split across formats.

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{BatchProgress, DEFAULT_BATCH_SIZE};
use crate::import::source::{FileFormat, ID_FIELD};
use crate::report::{Phase, ReportEvent, Reporter};
use crate::storage::{GraphStore, LabelInfo};
use crate::types::{LabelKind, Result};
use crate::value::{CellPolicy, PropertyMap, Value};

mod document;
mod reverse;
mod tabular;

pub use reverse::{external_id, Endpoint, ReverseLookup};

/// File name prefix marking edge files.
pub const EDGE_FILE_PREFIX: &str = "edge_";

/// Encoding chosen for a label.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// CSV with one column per property.
    Tabular,
    /// JSON array of records.
    Document,
}

impl Encoding {
    /// File format written for this encoding.
    pub fn format(self) -> FileFormat {
        match self {
            Encoding::Tabular => FileFormat::Csv,
            Encoding::Document => FileFormat::Json,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Tabular => "tabular",
            Encoding::Document => "document",
        })
    }
}

/// Picks the encoding for a label from all of its property maps.
pub fn route<'p>(props: impl IntoIterator<Item = &'p PropertyMap>, policy: CellPolicy) -> Encoding {
    let structured = props
        .into_iter()
        .any(|map| map.values().any(|value| value.looks_structured(policy)));
    if structured {
        Encoding::Document
    } else {
        Encoding::Tabular
    }
}

/// File name for a label in the given encoding.
pub fn file_name(label: &str, kind: LabelKind, encoding: Encoding) -> String {
    let ext = encoding.format().extension();
    match kind {
        LabelKind::Vertex => format!("{label}.{ext}"),
        LabelKind::Edge => format!("{EDGE_FILE_PREFIX}{label}.{ext}"),
    }
}

/// Options for an export run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Records written between flushes.
    pub batch_size: usize,
    /// Whether string properties holding literal syntax count as nested.
    pub cell_policy: CellPolicy,
    /// Property written as a vertex's external id.
    pub id_property: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cell_policy: CellPolicy::default(),
            id_property: ID_FIELD.to_string(),
        }
    }
}

/// One written file.
#[derive(Clone, Debug, Serialize)]
pub struct LabelExport {
    /// Label name.
    pub label: String,
    /// Vertex or edge label.
    pub kind: LabelKind,
    /// Encoding picked for the label.
    pub encoding: Encoding,
    /// Entities written.
    pub records: usize,
    /// Output file.
    pub path: PathBuf,
}

/// Result of [`ExportRouter::export_all`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExportSummary {
    /// Written files, vertex labels first.
    pub labels: Vec<LabelExport>,
    /// Vertices written across labels.
    pub vertices: usize,
    /// Edges written across labels.
    pub edges: usize,
}

impl ExportSummary {
    fn push(&mut self, export: LabelExport) {
        match export.kind {
            LabelKind::Vertex => self.vertices += export.records,
            LabelKind::Edge => self.edges += export.records,
        }
        self.labels.push(export);
    }
}

pub(crate) struct VertexLine<'r> {
    pub(crate) external_id: Value,
    pub(crate) properties: &'r PropertyMap,
}

pub(crate) struct EdgeLine<'r> {
    pub(crate) start: Endpoint,
    pub(crate) end: Endpoint,
    pub(crate) properties: &'r PropertyMap,
}

/// Called after each flushed chunk with `(chunk index, records)`.
pub(crate) type ChunkSink<'s> = &'s mut dyn FnMut(usize, usize);

/// Writes labels from a store into a directory.
pub struct ExportRouter<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    reporter: &'a mut dyn Reporter,
    options: &'a ExportOptions,
    reverse: ReverseLookup,
}

impl<'a, S: GraphStore + ?Sized> ExportRouter<'a, S> {
    /// Creates a router; the reverse lookup lives as long as the router.
    pub fn new(store: &'a S, reporter: &'a mut dyn Reporter, options: &'a ExportOptions) -> Self {
        Self {
            store,
            reporter,
            options,
            reverse: ReverseLookup::new(options.id_property.clone()),
        }
    }

    /// Exports every label, vertices first, into `out_dir`.
    pub fn export_all(&mut self, out_dir: &Path) -> Result<ExportSummary> {
        fs::create_dir_all(out_dir)?;
        let mut labels = self.store.labels()?;
        labels.sort_by_key(|info| (info.kind == LabelKind::Edge, info.id));
        let mut summary = ExportSummary::default();
        for info in &labels {
            if let Some(export) = self.export_label(info, out_dir)? {
                summary.push(export);
            }
        }
        info!(
            out_dir = %out_dir.display(),
            files = summary.labels.len(),
            vertices = summary.vertices,
            edges = summary.edges,
            "export.completed"
        );
        Ok(summary)
    }

    /// Exports one label. Returns `None` when the label is empty.
    pub fn export_label(&mut self, info: &LabelInfo, out_dir: &Path) -> Result<Option<LabelExport>> {
        match info.kind {
            LabelKind::Vertex => self.export_vertices(info, out_dir),
            LabelKind::Edge => self.export_edges(info, out_dir),
        }
    }

    fn export_vertices(&mut self, info: &LabelInfo, out_dir: &Path) -> Result<Option<LabelExport>> {
        let rows = self.store.scan_vertices(&info.name)?;
        self.reverse.record(info, &rows);
        if rows.is_empty() {
            return Ok(None);
        }
        let options = self.options;
        let encoding = route(rows.iter().map(|row| &row.properties), options.cell_policy);
        let id_property = options.id_property.as_str();
        let lines: Vec<VertexLine<'_>> = rows
            .iter()
            .map(|row| VertexLine {
                external_id: external_id(row.id, &row.properties, id_property),
                properties: &row.properties,
            })
            .collect();

        let path = out_dir.join(file_name(&info.name, info.kind, encoding));
        {
            let writer = BufWriter::new(File::create(&path)?);
            let mut sink = chunk_reporter(&mut *self.reporter, &info.name);
            let chunk = options.batch_size;
            match encoding {
                Encoding::Tabular => {
                    tabular::write_vertices(writer, &lines, id_property, chunk, &mut sink)?
                }
                Encoding::Document => {
                    document::write_vertices(writer, &lines, id_property, chunk, &mut sink)?
                }
            }
        }
        Ok(Some(self.routed(info, encoding, lines.len(), path)))
    }

    fn export_edges(&mut self, info: &LabelInfo, out_dir: &Path) -> Result<Option<LabelExport>> {
        let rows = self.store.scan_edges(&info.name)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let encoding = route(rows.iter().map(|row| &row.properties), self.options.cell_policy);
        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            lines.push(EdgeLine {
                start: self.reverse.resolve(self.store, row.start)?,
                end: self.reverse.resolve(self.store, row.end)?,
                properties: &row.properties,
            });
        }

        let path = out_dir.join(file_name(&info.name, info.kind, encoding));
        {
            let writer = BufWriter::new(File::create(&path)?);
            let mut sink = chunk_reporter(&mut *self.reporter, &info.name);
            let chunk = self.options.batch_size;
            match encoding {
                Encoding::Tabular => tabular::write_edges(writer, &lines, chunk, &mut sink)?,
                Encoding::Document => document::write_edges(writer, &lines, chunk, &mut sink)?,
            }
        }
        Ok(Some(self.routed(info, encoding, lines.len(), path)))
    }

    fn routed(&mut self, info: &LabelInfo, encoding: Encoding, records: usize, path: PathBuf) -> LabelExport {
        self.reporter.report(ReportEvent::LabelRouted {
            label: info.name.clone(),
            kind: info.kind,
            encoding,
            records,
        });
        LabelExport {
            label: info.name.clone(),
            kind: info.kind,
            encoding,
            records,
            path,
        }
    }
}

fn chunk_reporter<'r>(reporter: &'r mut dyn Reporter, label: &'r str) -> impl FnMut(usize, usize) + 'r {
    let mut written = 0;
    move |batch, records| {
        written += records;
        reporter.report(ReportEvent::BatchCommitted {
            phase: Phase::Export,
            progress: BatchProgress {
                label: label.to_string(),
                batch,
                records,
                committed: written,
                skipped: 0,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;
    use crate::storage::{MemoryStore, NewEdge};

    fn props(entries: &[(&str, Value)]) -> PropertyMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn scalar_labels_route_to_tables() {
        let a = props(&[("name", Value::from("a")), ("n", Value::Int(1))]);
        let b = props(&[("flag", Value::Bool(true))]);
        assert_eq!(route([&a, &b], CellPolicy::Scalars), Encoding::Tabular);
    }

    #[test]
    fn one_nested_value_routes_whole_label_to_documents() {
        let a = props(&[("name", Value::from("a"))]);
        let b = props(&[("address", Value::Map(props(&[("city", Value::from("Oslo"))])))]);
        assert_eq!(route([&a, &b], CellPolicy::Scalars), Encoding::Document);
    }

    #[test]
    fn literal_strings_only_route_under_reinterpret() {
        let a = props(&[("tags", Value::from("[1, 2]"))]);
        assert_eq!(route([&a], CellPolicy::Scalars), Encoding::Tabular);
        assert_eq!(route([&a], CellPolicy::Reinterpret), Encoding::Document);
    }

    #[test]
    fn file_names_follow_kind_and_encoding() {
        assert_eq!(file_name("Person", LabelKind::Vertex, Encoding::Tabular), "Person.csv");
        assert_eq!(file_name("KNOWS", LabelKind::Edge, Encoding::Document), "edge_KNOWS.json");
    }

    #[test]
    fn exports_mixed_labels_into_directory() {
        let mut store = MemoryStore::new();
        store.create_label("Person", LabelKind::Vertex).unwrap();
        store.create_label("Place", LabelKind::Vertex).unwrap();
        store.create_label("KNOWS", LabelKind::Edge).unwrap();
        store.create_label("EMPTY", LabelKind::Edge).unwrap();
        let john = props(&[("id", Value::Int(1)), ("name", Value::from("John"))]);
        let jane = props(&[("id", Value::Int(2)), ("name", Value::from("Jane"))]);
        let people = store.insert_vertices("Person", &[&john, &jane]).unwrap();
        let oslo = props(&[("id", Value::from("osl")), ("tags", Value::List(vec![Value::from("city")]))]);
        store.insert_vertices("Place", &[&oslo]).unwrap();
        let since = props(&[("since", Value::Int(2020))]);
        store
            .insert_edges(
                "KNOWS",
                &[NewEdge {
                    start: people[0],
                    end: people[1],
                    properties: &since,
                }],
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let options = ExportOptions::default();
        let mut reporter = CollectingReporter::new();
        let summary = ExportRouter::new(&store, &mut reporter, &options)
            .export_all(&out)
            .unwrap();

        assert_eq!((summary.vertices, summary.edges), (3, 1));
        let names: Vec<_> = summary
            .labels
            .iter()
            .map(|l| l.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Person.csv", "Place.json", "edge_KNOWS.csv"]);
        assert!(!out.join("edge_EMPTY.csv").exists());

        let edges = fs::read_to_string(out.join("edge_KNOWS.csv")).unwrap();
        assert_eq!(
            edges,
            "start_id,start_vertex_type,end_id,end_vertex_type,since\n1,Person,2,Person,2020\n"
        );
        let routed = reporter
            .events
            .iter()
            .filter(|e| matches!(e, ReportEvent::LabelRouted { .. }))
            .count();
        assert_eq!(routed, 3);
    }
}
