//! Record readers for vertex and edge interchange files.
//!
//! Readers fail up front on file-level problems (unreadable file, missing
//! `id` column, bad sentinels) and yield per-record errors inline so the
//! loaders can skip a bad row and keep its siblings.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Value as Json};

use super::partition::{split, SchemaPartition, END_ID, END_SENTINEL, START_ID, START_SENTINEL};
use crate::types::{Result, TransferError};
use crate::value::{properties_from_json, CellPolicy, PropertyMap, Value};

/// Column or key holding a vertex's external id.
pub const ID_FIELD: &str = "id";
/// Key of the nested property object in edge documents.
pub const PROPERTIES_FIELD: &str = "properties";

/// Interchange file encodings.
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Row-oriented CSV with a header.
    Csv,
    /// JSON array of objects.
    Json,
}

impl FileFormat {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(FileFormat::Csv)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(FileFormat::Json)
        } else {
            None
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

/// One vertex as read from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexRecord {
    /// One-based record number within its source.
    pub position: usize,
    /// All fields, `id` included.
    pub fields: PropertyMap,
}

/// One edge as read from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    /// One-based record number within its source.
    pub position: usize,
    /// External id of the start vertex.
    pub start_id: Value,
    /// Label of the start vertex.
    pub start_label: String,
    /// External id of the end vertex.
    pub end_id: Value,
    /// Label of the end vertex.
    pub end_label: String,
    /// Edge properties.
    pub properties: PropertyMap,
}

/// Lazily decoded vertex records.
pub type VertexRecords = Box<dyn Iterator<Item = Result<VertexRecord>>>;
/// Lazily decoded edge records.
pub type EdgeRecords = Box<dyn Iterator<Item = Result<EdgeRecord>>>;

/// Opens a vertex file.
pub fn read_vertices(path: &Path, format: FileFormat, policy: CellPolicy) -> Result<VertexRecords> {
    let file = BufReader::new(File::open(path)?);
    match format {
        FileFormat::Csv => csv_vertices(file, policy),
        FileFormat::Json => json_vertices(file),
    }
}

/// Opens an edge file.
pub fn read_edges(path: &Path, format: FileFormat, policy: CellPolicy) -> Result<EdgeRecords> {
    let file = BufReader::new(File::open(path)?);
    match format {
        FileFormat::Csv => csv_edges(file, policy),
        FileFormat::Json => json_edges(file),
    }
}

/// Whether a file follows the edge convention: sentinel columns in a CSV
/// header, or sentinel keys in the first JSON object.
pub fn carries_sentinels(path: &Path, format: FileFormat) -> Result<bool> {
    let file = BufReader::new(File::open(path)?);
    match format {
        FileFormat::Csv => {
            let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
            let headers = reader.headers()?;
            Ok(headers.iter().any(|h| h.trim() == START_SENTINEL)
                && headers.iter().any(|h| h.trim() == END_SENTINEL))
        }
        FileFormat::Json => {
            let Json::Array(items) = serde_json::from_reader::<_, Json>(file)? else {
                return Ok(false);
            };
            Ok(match items.first() {
                Some(Json::Object(first)) => {
                    first.contains_key(START_SENTINEL) && first.contains_key(END_SENTINEL)
                }
                _ => false,
            })
        }
    }
}

/// Decodes CSV vertices. The header must contain an `id` column.
pub fn csv_vertices<R: Read + 'static>(reader: R, policy: CellPolicy) -> Result<VertexRecords> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if !headers.iter().any(|h| h == ID_FIELD) {
        return Err(TransferError::malformed(
            "vertex header",
            format!("missing '{ID_FIELD}' column"),
        ));
    }
    ensure_unique(&headers, "vertex header")?;
    let records = reader
        .into_records()
        .enumerate()
        .map(move |(index, row)| {
            let position = index + 1;
            let row = row.map_err(|err| row_error(err, position))?;
            check_width(&row, headers.len(), position)?;
            let mut fields = cells_to_properties(&headers, row.iter(), policy);
            // Ids follow the endpoint rules so edge files resolve them alike.
            if let Some(raw) = headers.iter().position(|h| h == ID_FIELD).and_then(|i| row.get(i)) {
                match Value::from_cell(raw, CellPolicy::Scalars) {
                    Some(id) => fields.insert(ID_FIELD.to_string(), id),
                    None => fields.remove(ID_FIELD),
                };
            }
            Ok(VertexRecord { position, fields })
        });
    Ok(Box::new(records))
}

/// Decodes CSV edges using the sentinel column convention.
pub fn csv_edges<R: Read + 'static>(reader: R, policy: CellPolicy) -> Result<EdgeRecords> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let partition = split(&headers)?;
    partition.require_endpoint_ids()?;
    ensure_unique(&partition.edge_props, "edge header")?;
    let records = reader
        .into_records()
        .enumerate()
        .map(move |(index, row)| {
            let position = index + 1;
            let row = row.map_err(|err| row_error(err, position))?;
            csv_edge_record(&partition, &row, position, policy)
        });
    Ok(Box::new(records))
}

fn csv_edge_record(
    partition: &SchemaPartition,
    row: &StringRecord,
    position: usize,
    policy: CellPolicy,
) -> Result<EdgeRecord> {
    let cells: Vec<&str> = row.iter().collect();
    let slice = partition.slice_record(&cells).ok_or_else(|| {
        TransferError::record(
            position,
            format!("expected {} fields, found {}", partition.width(), cells.len()),
        )
    })?;
    // Endpoint ids are parsed as plain scalars so that "1" and 1 resolve alike.
    let endpoint = |values: &[&str]| {
        values
            .first()
            .and_then(|raw| Value::from_cell(raw, CellPolicy::Scalars))
            .unwrap_or(Value::Null)
    };
    Ok(EdgeRecord {
        position,
        start_id: endpoint(slice.start_values),
        start_label: slice.start_label.trim().to_string(),
        end_id: endpoint(slice.end_values),
        end_label: slice.end_label.trim().to_string(),
        properties: cells_to_properties(
            &partition.edge_props,
            slice.edge_values.iter().copied(),
            policy,
        ),
    })
}

/// Decodes a JSON array of vertex objects.
pub fn json_vertices<R: Read>(reader: R) -> Result<VertexRecords> {
    let items = json_array(reader, "vertex document")?;
    let records = items.into_iter().enumerate().map(|(index, item)| {
        let position = index + 1;
        let object = expect_object(item, position)?;
        Ok(VertexRecord {
            position,
            fields: properties_from_json(object),
        })
    });
    Ok(Box::new(records))
}

/// Decodes a JSON array of edge objects. Keys other than the endpoint keys
/// are flattened into the properties; the nested `properties` object wins on
/// conflicts.
pub fn json_edges<R: Read>(reader: R) -> Result<EdgeRecords> {
    let items = json_array(reader, "edge document")?;
    let records = items.into_iter().enumerate().map(|(index, item)| {
        let position = index + 1;
        let mut object = expect_object(item, position)?;
        let start_id = object.remove(START_ID).map(Value::from_json);
        let end_id = object.remove(END_ID).map(Value::from_json);
        let start_label = take_label(&mut object, START_SENTINEL);
        let end_label = take_label(&mut object, END_SENTINEL);
        let nested = match object.remove(PROPERTIES_FIELD) {
            None | Some(Json::Null) => Map::new(),
            Some(Json::Object(map)) => map,
            Some(other) => {
                return Err(TransferError::record(
                    position,
                    format!("'{PROPERTIES_FIELD}' must be an object, found {}", json_kind(&other)),
                ))
            }
        };
        let mut properties = properties_from_json(object);
        properties.extend(properties_from_json(nested));
        Ok(EdgeRecord {
            position,
            start_id: start_id.unwrap_or(Value::Null),
            start_label,
            end_id: end_id.unwrap_or(Value::Null),
            end_label,
            properties,
        })
    });
    Ok(Box::new(records))
}

fn json_array<R: Read>(reader: R, context: &str) -> Result<Vec<Json>> {
    match serde_json::from_reader::<_, Json>(reader)? {
        Json::Array(items) => Ok(items),
        other => Err(TransferError::malformed(
            context,
            format!("expected a top-level array, found {}", json_kind(&other)),
        )),
    }
}

fn expect_object(item: Json, position: usize) -> Result<Map<String, Json>> {
    match item {
        Json::Object(map) => Ok(map),
        other => Err(TransferError::record(
            position,
            format!("expected an object, found {}", json_kind(&other)),
        )),
    }
}

fn take_label(object: &mut Map<String, Json>, key: &str) -> String {
    match object.remove(key) {
        Some(Json::String(label)) => label.trim().to_string(),
        _ => String::new(),
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn ensure_unique(names: &[String], context: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(TransferError::malformed(context, "empty column name"));
        }
        if !seen.insert(name.as_str()) {
            return Err(TransferError::malformed(
                context,
                format!("duplicate column '{name}'"),
            ));
        }
    }
    Ok(())
}

/// Undecodable or ragged rows cost only themselves; anything else, such as
/// an I/O failure, ends the file.
fn row_error(err: csv::Error, position: usize) -> TransferError {
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. } => {
            TransferError::record(position, err.to_string())
        }
        _ => err.into(),
    }
}

fn check_width(row: &StringRecord, width: usize, position: usize) -> Result<()> {
    if row.len() != width {
        return Err(TransferError::record(
            position,
            format!("expected {width} fields, found {}", row.len()),
        ));
    }
    Ok(())
}

fn cells_to_properties<'a>(
    names: &[String],
    cells: impl Iterator<Item = &'a str>,
    policy: CellPolicy,
) -> PropertyMap {
    names
        .iter()
        .zip(cells)
        .filter_map(|(name, raw)| Value::from_cell(raw, policy).map(|value| (name.clone(), value)))
        .collect()
}
