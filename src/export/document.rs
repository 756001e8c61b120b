use std::io::Write;

use serde_json::{Map, Value as Json};

use super::{ChunkSink, EdgeLine, VertexLine};
use crate::batch::batches;
use crate::import::partition::{END_ID, END_SENTINEL, START_ID, START_SENTINEL};
use crate::import::source::{ID_FIELD, PROPERTIES_FIELD};
use crate::types::Result;
use crate::value::properties_to_json;

fn vertex_document(line: &VertexLine<'_>, id_property: &str) -> Result<Json> {
    let mut object = Map::new();
    for (key, value) in line.properties {
        if key == id_property {
            continue;
        }
        let key = if key == ID_FIELD {
            format!("_{key}")
        } else {
            key.clone()
        };
        object.insert(key, value.to_json()?);
    }
    object.insert(ID_FIELD.to_string(), line.external_id.to_json()?);
    Ok(Json::Object(object))
}

fn edge_document(line: &EdgeLine<'_>) -> Result<Json> {
    let mut object = Map::new();
    object.insert(START_ID.to_string(), line.start.external_id.to_json()?);
    object.insert(START_SENTINEL.to_string(), Json::String(line.start.label.clone()));
    object.insert(END_ID.to_string(), line.end.external_id.to_json()?);
    object.insert(END_SENTINEL.to_string(), Json::String(line.end.label.clone()));
    object.insert(
        PROPERTIES_FIELD.to_string(),
        Json::Object(properties_to_json(line.properties)?),
    );
    Ok(Json::Object(object))
}

fn write_array<W: Write>(
    mut writer: W,
    documents: impl Iterator<Item = Result<Json>>,
    chunk: usize,
    sink: ChunkSink<'_>,
) -> Result<()> {
    writer.write_all(b"[")?;
    let mut first = true;
    for (batch, group) in batches(documents, chunk).enumerate() {
        let records = group.len();
        for document in group {
            let document = document?;
            writer.write_all(if first { b"\n  " } else { b",\n  " })?;
            serde_json::to_writer(&mut writer, &document)?;
            first = false;
        }
        writer.flush()?;
        sink(batch, records);
    }
    writer.write_all(b"\n]\n")?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn write_vertices<W: Write>(
    writer: W,
    lines: &[VertexLine<'_>],
    id_property: &str,
    chunk: usize,
    sink: ChunkSink<'_>,
) -> Result<()> {
    let documents = lines.iter().map(|line| vertex_document(line, id_property));
    write_array(writer, documents, chunk, sink)
}

pub(crate) fn write_edges<W: Write>(
    writer: W,
    lines: &[EdgeLine<'_>],
    chunk: usize,
    sink: ChunkSink<'_>,
) -> Result<()> {
    write_array(writer, lines.iter().map(edge_document), chunk, sink)
}
