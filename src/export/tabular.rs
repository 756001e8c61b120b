use std::collections::BTreeSet;
use std::io::Write;

use csv::WriterBuilder;

use super::{ChunkSink, EdgeLine, VertexLine};
use crate::batch::batches;
use crate::import::partition::{END_ID, END_SENTINEL, START_ID, START_SENTINEL};
use crate::import::source::ID_FIELD;
use crate::types::Result;
use crate::value::PropertyMap;

const VERTEX_COLUMNS: [&str; 1] = [ID_FIELD];
const EDGE_COLUMNS: [&str; 4] = [START_ID, START_SENTINEL, END_ID, END_SENTINEL];

/// Sorted union of property keys, minus `exclude`.
pub(crate) fn property_keys<'r>(
    props: impl Iterator<Item = &'r PropertyMap>,
    exclude: &[&str],
) -> Vec<String> {
    let keys: BTreeSet<&str> = props
        .flat_map(|p| p.keys().map(String::as_str))
        .filter(|key| !exclude.contains(key))
        .collect();
    keys.into_iter().map(str::to_string).collect()
}

/// Fixed columns, then property keys. A key that collides with a fixed
/// column is written with a leading underscore.
pub(crate) fn header(fixed: &[&str], keys: &[String]) -> Vec<String> {
    fixed
        .iter()
        .map(|name| name.to_string())
        .chain(keys.iter().map(|key| {
            if fixed.contains(&key.as_str()) {
                format!("_{key}")
            } else {
                key.clone()
            }
        }))
        .collect()
}

fn push_cells(record: &mut Vec<String>, keys: &[String], props: &PropertyMap) -> Result<()> {
    for key in keys {
        match props.get(key) {
            Some(value) => record.push(value.to_cell()?),
            None => record.push(String::new()),
        }
    }
    Ok(())
}

pub(crate) fn write_vertices<W: Write>(
    writer: W,
    lines: &[VertexLine<'_>],
    id_property: &str,
    chunk: usize,
    sink: ChunkSink<'_>,
) -> Result<()> {
    let keys = property_keys(lines.iter().map(|l| l.properties), &[id_property]);
    let header = header(&VERTEX_COLUMNS, &keys);
    let mut out = WriterBuilder::new().from_writer(writer);
    out.write_record(&header)?;
    let mut record = Vec::with_capacity(header.len());
    for (batch, group) in batches(lines, chunk).enumerate() {
        for line in &group {
            record.clear();
            record.push(line.external_id.to_cell()?);
            push_cells(&mut record, &keys, line.properties)?;
            out.write_record(&record)?;
        }
        out.flush()?;
        sink(batch, group.len());
    }
    out.flush()?;
    Ok(())
}

pub(crate) fn write_edges<W: Write>(
    writer: W,
    lines: &[EdgeLine<'_>],
    chunk: usize,
    sink: ChunkSink<'_>,
) -> Result<()> {
    let keys = property_keys(lines.iter().map(|l| l.properties), &[]);
    let header = header(&EDGE_COLUMNS, &keys);
    let mut out = WriterBuilder::new().from_writer(writer);
    out.write_record(&header)?;
    let mut record = Vec::with_capacity(header.len());
    for (batch, group) in batches(lines, chunk).enumerate() {
        for line in &group {
            record.clear();
            record.push(line.start.external_id.to_cell()?);
            record.push(line.start.label.clone());
            record.push(line.end.external_id.to_cell()?);
            record.push(line.end.label.clone());
            push_cells(&mut record, &keys, line.properties)?;
            out.write_record(&record)?;
        }
        out.flush()?;
        sink(batch, group.len());
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::reverse::Endpoint;
    use crate::value::Value;

    fn props(entries: &[(&str, Value)]) -> PropertyMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn vertex_table_has_id_first_and_blank_gaps() {
        let john = props(&[("id", Value::Int(1)), ("name", Value::from("John")), ("age", Value::Int(30))]);
        let jane = props(&[("id", Value::Int(2)), ("name", Value::from("Jane"))]);
        let lines = vec![
            VertexLine {
                external_id: Value::Int(1),
                properties: &john,
            },
            VertexLine {
                external_id: Value::Int(2),
                properties: &jane,
            },
        ];
        let mut out = Vec::new();
        let mut chunks = Vec::new();
        write_vertices(&mut out, &lines, "id", 1, &mut |batch, n| chunks.push((batch, n))).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,age,name\n1,30,John\n2,,Jane\n"
        );
        assert_eq!(chunks, vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn edge_table_is_a_valid_sentinel_header() {
        let weight = props(&[("weight", Value::Float(0.5))]);
        let lines = vec![EdgeLine {
            start: Endpoint {
                label: "Person".into(),
                external_id: Value::from("1"),
            },
            end: Endpoint {
                label: "Person".into(),
                external_id: Value::from("2"),
            },
            properties: &weight,
        }];
        let mut out = Vec::new();
        write_edges(&mut out, &lines, 10, &mut |_, _| {}).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "start_id,start_vertex_type,end_id,end_vertex_type,weight\n1,Person,2,Person,0.5\n"
        );
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
        assert!(crate::import::split(&header).is_ok());
    }

    #[test]
    fn colliding_keys_are_prefixed() {
        let keys = vec!["id".to_string(), "name".to_string()];
        assert_eq!(header(&["id"], &keys), vec!["id", "_id", "name"]);
    }
}
