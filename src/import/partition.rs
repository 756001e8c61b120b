//! Sentinel-delimited edge headers.
//!
//! An edge file packs three schemas into one flat header:
//!
//! ```text
//! start_id, <start props>, start_vertex_type, end_id, <end props>, end_vertex_type, <edge props>
//! ```
//!
//! The first column of each endpoint zone carries that endpoint's external id.

use crate::types::{Result, TransferError};

/// Column holding the start vertex's label.
pub const START_SENTINEL: &str = "start_vertex_type";
/// Column holding the end vertex's label.
pub const END_SENTINEL: &str = "end_vertex_type";
/// Conventional name of the start zone's id column.
pub const START_ID: &str = "start_id";
/// Conventional name of the end zone's id column.
pub const END_ID: &str = "end_id";

/// Column zones of one edge header. Sentinels belong to no zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPartition {
    /// Columns before the start sentinel.
    pub start_props: Vec<String>,
    /// Columns between the sentinels.
    pub end_props: Vec<String>,
    /// Columns after the end sentinel.
    pub edge_props: Vec<String>,
    start_index: usize,
    end_index: usize,
    width: usize,
}

/// One data row cut along a [`SchemaPartition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSlice<'a> {
    /// Values of the start zone.
    pub start_values: &'a [&'a str],
    /// Values of the end zone.
    pub end_values: &'a [&'a str],
    /// Value of the start sentinel column.
    pub start_label: &'a str,
    /// Value of the end sentinel column.
    pub end_label: &'a str,
    /// Values of the edge zone.
    pub edge_values: &'a [&'a str],
}

/// Partitions an edge header around the two sentinels.
///
/// # Errors
///
/// [`TransferError::MalformedSchema`] when a sentinel is missing or repeated,
/// or when the end sentinel does not come after the start sentinel.
pub fn split<S: AsRef<str>>(header: &[S]) -> Result<SchemaPartition> {
    let start_index = sentinel_index(header, START_SENTINEL)?;
    let end_index = sentinel_index(header, END_SENTINEL)?;
    if start_index >= end_index {
        return Err(TransferError::malformed(
            "edge header",
            format!("'{END_SENTINEL}' must come after '{START_SENTINEL}'"),
        ));
    }
    let names = |range: std::ops::Range<usize>| -> Vec<String> {
        header[range]
            .iter()
            .map(|name| name.as_ref().trim().to_string())
            .collect()
    };
    Ok(SchemaPartition {
        start_props: names(0..start_index),
        end_props: names(start_index + 1..end_index),
        edge_props: names(end_index + 1..header.len()),
        start_index,
        end_index,
        width: header.len(),
    })
}

fn sentinel_index<S: AsRef<str>>(header: &[S], sentinel: &str) -> Result<usize> {
    let mut hits = header
        .iter()
        .enumerate()
        .filter(|(_, name)| name.as_ref().trim() == sentinel)
        .map(|(index, _)| index);
    match (hits.next(), hits.next()) {
        (Some(index), None) => Ok(index),
        (None, _) => Err(TransferError::malformed(
            "edge header",
            format!("missing '{sentinel}' column"),
        )),
        (Some(_), Some(_)) => Err(TransferError::malformed(
            "edge header",
            format!("'{sentinel}' appears more than once"),
        )),
    }
}

impl SchemaPartition {
    /// Number of columns in the header this partition was built from.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rejects partitions whose endpoint zones cannot carry an external id.
    pub fn require_endpoint_ids(&self) -> Result<()> {
        if self.start_props.is_empty() {
            return Err(TransferError::malformed(
                "edge header",
                format!("no start id column before '{START_SENTINEL}'"),
            ));
        }
        if self.end_props.is_empty() {
            return Err(TransferError::malformed(
                "edge header",
                format!("no end id column before '{END_SENTINEL}'"),
            ));
        }
        Ok(())
    }

    /// Cuts `row` into zones; `None` when its width differs from the header.
    pub fn slice_record<'a>(&self, row: &'a [&'a str]) -> Option<RecordSlice<'a>> {
        if row.len() != self.width {
            return None;
        }
        Some(RecordSlice {
            start_values: &row[..self.start_index],
            end_values: &row[self.start_index + 1..self.end_index],
            start_label: row[self.start_index],
            end_label: row[self.end_index],
            edge_values: &row[self.end_index + 1..],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_three_zones() {
        let header = ["a", "b", START_SENTINEL, "c", END_SENTINEL, "d", "e"];
        let partition = split(&header).unwrap();
        assert_eq!(partition.start_props, vec!["a", "b"]);
        assert_eq!(partition.end_props, vec!["c"]);
        assert_eq!(partition.edge_props, vec!["d", "e"]);
        assert_eq!(partition.width(), 7);
    }

    #[test]
    fn slices_rows_along_zones() {
        let header = [START_ID, START_SENTINEL, END_ID, END_SENTINEL, "weight"];
        let partition = split(&header).unwrap();
        let row = ["1", "Person", "2", "Person", "5"];
        let slice = partition.slice_record(&row).unwrap();
        assert_eq!(slice.start_values, &["1"]);
        assert_eq!(slice.start_label, "Person");
        assert_eq!(slice.end_values, &["2"]);
        assert_eq!(slice.end_label, "Person");
        assert_eq!(slice.edge_values, &["5"]);
        assert!(partition.slice_record(&row[..4]).is_none());
    }

    #[test]
    fn rejects_bad_sentinels() {
        let missing = ["a", START_SENTINEL, "b"];
        assert!(matches!(split(&missing), Err(TransferError::MalformedSchema { .. })));
        let reversed = [END_SENTINEL, "a", START_SENTINEL];
        assert!(matches!(split(&reversed), Err(TransferError::MalformedSchema { .. })));
        let repeated = [START_SENTINEL, START_SENTINEL, END_SENTINEL];
        assert!(matches!(split(&repeated), Err(TransferError::MalformedSchema { .. })));
    }

    #[test]
    fn empty_endpoint_zone_has_no_id_column() {
        let partition = split(&[START_SENTINEL, "end_id", END_SENTINEL]).unwrap();
        assert!(partition.start_props.is_empty());
        assert!(partition.require_endpoint_ids().is_err());
    }
}
