#![forbid(unsafe_code)]

//! Identifier and error types shared by the import and export engines.

use std::fmt;

use serde::{Deserialize, Serialize};

mod error;
mod graphid;

/// Engine error type and its scope classification.
pub use error::{ErrorScope, Result, TransferError};

/// Composite identifier encoding and per-label sequence allocation.
pub use graphid::{decode, encode, GraphId, LabelId, SequenceAllocator, SEQ_BITS, SEQ_MASK};

/// Kind of entity a label partitions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    /// Vertex label.
    Vertex,
    /// Edge label.
    Edge,
}

impl LabelKind {
    /// Stable lowercase tag used in catalogs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            LabelKind::Vertex => "vertex",
            LabelKind::Edge => "edge",
        }
    }

    /// Parses a tag produced by [`LabelKind::as_str`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "vertex" => Some(LabelKind::Vertex),
            "edge" => Some(LabelKind::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of an edge an endpoint belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSide {
    /// The edge's start vertex.
    Start,
    /// The edge's end vertex.
    End,
}

impl fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointSide::Start => f.write_str("start"),
            EndpointSide::End => f.write_str("end"),
        }
    }
}
