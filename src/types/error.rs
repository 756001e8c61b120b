use crate::storage::StoreError;
use crate::value::CodecError;
use thiserror::Error;

use super::graphid::LabelId;
use super::EndpointSide;

/// How far an error reaches during a run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorScope {
    /// Only the offending record is lost; loading continues.
    Record,
    /// The current file stops; sibling files are still processed.
    File,
    /// The whole run stops.
    Run,
}

/// Error type for import and export operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Header or document layout does not follow the file convention.
    #[error("malformed schema in {context}: {reason}")]
    MalformedSchema {
        /// File or label the schema belongs to.
        context: String,
        /// What is wrong with it.
        reason: String,
    },
    /// An edge references an external id missing from its label's id table.
    #[error("unresolved {side} endpoint: no '{label}' vertex with id '{external_id}'")]
    UnresolvedEndpoint {
        /// Which endpoint failed.
        side: EndpointSide,
        /// Claimed endpoint label.
        label: String,
        /// External id that could not be resolved.
        external_id: String,
    },
    /// An edge references a vertex label that was never loaded in this run.
    #[error("endpoint label '{label}' has not been loaded")]
    EndpointLabelNotLoaded {
        /// The missing vertex label.
        label: String,
    },
    /// A label does not exist and label creation is disabled.
    #[error("label '{0}' does not exist")]
    UnknownLabel(String),
    /// A label's sequence space is exhausted.
    #[error("sequence {sequence} is outside the identifier range of label {label}")]
    Range {
        /// Label whose counter overflowed.
        label: LabelId,
        /// Sequence that did not fit.
        sequence: u64,
    },
    /// A property value could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A batch round-trip to the store failed; the batch can be retried.
    #[error("store round-trip failed for label '{label}' batch {batch}: {source}")]
    Store {
        /// Label the batch belongs to.
        label: String,
        /// Zero-based batch index within the label.
        batch: usize,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
    /// Store failure outside of a batch round-trip.
    #[error(transparent)]
    Storage(#[from] StoreError),
    /// A single input record is unusable.
    #[error("record {record}: {reason}")]
    Record {
        /// One-based record number within its file.
        record: usize,
        /// What is wrong with it.
        reason: String,
    },
    /// The run was cancelled between batches.
    #[error("run cancelled before batch {batch} of label '{label}'")]
    Cancelled {
        /// Label being loaded when the run stopped.
        label: String,
        /// Batch that was not submitted.
        batch: usize,
    },
    /// Run phases were driven out of order.
    #[error("cannot {action} while the run is in state {state}")]
    InvalidState {
        /// Attempted operation.
        action: &'static str,
        /// State the run was in.
        state: &'static str,
    },
    /// I/O error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing or writing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// JSON parsing or writing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Generic error message.
    #[error("{0}")]
    Message(String),
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

impl TransferError {
    /// Classifies how much of a run this error invalidates.
    pub fn scope(&self) -> ErrorScope {
        match self {
            TransferError::UnresolvedEndpoint { .. }
            | TransferError::Codec(_)
            | TransferError::Record { .. } => ErrorScope::Record,
            TransferError::Range { .. }
            | TransferError::Cancelled { .. }
            | TransferError::InvalidState { .. } => ErrorScope::Run,
            _ => ErrorScope::File,
        }
    }

    pub(crate) fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        TransferError::MalformedSchema {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn record(record: usize, reason: impl Into<String>) -> Self {
        TransferError::Record {
            record,
            reason: reason.into(),
        }
    }
}

impl From<&str> for TransferError {
    fn from(value: &str) -> Self {
        TransferError::Message(value.to_string())
    }
}

impl From<String> for TransferError {
    fn from(value: String) -> Self {
        TransferError::Message(value)
    }
}
