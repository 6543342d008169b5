use crate::datablock::FieldRef;
use crate::id::{DataBlockId, IdKind};

/// Errors surfaced by the registry, the edge pool and the relation index.
///
/// Broken invariants (an entry whose stamp disagrees with the block it is
/// keyed by) are not represented here: they panic.
#[derive(Debug, thiserror::Error)]
pub enum MainError {
    /// The edge pool (or the entry map) could not grow. The relation index that
    /// was being built is left unbuilt.
    #[error("resource exhausted while allocating {what} ({requested} more items)")]
    ResourceExhausted {
        what: &'static str,
        requested: usize,
        #[source]
        source: std::collections::TryReserveError,
    },

    /// More records than a 32-bit handle can address.
    #[error("{what} exceeded the addressable capacity of {limit} items")]
    CapacityOverflow { what: &'static str, limit: u64 },

    #[error("unknown data block {0}")]
    UnknownDataBlock(DataBlockId),

    #[error("{kind} blocks have no reference field named `{name}`")]
    UnknownField { kind: IdKind, name: String },

    #[error("field path {field} does not address a reference slot")]
    InvalidFieldPath { field: FieldRef },

    #[error("field {field} cannot point at a {actual} block")]
    FieldTargetKind { field: FieldRef, actual: IdKind },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MainError>;
