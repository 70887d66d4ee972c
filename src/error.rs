use std::ops::Range;

/// Errors surfaced across the crate boundary.
///
/// `OutOfBounds` access (slicing/indexing past the end of a buffer) is
/// deliberately not a variant here: it is defined, non-panicking behavior
/// (`None`/empty-slice plus a logged warning), not an exceptional condition.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("parse did not cover the buffer: consumed {consumed} code units")]
    IncompleteParse { consumed: u32 },

    #[error("attribute arrays have unequal length: expected {expected}, found {found}")]
    AmbiguousLength { expected: u32, found: u32 },

    #[error("replacement overlaps an existing entry at {raw_range:?}")]
    OverlappingReplacement { raw_range: Range<u32> },
}

pub type Result<T> = std::result::Result<T, Error>;
