//! Typed errors for the core remapping pipeline.
//!
//! `spec.md` §7 splits failures into ones that are fatal for a single
//! alignment (skip it and continue) and ones that are fatal for the whole
//! run (abort). [`RemapError::is_fatal_to_run`] carries that classification
//! so the driver never has to pattern-match variant names directly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemapError {
    /// A position lies outside the mapped range: underflow, overflow, or a
    /// reference position beyond the chromosome length.
    #[error("position {pos} out of bounds: {reason}")]
    BoundsError { pos: i64, reason: String },

    /// A read offset fell inside a `D` or `N` alignment operation.
    #[error("position {pos} falls inside a deletion or skip")]
    PositionInGap { pos: i64 },

    /// The CIGAR's implied query length disagrees with the stored query length.
    #[error("cigar implies query length {implied} but record reports {recorded}")]
    CigarMismatch { implied: usize, recorded: usize },

    /// Translocation, duplication, or inversion detected.
    #[error("unsupported structural alignment: {reason}")]
    Unsupported { reason: String },

    /// Unknown variant kind, or unsorted positions, in the variant table.
    #[error("malformed variant data: {0}")]
    MalformedVariant(String),
}

impl RemapError {
    /// Table-level errors (a broken MOD file) abort the whole run; everything
    /// else is scoped to the offending alignment and may be skipped in
    /// lenient mode.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, RemapError::MalformedVariant(_))
    }
}

pub type Result<T> = std::result::Result<T, RemapError>;
