//! Typed error kinds for the core. `NumericDegenerate` is deliberately not a
//! variant here: it is recovered locally inside the traverser's
//! weighting helpers and never escapes as a `Result::Err`. `BudgetExhausted` is
//! likewise not an error — see `GenerationReport::budget_exhausted`.

use crate::path::SegmentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IsomerError {
    #[error("segment {0:?} is not present in the graph")]
    UnknownSegment(SegmentId),

    #[error("coverage statistics requested on an empty walk")]
    EmptyPath,

    #[error("exclusion count for segment {segment:?} ({excluded}) exceeds its count in the walk ({available})")]
    CoverageExclusionInvalid {
        segment: SegmentId,
        excluded: usize,
        available: usize,
    },

    #[error("failed to parse GFA file: {0}")]
    GfaParse(String),

    #[error("failed to parse GAF line {line}: {reason}")]
    GafParse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IsomerError>;
