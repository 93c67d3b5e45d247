//! Error taxonomy for the DTM engine.

use thiserror::Error;

use crate::dtm::DtmState;
use crate::feature::FeatureId;

/// Top-level error type for the DTM engine.
///
/// Expected conditions ("wrong state", "feature not found") are ordinary
/// error values; only [`DtmError::Consistency`] signals a bug in the engine
/// itself rather than a misuse by the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DtmError {
    /// Operation attempted in a state that forbids it.
    #[error("operation requires state {required:?}, model is in {state:?}")]
    InvalidState {
        state: DtmState,
        required: &'static str,
    },

    /// Allocation failure; fatal to the in-flight operation, which leaves the
    /// model in its pre-operation state.
    #[error("out of memory while {0}")]
    OutOfMemory(&'static str),

    /// Degenerate or contradictory input geometry.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The external triangulator failed; the model is left in `TinError`.
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    /// The cooperative termination flag was observed set.
    #[error("operation cancelled")]
    Cancelled,

    /// No live feature with the given id exists.
    #[error("feature {0:?} not found")]
    FeatureNotFound(FeatureId),

    /// A point reference fell outside the point table.
    #[error("point index {index} out of range for table of {len}")]
    IndexRange { index: usize, len: usize },

    /// Internal invariant violation. Always a programming-error-class failure.
    #[error("internal consistency violation: {0}")]
    Consistency(&'static str),
}

/// Convenience alias for results using [`DtmError`].
pub type Result<T> = std::result::Result<T, DtmError>;
