//! Error types for the step pipeline.
//!
//! There is no local recovery for corrupted tree state or mismatched
//! reductions: a partial gravity tree invalidates every force in the step,
//! so those conditions are fatal and abort the run. Degenerate-but-valid
//! inputs (zero groups, uniform dt, boundary clamping) are handled by
//! clamping to trivial states and never produce an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("domain sync failed: {0}")]
    DomainSync(String),

    #[error("gravity produced a non-finite total energy; tree state is corrupt")]
    CorruptForces,

    #[error("partition owns no particles")]
    EmptyPartition,

    #[error("traverse called before upsweep for this step")]
    TraverseBeforeUpsweep,

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StepError>;
