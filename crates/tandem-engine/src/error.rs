//! The terminal error of a solve invocation.

use tandem_block::BlockError;
use tandem_core::{GeometryError, MeshError, SolverEngineError, StoreError};

use crate::config::ConfigError;
use crate::time_step::TimeStepError;

/// Why a solve stopped.
///
/// Exactly one of these is reported per failed
/// [`solve`](crate::SolveOrchestrator::solve). Refused time steps are
/// retried internally and never surface here unless the retry cap is hit.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// Illegal configuration or feature combination.
    #[error("configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// Geometry check failed.
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),

    /// Mesh generation or boundary verification failed.
    #[error("mesh: {0}")]
    Mesh(#[from] MeshError),

    /// The block structure could not be built.
    #[error("structure: {0}")]
    Structure(#[from] BlockError),

    /// The finite-element engine failed inside a block.
    #[error("solver engine failed in block '{block}': {source}")]
    Engine {
        /// Label of the failing block.
        block: String,
        /// Engine error.
        source: SolverEngineError,
    },

    /// Solution metadata could not be persisted.
    #[error("solution store: {0}")]
    Store(#[from] StoreError),

    /// The time-step state machine gave up.
    #[error("time stepping: {0}")]
    TimeStep(#[from] TimeStepError),
}
