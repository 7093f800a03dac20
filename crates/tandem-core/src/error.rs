//! Error types shared across the workspace.
//!
//! Each collaborator boundary has its own enum: [`FieldError`] and
//! [`CouplingError`] for registry edits, [`SolverEngineError`] for the
//! numerical engine, [`StoreError`] for solution persistence, and
//! [`GeometryError`] / [`MeshError`] for the pre-solve checks.

use std::path::PathBuf;

use crate::field::{AnalysisType, FieldKind};
use crate::id::FieldId;
use crate::CouplingStrength;

/// A field descriptor carries settings the engine cannot honor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// Field name is empty or whitespace.
    #[error("field name must not be empty")]
    EmptyName,

    /// The kind cannot be solved with the requested analysis type.
    #[error("field '{field}': {kind} does not support {analysis:?} analysis")]
    UnsupportedAnalysis {
        /// Field name.
        field: String,
        /// Field kind.
        kind: FieldKind,
        /// Rejected analysis type.
        analysis: AnalysisType,
    },

    /// Polynomial order outside `1..=MAX_POLYNOMIAL_ORDER`.
    #[error("field '{field}': polynomial order {order} out of range")]
    PolynomialOrder {
        /// Field name.
        field: String,
        /// Rejected order.
        order: u32,
    },

    /// Time skip is negative or not finite.
    #[error("field '{field}': time skip must be finite and non-negative, got {value}")]
    InvalidTimeSkip {
        /// Field name.
        field: String,
        /// Rejected value.
        value: f64,
    },

    /// Adaptivity requested on a kind that does not support it.
    #[error("field '{field}': {kind} does not support space adaptivity")]
    UnsupportedAdaptivity {
        /// Field name.
        field: String,
        /// Field kind.
        kind: FieldKind,
    },

    /// Adaptivity enabled with a zero step bound.
    #[error("field '{field}': adaptivity enabled with zero steps")]
    ZeroAdaptivitySteps {
        /// Field name.
        field: String,
    },

    /// No field with this ID is registered.
    #[error("unknown field {0}")]
    UnknownField(FieldId),
}

/// A coupling edit was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CouplingError {
    /// No rule couples these two kinds.
    #[error("no coupling rule from {source_kind} to {target_kind}")]
    NoRule {
        /// Source kind.
        source_kind: FieldKind,
        /// Target kind.
        target_kind: FieldKind,
    },

    /// The rule exists but forbids the requested strength.
    #[error("{source_kind} -> {target_kind} coupling cannot be {strength:?}")]
    StrengthNotAllowed {
        /// Source kind.
        source_kind: FieldKind,
        /// Target kind.
        target_kind: FieldKind,
        /// Rejected strength.
        strength: CouplingStrength,
    },

    /// No coupling currently links these fields.
    #[error("no coupling from field {source_field} to field {target_field}")]
    UnknownCoupling {
        /// Source field.
        source_field: FieldId,
        /// Target field.
        target_field: FieldId,
    },
}

/// Raised by the finite-element engine during a dispatched solve.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverEngineError {
    /// Matrix or vector assembly failed.
    #[error("assembly failed: {0}")]
    Assembly(String),

    /// The linear solver did not converge.
    #[error("linear solve failed: {0}")]
    LinearSolve(String),

    /// The nonlinear iteration diverged or ran out of iterations.
    #[error("nonlinear iteration did not converge after {iterations} iterations")]
    NonlinearDivergence {
        /// Iterations performed.
        iterations: u32,
    },

    /// Space refinement or projection failed.
    #[error("space adaptivity failed: {0}")]
    Adaptivity(String),

    /// The time-step error estimator failed.
    #[error("time step estimation failed: {0}")]
    Estimator(String),

    /// Anything else the engine reports.
    #[error("{0}")]
    Other(String),
}

/// Solution persistence failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Geometry validation failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// The geometry checker rejected the geometry.
    #[error("invalid geometry: {reason}")]
    Invalid {
        /// Checker's explanation.
        reason: String,
    },

    /// Some geometric entity has no material or boundary assigned.
    #[error("geometry has unassigned materials or boundaries")]
    Unassigned,
}

/// Mesh generation or verification failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// The mesh generator reported failure.
    #[error("mesh generation failed")]
    GenerationFailed,

    /// The generated mesh could not be read back.
    #[error("cannot read mesh '{}': {reason}", path.display())]
    ReadFailed {
        /// Mesh path.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// A boundary element references a geometric edge that does not exist.
    #[error("boundary marker {marker} is out of range (geometry has {edges} edges)")]
    MarkerOutOfRange {
        /// Offending marker.
        marker: usize,
        /// Number of geometric edges.
        edges: usize,
    },

    /// Boundary edges of the mesh have no boundary condition for a field.
    #[error("field '{field}': boundary edges {edges:?} have no boundary marker")]
    MissingBoundaryMarker {
        /// Field name.
        field: String,
        /// Unassigned edge indices, ascending.
        edges: Vec<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field() {
        let e = FieldError::ZeroAdaptivitySteps {
            field: "T".into(),
        };
        assert!(e.to_string().contains("'T'"));

        let e = MeshError::MissingBoundaryMarker {
            field: "V".into(),
            edges: vec![1, 4],
        };
        assert_eq!(
            e.to_string(),
            "field 'V': boundary edges [1, 4] have no boundary marker"
        );
    }

    #[test]
    fn io_error_converts_into_store_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: StoreError = io.into();
        assert!(matches!(e, StoreError::Io(_)));
    }
}
