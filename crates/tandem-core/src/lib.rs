//! Core types and traits for the Tandem coupled-solve orchestrator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared across the workspace: identifiers, field and
//! coupling descriptors, the field registry with its batch-update scope,
//! solution identifiers, error types, and the traits through which the
//! orchestrator talks to its external collaborators.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod coupling;
pub mod error;
pub mod field;
pub mod id;
pub mod registry;
pub mod solution;
pub mod traits;

pub use coupling::{CouplingDescriptor, CouplingRegistry, CouplingRule, CouplingStrength};
pub use error::{
    CouplingError, FieldError, GeometryError, MeshError, SolverEngineError, StoreError,
};
pub use field::{
    AdaptivityType, AnalysisType, FieldDescriptor, FieldKind, FieldSet, FieldSetIter,
    LinearityType,
};
pub use id::{BlockId, FieldId};
pub use registry::{BatchUpdate, FieldRegistry, RegistryEvent};
pub use solution::{
    AdaptivityState, NextStepProposal, ResumePoint, SolutionId, SolutionIndex, SolutionMode,
    SolutionRecord,
};
pub use traits::{GeometryChecker, MeshGenerator, MeshSummary, SolutionStore};
