//! Tandem: coupled multi-field solve orchestration.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tandem sub-crates. For most users, adding `tandem` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::path::Path;
//! use tandem::prelude::*;
//!
//! // An engine that solves everything in one shot.
//! struct Direct;
//! impl BlockSolver for Direct {
//!     fn solve_initial_time_step(&mut self) -> Result<(), SolverEngineError> { Ok(()) }
//!     fn solve_simple(&mut self, _: usize, _: usize) -> Result<(), SolverEngineError> { Ok(()) }
//!     fn solve_reference_and_project(&mut self, _: usize, _: usize) -> Result<(), SolverEngineError> { Ok(()) }
//!     fn create_adapted_space(&mut self, _: usize, _: usize, _: bool) -> Result<bool, SolverEngineError> { Ok(false) }
//!     fn estimate_time_step_length(&mut self, _: usize, _: usize) -> Result<NextStepProposal, SolverEngineError> {
//!         Ok(NextStepProposal::accept(0.25))
//!     }
//! }
//! struct Engine;
//! impl SolverFactory for Engine {
//!     fn prepare(&mut self, _: &Block) -> Result<Box<dyn BlockSolver>, SolverEngineError> {
//!         Ok(Box::new(Direct))
//!     }
//! }
//!
//! // A two-edge geometry with boundary conditions everywhere.
//! struct Mesher;
//! impl MeshGenerator for Mesher {
//!     fn generate(&mut self, path: &Path) -> bool {
//!         std::fs::write(path, r#"{"nodes":4,"elements":2,"boundary_markers":[0,1]}"#).is_ok()
//!     }
//! }
//! struct Geometry;
//! impl GeometryChecker for Geometry {
//!     fn check_geometry_result(&self) -> Result<(), GeometryError> { Ok(()) }
//!     fn check_geometry_assignment(&self) -> bool { true }
//!     fn edge_count(&self) -> usize { 2 }
//!     fn boundary_assigned(&self, _: FieldId, _: usize) -> bool { true }
//! }
//!
//! let cache = tempfile::tempdir().unwrap();
//! let mut problem = Problem::new(ProblemConfig {
//!     total_time: 1.0,
//!     initial_time_step: 0.25,
//!     cache_dir: cache.path().to_path_buf(),
//!     ..Default::default()
//! })
//! .unwrap();
//! problem.add_field(FieldDescriptor::new("J", FieldKind::Current)).unwrap();
//! problem
//!     .add_field(FieldDescriptor::new("T", FieldKind::Heat).with_analysis(AnalysisType::Transient))
//!     .unwrap();
//!
//! let store = JsonSolutionStore::new(cache.path().join("runtime.json"));
//! let mut solver = SolveOrchestrator::new(
//!     problem,
//!     Collaborators {
//!         solvers: Box::new(Engine),
//!         mesher: Box::new(Mesher),
//!         geometry: Box::new(Geometry),
//!         store: Box::new(store),
//!     },
//! );
//! match solver.solve(SolveMode::Full).unwrap() {
//!     SolveOutcome::Completed(report) => {
//!         assert_eq!(report.blocks, 2);
//!         assert_eq!(report.time_steps, 4);
//!     }
//!     SolveOutcome::AlreadySolving => unreachable!(),
//! }
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tandem-core` | IDs, field descriptors, couplings, registries, collaborator traits |
//! | [`block`] | `tandem-block` | Block structure building and the block solver interface |
//! | [`engine`] | `tandem-engine` | Problem model, time stepping, adaptivity, the orchestrator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`tandem-core`).
///
/// Contains field descriptors, the coupling registry, the batched field
/// registry, solution bookkeeping, and the collaborator traits
/// ([`types::SolutionStore`], [`types::MeshGenerator`],
/// [`types::GeometryChecker`]).
pub use tandem_core as types;

/// Block structure (`tandem-block`).
///
/// [`block::build_blocks`] partitions fields into jointly solved blocks;
/// [`block::BlockSolver`] is the per-block entry point into the
/// finite-element engine.
pub use tandem_block as block;

/// Solve orchestration (`tandem-engine`).
///
/// [`engine::SolveOrchestrator`] drives a [`engine::Problem`] through
/// time stepping and adaptivity.
pub use tandem_engine as engine;

/// Common imports for typical Tandem usage.
///
/// ```rust
/// use tandem::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tandem_core::{
        AdaptivityType, AnalysisType, CouplingStrength, FieldDescriptor, FieldId, FieldKind,
        LinearityType, NextStepProposal,
    };

    // Collaborator traits
    pub use tandem_core::{GeometryChecker, MeshGenerator, SolutionStore};

    // Errors
    pub use tandem_core::{FieldError, GeometryError, MeshError, SolverEngineError};

    // Blocks
    pub use tandem_block::{Block, BlockSolver, SolverFactory};

    // Engine
    pub use tandem_engine::{
        Collaborators, ConfigError, JsonSolutionStore, Problem, ProblemConfig, SolveError,
        SolveMode, SolveOrchestrator, SolveOutcome, SolveReport, TimeStepMethod,
    };
}
