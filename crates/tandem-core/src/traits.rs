//! Collaborator traits: solution store, mesh generator, geometry checker.
//!
//! The orchestrator owns one boxed implementation of each and calls them
//! only from the solving thread, so none of these traits require `Send`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, StoreError};
use crate::id::{BlockId, FieldId};
use crate::solution::{AdaptivityState, SolutionId, SolutionMode, SolutionRecord};

/// Persistent store of solution metadata.
///
/// Keys are `(block, time step, adapt step, mode)`. Implementations must
/// make every mutation durable before returning: a solve that fails
/// halfway leaves whatever was recorded so far in place.
pub trait SolutionStore {
    /// Record (or replace) a solution.
    fn record(&mut self, record: SolutionRecord) -> Result<(), StoreError>;

    /// Highest time step with a solution of `field` in `mode`.
    fn last_time_step(&self, field: FieldId, mode: SolutionMode) -> Option<usize>;

    /// Highest adapt step of `block` at `time_step` in `mode`.
    fn last_adaptive_step(
        &self,
        block: BlockId,
        mode: SolutionMode,
        time_step: usize,
    ) -> Option<usize>;

    /// Latest simulation time at which `block` was solved.
    fn last_time(&self, block: BlockId) -> Option<f64>;

    /// Drop every solution of a time step.
    fn remove_time_step(&mut self, time_step: usize) -> Result<(), StoreError>;

    /// Drop one solution. Missing keys are not an error.
    fn remove_solution(&mut self, id: &SolutionId) -> Result<(), StoreError>;

    /// Drop everything.
    fn clear_all(&mut self) -> Result<(), StoreError>;

    /// Reload persisted metadata, e.g. after a restart.
    fn load_run_time_details(&mut self) -> Result<(), StoreError>;

    /// Point the store at the run-time metadata file of another session.
    ///
    /// Called by the orchestrator whenever its session cache moves. A
    /// store that changes file forgets its in-memory index; nothing on
    /// disk is touched. Stores without a backing file ignore this.
    fn relocate(&mut self, _runtime: &Path) {}

    /// Both last adapt steps of `block` at `time_step`.
    fn adaptivity_state(&self, block: BlockId, time_step: usize) -> AdaptivityState {
        AdaptivityState {
            last_normal: self.last_adaptive_step(block, SolutionMode::Normal, time_step),
            last_reference: self.last_adaptive_step(block, SolutionMode::Reference, time_step),
        }
    }
}

/// Boundary information read back from a generated mesh.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSummary {
    /// Node count.
    pub nodes: usize,
    /// Element count.
    pub elements: usize,
    /// Geometric edge index of every boundary element.
    pub boundary_markers: Vec<usize>,
}

/// External mesh generator.
pub trait MeshGenerator {
    /// Generate a mesh and write its [`MeshSummary`] as JSON to `path`.
    ///
    /// Returns `false` if meshing failed.
    fn generate(&mut self, path: &Path) -> bool;
}

/// External geometry validator.
pub trait GeometryChecker {
    /// Validate the geometry itself.
    fn check_geometry_result(&self) -> Result<(), GeometryError>;

    /// `true` if every geometric entity has a material or boundary.
    fn check_geometry_assignment(&self) -> bool;

    /// Number of geometric edges.
    fn edge_count(&self) -> usize;

    /// Whether `edge` carries a boundary condition for `field`.
    fn boundary_assigned(&self, field: FieldId, edge: usize) -> bool;
}
