//! Test doubles and fixtures for Tandem development.
//!
//! Provides scripted implementations of the collaborator traits
//! ([`SolverFactory`], [`SolutionStore`], [`MeshGenerator`],
//! [`GeometryChecker`]) that journal every call, so tests can assert on
//! the exact sequence of engine operations a solve produced.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tandem_block::{Block, BlockSolver, SolverFactory};
use tandem_core::{
    BlockId, FieldId, GeometryChecker, GeometryError, MeshGenerator, MeshSummary,
    NextStepProposal, SolutionId, SolutionIndex, SolutionMode, SolutionRecord, SolutionStore,
    SolverEngineError, StoreError,
};

// ── EngineCall ─────────────────────────────────────────────────────

/// One call into a scripted block solver.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    CreateInitialSpace {
        block: BlockId,
        time_step: usize,
    },
    SolveInitial {
        block: BlockId,
    },
    SolveSimple {
        block: BlockId,
        time_step: usize,
        adapt_step: usize,
    },
    SolveReference {
        block: BlockId,
        time_step: usize,
        adapt_step: usize,
    },
    CreateAdaptedSpace {
        block: BlockId,
        time_step: usize,
        adapt_step: usize,
        force: bool,
    },
    Estimate {
        block: BlockId,
        time_step: usize,
    },
    Resume {
        block: BlockId,
        adapt_step: usize,
    },
}

/// Kind of [`EngineCall`], used to inject failures and count calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    CreateInitialSpace,
    SolveInitial,
    SolveSimple,
    SolveReference,
    CreateAdaptedSpace,
    Estimate,
    Resume,
}

impl EngineCall {
    pub fn operation(&self) -> Operation {
        match self {
            EngineCall::CreateInitialSpace { .. } => Operation::CreateInitialSpace,
            EngineCall::SolveInitial { .. } => Operation::SolveInitial,
            EngineCall::SolveSimple { .. } => Operation::SolveSimple,
            EngineCall::SolveReference { .. } => Operation::SolveReference,
            EngineCall::CreateAdaptedSpace { .. } => Operation::CreateAdaptedSpace,
            EngineCall::Estimate { .. } => Operation::Estimate,
            EngineCall::Resume { .. } => Operation::Resume,
        }
    }
}

// ── Script ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    step_length: Option<f64>,
    refusals: Vec<(usize, f64)>,
    refine_until: usize,
    failure: Option<(Operation, usize)>,
    calls: Mutex<Vec<EngineCall>>,
    estimates: AtomicUsize,
    prepared: AtomicUsize,
}

impl Script {
    fn calls(&self) -> MutexGuard<'_, Vec<EngineCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Journal `call`; fail if it is the scripted n-th call of its kind.
    fn log(&self, call: EngineCall) -> Result<(), SolverEngineError> {
        let op = call.operation();
        let mut calls = self.calls();
        calls.push(call);
        if let Some((fail_op, nth)) = self.failure {
            if fail_op == op && calls.iter().filter(|c| c.operation() == op).count() == nth {
                return Err(SolverEngineError::Other(format!("scripted failure in {op:?}")));
            }
        }
        Ok(())
    }
}

/// Shared view of a [`ScriptedSolverFactory`]'s call journal.
///
/// Clone it before handing the factory to the orchestrator.
#[derive(Clone)]
pub struct Journal(Arc<Script>);

impl Journal {
    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.calls().clone()
    }

    /// Number of calls of kind `op`.
    pub fn count(&self, op: Operation) -> usize {
        self.0.calls().iter().filter(|c| c.operation() == op).count()
    }

    /// Number of solvers prepared.
    pub fn prepared(&self) -> usize {
        self.0.prepared.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.0.calls().is_empty()
    }
}

/// [`SolverFactory`] whose solvers follow a fixed script.
///
/// By default every solve succeeds, estimators accept and propose
/// `step_length` (or 1.0), and refinement stops immediately.
#[derive(Default)]
pub struct ScriptedSolverFactory {
    script: Script,
}

impl ScriptedSolverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length proposed by every accepting estimate.
    pub fn with_step_length(mut self, length: f64) -> Self {
        self.script.step_length = Some(length);
        self
    }

    /// Make the `nth` estimate call (1-based, across all blocks) refuse
    /// and propose `length`.
    pub fn refuse_estimate(mut self, nth: usize, length: f64) -> Self {
        self.script.refusals.push((nth, length));
        self
    }

    /// `create_adapted_space` keeps asking for refinement while
    /// `adapt_step < steps`.
    pub fn refine_until(mut self, steps: usize) -> Self {
        self.script.refine_until = steps;
        self
    }

    /// Fail the `nth` call (1-based) of kind `op`.
    pub fn fail_on(mut self, op: Operation, nth: usize) -> Self {
        self.script.failure = Some((op, nth));
        self
    }

    /// Finish scripting and return the factory with its journal.
    pub fn build(self) -> (Box<dyn SolverFactory>, Journal) {
        let script = Arc::new(self.script);
        (
            Box::new(SharedFactory(Arc::clone(&script))),
            Journal(script),
        )
    }
}

struct SharedFactory(Arc<Script>);

impl SolverFactory for SharedFactory {
    fn prepare(&mut self, block: &Block) -> Result<Box<dyn BlockSolver>, SolverEngineError> {
        self.0.prepared.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(ScriptedSolver {
            block: block.id(),
            script: Arc::clone(&self.0),
        }))
    }
}

/// Block solver produced by [`ScriptedSolverFactory`].
pub struct ScriptedSolver {
    block: BlockId,
    script: Arc<Script>,
}

impl BlockSolver for ScriptedSolver {
    fn create_initial_space(&mut self, time_step: usize) -> Result<(), SolverEngineError> {
        self.script.log(EngineCall::CreateInitialSpace {
            block: self.block,
            time_step,
        })
    }

    fn solve_initial_time_step(&mut self) -> Result<(), SolverEngineError> {
        self.script
            .log(EngineCall::SolveInitial { block: self.block })
    }

    fn solve_simple(&mut self, time_step: usize, adapt_step: usize) -> Result<(), SolverEngineError> {
        self.script.log(EngineCall::SolveSimple {
            block: self.block,
            time_step,
            adapt_step,
        })
    }

    fn solve_reference_and_project(
        &mut self,
        time_step: usize,
        adapt_step: usize,
    ) -> Result<(), SolverEngineError> {
        self.script.log(EngineCall::SolveReference {
            block: self.block,
            time_step,
            adapt_step,
        })
    }

    fn create_adapted_space(
        &mut self,
        time_step: usize,
        adapt_step: usize,
        force: bool,
    ) -> Result<bool, SolverEngineError> {
        self.script.log(EngineCall::CreateAdaptedSpace {
            block: self.block,
            time_step,
            adapt_step,
            force,
        })?;
        Ok(adapt_step < self.script.refine_until)
    }

    fn estimate_time_step_length(
        &mut self,
        time_step: usize,
        _adapt_step: usize,
    ) -> Result<NextStepProposal, SolverEngineError> {
        self.script.log(EngineCall::Estimate {
            block: self.block,
            time_step,
        })?;
        let nth = self.script.estimates.fetch_add(1, Ordering::Relaxed) + 1;
        let refused = self
            .script
            .refusals
            .iter()
            .find(|(n, _)| *n == nth)
            .map(|(_, len)| *len);
        Ok(match refused {
            Some(len) => NextStepProposal::refuse(len),
            None => NextStepProposal::accept(self.script.step_length.unwrap_or(1.0)),
        })
    }

    fn resume_adaptivity_process(&mut self, adapt_step: usize) -> Result<(), SolverEngineError> {
        self.script.log(EngineCall::Resume {
            block: self.block,
            adapt_step,
        })
    }
}

// ── MemorySolutionStore ────────────────────────────────────────────

/// In-memory [`SolutionStore`] over a [`SolutionIndex`].
///
/// The index is shared so tests can inspect it after the store has been
/// boxed into the orchestrator.
#[derive(Clone, Default)]
pub struct MemorySolutionStore {
    index: Arc<Mutex<SolutionIndex>>,
    reloads: Arc<AtomicUsize>,
}

impl MemorySolutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SolutionIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pre-populate a record, as if a previous run had saved it.
    pub fn with_record(self, record: SolutionRecord) -> Self {
        self.lock().insert(record);
        self
    }

    /// Pre-populate a normal and reference pair for every adapt step up
    /// to and including `last_reference`.
    pub fn with_adaptive_history(
        self,
        block: BlockId,
        fields: &[FieldId],
        time_step: usize,
        last_reference: usize,
    ) -> Self {
        for k in 0..=last_reference {
            for id in [
                SolutionId::normal(block, time_step, k),
                SolutionId::reference(block, time_step, k),
            ] {
                self.lock().insert(SolutionRecord {
                    id,
                    fields: fields.to_vec(),
                    time: 0.0,
                });
            }
        }
        self
    }

    /// Copy of the current index.
    pub fn snapshot(&self) -> SolutionIndex {
        self.lock().clone()
    }

    /// Number of `load_run_time_details` calls.
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::Relaxed)
    }
}

impl SolutionStore for MemorySolutionStore {
    fn record(&mut self, record: SolutionRecord) -> Result<(), StoreError> {
        self.lock().insert(record);
        Ok(())
    }

    fn last_time_step(&self, field: FieldId, mode: SolutionMode) -> Option<usize> {
        self.lock().last_time_step(field, mode)
    }

    fn last_adaptive_step(
        &self,
        block: BlockId,
        mode: SolutionMode,
        time_step: usize,
    ) -> Option<usize> {
        self.lock().last_adaptive_step(block, mode, time_step)
    }

    fn last_time(&self, block: BlockId) -> Option<f64> {
        self.lock().last_time(block)
    }

    fn remove_time_step(&mut self, time_step: usize) -> Result<(), StoreError> {
        self.lock().remove_time_step(time_step);
        Ok(())
    }

    fn remove_solution(&mut self, id: &SolutionId) -> Result<(), StoreError> {
        self.lock().remove(id);
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }

    fn load_run_time_details(&mut self) -> Result<(), StoreError> {
        self.reloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ── StubMesher ─────────────────────────────────────────────────────

/// [`MeshGenerator`] that writes a fixed [`MeshSummary`].
#[derive(Clone)]
pub struct StubMesher {
    summary: MeshSummary,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl StubMesher {
    /// A mesher whose summary marks every one of `edges` edges once.
    pub fn new(edges: usize) -> Self {
        Self::with_summary(MeshSummary {
            nodes: 4 * edges.max(1),
            elements: 2 * edges.max(1),
            boundary_markers: (0..edges).collect(),
        })
    }

    pub fn with_summary(summary: MeshSummary) -> Self {
        Self {
            summary,
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A mesher that always reports failure.
    pub fn failing() -> Self {
        let mesher = Self::new(0);
        mesher.set_failing(true);
        mesher
    }

    /// Make this mesher and all its clones fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Number of `generate` calls across all clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl MeshGenerator for StubMesher {
    fn generate(&mut self, path: &Path) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            return false;
        }
        match serde_json::to_vec(&self.summary) {
            Ok(bytes) => std::fs::write(path, bytes).is_ok(),
            Err(_) => false,
        }
    }
}

// ── StubGeometry ───────────────────────────────────────────────────

/// [`GeometryChecker`] with configurable answers.
///
/// By default the geometry is valid, fully assigned, and every edge
/// carries a boundary condition for every field.
#[derive(Clone, Debug)]
pub struct StubGeometry {
    edges: usize,
    unassigned: Vec<(FieldId, usize)>,
    result: Option<GeometryError>,
    assigned: bool,
}

impl StubGeometry {
    pub fn new(edges: usize) -> Self {
        Self {
            edges,
            unassigned: Vec::new(),
            result: None,
            assigned: true,
        }
    }

    /// Leave `edge` without a boundary condition for `field`.
    pub fn without_boundary(mut self, field: FieldId, edge: usize) -> Self {
        self.unassigned.push((field, edge));
        self
    }

    /// Make `check_geometry_result` fail with `err`.
    pub fn invalid(mut self, err: GeometryError) -> Self {
        self.result = Some(err);
        self
    }

    /// Make `check_geometry_assignment` fail.
    pub fn unassigned(mut self) -> Self {
        self.assigned = false;
        self
    }
}

impl GeometryChecker for StubGeometry {
    fn check_geometry_result(&self) -> Result<(), GeometryError> {
        match &self.result {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn check_geometry_assignment(&self) -> bool {
        self.assigned
    }

    fn edge_count(&self) -> usize {
        self.edges
    }

    fn boundary_assigned(&self, field: FieldId, edge: usize) -> bool {
        !self.unassigned.contains(&(field, edge))
    }
}
