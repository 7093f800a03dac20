//! Recorded calls into one block's solver.
//!
//! [`BlockDispatch`] pairs a [`Block`] with its [`BlockSolver`] and the
//! solution store for the duration of one iteration. Each solve is
//! followed by the matching store record, so whatever completed before
//! a failure stays durable.

use tandem_block::{Block, BlockSolver};
use tandem_core::{
    AdaptivityState, NextStepProposal, SolutionId, SolutionRecord, SolutionStore,
    SolverEngineError,
};

use crate::error::SolveError;

/// One block's solver and the store, bound at a simulation time.
pub struct BlockDispatch<'a> {
    block: &'a Block,
    solver: &'a mut dyn BlockSolver,
    store: &'a mut dyn SolutionStore,
    time: f64,
    solves: u64,
    reference_solves: u64,
    estimates: u64,
}

impl<'a> BlockDispatch<'a> {
    /// Bind `block` and its solver at simulation time `time`.
    pub fn new(
        block: &'a Block,
        solver: &'a mut dyn BlockSolver,
        store: &'a mut dyn SolutionStore,
        time: f64,
    ) -> Self {
        Self {
            block,
            solver,
            store,
            time,
            solves: 0,
            reference_solves: 0,
            estimates: 0,
        }
    }

    /// The bound block.
    pub fn block(&self) -> &'a Block {
        self.block
    }

    /// Normal solves performed (initial, simple, and projected).
    pub fn solves(&self) -> u64 {
        self.solves
    }

    /// Reference solves performed.
    pub fn reference_solves(&self) -> u64 {
        self.reference_solves
    }

    /// Estimator calls performed.
    pub fn estimates(&self) -> u64 {
        self.estimates
    }

    /// Recorded adaptivity steps of this block at `time_step`.
    pub fn adaptivity_state(&self, time_step: usize) -> AdaptivityState {
        self.store.adaptivity_state(self.block.id(), time_step)
    }

    fn engine<T>(&self, result: Result<T, SolverEngineError>) -> Result<T, SolveError> {
        result.map_err(|source| SolveError::Engine {
            block: self.block.label(),
            source,
        })
    }

    fn record(&mut self, id: SolutionId) -> Result<(), SolveError> {
        self.store.record(SolutionRecord {
            id,
            fields: self.block.field_ids(),
            time: self.time,
        })?;
        Ok(())
    }

    /// Initial-condition solve at time step 0.
    pub fn initial(&mut self) -> Result<(), SolveError> {
        let r = self.solver.solve_initial_time_step();
        self.engine(r)?;
        self.solves += 1;
        self.record(SolutionId::normal(self.block.id(), 0, 0))
    }

    /// Single solve on the current space.
    pub fn simple(&mut self, time_step: usize) -> Result<(), SolveError> {
        let r = self.solver.solve_simple(time_step, 0);
        self.engine(r)?;
        self.solves += 1;
        self.record(SolutionId::normal(self.block.id(), time_step, 0))
    }

    /// Reference solve plus projection; records both solutions.
    pub fn reference(&mut self, time_step: usize, adapt_step: usize) -> Result<(), SolveError> {
        let r = self.solver.solve_reference_and_project(time_step, adapt_step);
        self.engine(r)?;
        self.solves += 1;
        self.reference_solves += 1;
        let block = self.block.id();
        self.record(SolutionId::reference(block, time_step, adapt_step))?;
        self.record(SolutionId::normal(block, time_step, adapt_step))
    }

    /// Refine the space; returns whether more refinement is wanted.
    pub fn adapt(
        &mut self,
        time_step: usize,
        adapt_step: usize,
        force: bool,
    ) -> Result<bool, SolveError> {
        let r = self
            .solver
            .create_adapted_space(time_step, adapt_step, force);
        self.engine(r)
    }

    /// Build the unrefined space.
    pub fn initial_space(&mut self, time_step: usize) -> Result<(), SolveError> {
        let r = self.solver.create_initial_space(time_step);
        self.engine(r)
    }

    /// Restore engine-side adaptivity state at `adapt_step`.
    pub fn resume(&mut self, adapt_step: usize) -> Result<(), SolveError> {
        let r = self.solver.resume_adaptivity_process(adapt_step);
        self.engine(r)
    }

    /// Drop a normal solution that has no reference behind it.
    pub fn discard_normal(&mut self, time_step: usize, adapt_step: usize) -> Result<(), SolveError> {
        self.store
            .remove_solution(&SolutionId::normal(self.block.id(), time_step, adapt_step))?;
        Ok(())
    }

    /// Ask the estimator about the step just solved.
    pub fn estimate(&mut self, time_step: usize) -> Result<NextStepProposal, SolveError> {
        let r = self.solver.estimate_time_step_length(time_step, 0);
        let proposal = self.engine(r)?;
        self.estimates += 1;
        Ok(proposal)
    }
}
