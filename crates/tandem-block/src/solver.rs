//! The [`BlockSolver`] capability interface and [`SolverFactory`].
//!
//! The numerical work (assembly, linear algebra, refinement, error
//! estimation) lives in an external finite-element engine. The
//! orchestrator only sequences calls into it through these traits.

use tandem_core::{NextStepProposal, SolverEngineError};

use crate::block::Block;

/// Per-block entry points into the finite-element engine.
///
/// # Contract
///
/// - Calls are blocking and made from the solving thread only.
/// - `time_step` is the index into the accepted time-step record;
///   `adapt_step` counts refinements within that time step.
/// - Any call may fail with a [`SolverEngineError`]; the orchestrator
///   aborts the solve on the first failure.
///
/// # Object safety
///
/// This trait is object-safe; the orchestrator stores solvers as
/// `Vec<Box<dyn BlockSolver>>`.
///
/// # Examples
///
/// A solver for a steady block that never refines:
///
/// ```
/// use tandem_block::BlockSolver;
/// use tandem_core::{NextStepProposal, SolverEngineError};
///
/// struct Direct {
///     solves: usize,
/// }
///
/// impl BlockSolver for Direct {
///     fn solve_initial_time_step(&mut self) -> Result<(), SolverEngineError> {
///         Ok(())
///     }
///
///     fn solve_simple(&mut self, _time_step: usize, _adapt_step: usize) -> Result<(), SolverEngineError> {
///         self.solves += 1;
///         Ok(())
///     }
///
///     fn solve_reference_and_project(&mut self, _: usize, _: usize) -> Result<(), SolverEngineError> {
///         Err(SolverEngineError::Adaptivity("not adaptive".into()))
///     }
///
///     fn create_adapted_space(&mut self, _: usize, _: usize, _: bool) -> Result<bool, SolverEngineError> {
///         Ok(false)
///     }
///
///     fn estimate_time_step_length(&mut self, _: usize, _: usize) -> Result<NextStepProposal, SolverEngineError> {
///         Ok(NextStepProposal::accept(1.0))
///     }
/// }
///
/// let mut s = Direct { solves: 0 };
/// s.solve_simple(0, 0).unwrap();
/// assert_eq!(s.solves, 1);
/// ```
pub trait BlockSolver {
    /// Build the initial (unrefined) space before the first adaptive solve.
    fn create_initial_space(&mut self, _time_step: usize) -> Result<(), SolverEngineError> {
        Ok(())
    }

    /// Project initial conditions at time step 0 of a transient block.
    fn solve_initial_time_step(&mut self) -> Result<(), SolverEngineError>;

    /// Solve once on the current space.
    fn solve_simple(&mut self, time_step: usize, adapt_step: usize)
        -> Result<(), SolverEngineError>;

    /// Solve on the reference space and project back onto the working
    /// space, producing both a reference and a normal solution.
    fn solve_reference_and_project(
        &mut self,
        time_step: usize,
        adapt_step: usize,
    ) -> Result<(), SolverEngineError>;

    /// Refine the space for `adapt_step`.
    ///
    /// Returns `true` if further refinement is warranted. `force` refines
    /// even when the error estimate is already below tolerance.
    fn create_adapted_space(
        &mut self,
        time_step: usize,
        adapt_step: usize,
        force: bool,
    ) -> Result<bool, SolverEngineError>;

    /// Judge the step just computed and propose the next length.
    fn estimate_time_step_length(
        &mut self,
        time_step: usize,
        adapt_step: usize,
    ) -> Result<NextStepProposal, SolverEngineError>;

    /// Restore engine-side adaptivity state (spaces, estimators) for
    /// `adapt_step` before continuing an interrupted adaptive run.
    fn resume_adaptivity_process(&mut self, _adapt_step: usize) -> Result<(), SolverEngineError> {
        Ok(())
    }
}

/// Prepares one [`BlockSolver`] per block when the structure is built.
pub trait SolverFactory {
    /// Set up engine state for `block`.
    fn prepare(&mut self, block: &Block) -> Result<Box<dyn BlockSolver>, SolverEngineError>;
}
