//! Space-adaptivity driver for one block at one time step.
//!
//! An adaptive solve alternates a reference solve (which also projects
//! onto the working space) with a refinement request. The engine decides
//! cooperatively when to stop; [`AdaptivityController`] only bounds the
//! number of rounds and resumes from whatever a previous run recorded.

use tandem_block::Block;
use tandem_core::ResumePoint;
use tracing::{debug, warn};

use crate::dispatch::BlockDispatch;
use crate::error::SolveError;

/// The adaptivity loop stopped at its step bound while the engine still
/// asked for refinement.
///
/// Reported in [`SolveReport`](crate::SolveReport); the solve itself
/// continues.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("block '{block}' reached {steps} adaptivity steps at time step {time_step} without converging")]
pub struct AdaptivityLimitExceeded {
    /// Block label.
    pub block: String,
    /// Time step of the run.
    pub time_step: usize,
    /// The step bound that was hit.
    pub steps: usize,
}

/// Outcome of one [`AdaptivityController::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdaptivityRun {
    /// Adapt step the run started at.
    pub first_step: usize,
    /// Last adapt step with a reference solution, if any was solved.
    pub last_step: Option<usize>,
    /// Reference solves performed by this run.
    pub reference_solves: usize,
    /// Set when the step bound cut the loop short.
    pub limit: Option<AdaptivityLimitExceeded>,
}

/// Bounded reference/refine loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdaptivityController {
    max_steps: usize,
}

impl AdaptivityController {
    /// A controller allowing at most `max_steps` reference solves per run.
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Controller for an adaptive block, or `None` if the block does not
    /// adapt.
    pub fn for_block(block: &Block) -> Option<Self> {
        block
            .is_adaptive()
            .then(|| Self::new(block.adaptivity_steps()))
    }

    /// The step bound.
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Drive the block to convergence (or the bound) at `time_step`,
    /// resuming from recorded state.
    pub fn run(
        &self,
        dispatch: &mut BlockDispatch<'_>,
        time_step: usize,
    ) -> Result<AdaptivityRun, SolveError> {
        let state = dispatch.adaptivity_state(time_step);
        let (first_step, mut proceed) = match state.resume_point() {
            ResumePoint::Fresh => (0, true),
            ResumePoint::StaleNormal(n) => {
                debug!(block = %dispatch.block().id(), step = n, "discarding normal solution without reference");
                dispatch.discard_normal(time_step, n)?;
                dispatch.resume(n)?;
                (n, true)
            }
            ResumePoint::AfterReference(r) => {
                debug!(block = %dispatch.block().id(), step = r, "resuming after reference solve");
                dispatch.resume(r)?;
                let more = dispatch.adapt(time_step, r + 1, false)?;
                (r + 1, more)
            }
        };

        let mut step = first_step;
        let mut last_step = None;
        let mut reference_solves = 0;
        while proceed && step < self.max_steps {
            dispatch.reference(time_step, step)?;
            reference_solves += 1;
            last_step = Some(step);
            proceed = dispatch.adapt(time_step, step + 1, false)?;
            step += 1;
        }

        let limit = proceed.then(|| {
            let limit = AdaptivityLimitExceeded {
                block: dispatch.block().label(),
                time_step,
                steps: self.max_steps,
            };
            warn!(%limit, "adaptivity stopped at step bound");
            limit
        });

        Ok(AdaptivityRun {
            first_step,
            last_step,
            reference_solves,
            limit,
        })
    }

    /// Perform exactly one more refinement round at `time_step`.
    ///
    /// Returns the adapt step of the new reference solution.
    pub fn single_increment(
        &self,
        dispatch: &mut BlockDispatch<'_>,
        time_step: usize,
    ) -> Result<usize, SolveError> {
        let step = match dispatch.adaptivity_state(time_step).resume_point() {
            ResumePoint::Fresh => {
                dispatch.initial_space(time_step)?;
                dispatch.reference(time_step, 0)?;
                0
            }
            ResumePoint::StaleNormal(n) => {
                dispatch.resume(n)?;
                dispatch.discard_normal(time_step, n)?;
                dispatch.reference(time_step, n)?;
                n
            }
            ResumePoint::AfterReference(r) => {
                dispatch.resume(r)?;
                r
            }
        };
        dispatch.adapt(time_step, step + 1, true)?;
        dispatch.reference(time_step, step + 1)?;
        Ok(step + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_block::{build_blocks, SolverFactory};
    use tandem_core::{FieldDescriptor, FieldId, SolutionMode, SolutionStore};
    use tandem_test_utils::fixtures::adaptive_electrostatic;
    use tandem_test_utils::{EngineCall, MemorySolutionStore, Operation, ScriptedSolverFactory};

    fn block(steps: u32) -> Block {
        let f: FieldDescriptor = adaptive_electrostatic("V", steps);
        build_blocks([(FieldId(0), &f)], &[])
            .unwrap()
            .remove(0)
    }

    #[test]
    fn non_adaptive_block_has_no_controller() {
        let f = FieldDescriptor::new("V", tandem_core::FieldKind::Electrostatic);
        let b = build_blocks([(FieldId(0), &f)], &[]).unwrap().remove(0);
        assert!(AdaptivityController::for_block(&b).is_none());
    }

    #[test]
    fn fresh_run_stops_when_engine_converges() {
        let b = block(10);
        let (mut factory, journal) = ScriptedSolverFactory::new().refine_until(3).build();
        let mut solver = factory.prepare(&b).unwrap();
        let mut store = MemorySolutionStore::new();
        let mut d = BlockDispatch::new(&b, solver.as_mut(), &mut store, 0.0);

        let ctl = AdaptivityController::for_block(&b).unwrap();
        let run = ctl.run(&mut d, 0).unwrap();
        assert_eq!(run.first_step, 0);
        // adapt(1) and adapt(2) ask for more, adapt(3) stops.
        assert_eq!(run.last_step, Some(2));
        assert_eq!(run.reference_solves, 3);
        assert!(run.limit.is_none());
        assert_eq!(journal.count(Operation::SolveReference), 3);
        assert_eq!(
            store.last_adaptive_step(b.id(), SolutionMode::Reference, 0),
            Some(2)
        );
    }

    #[test]
    fn step_bound_is_reported_not_fatal() {
        let b = block(4);
        let (mut factory, journal) = ScriptedSolverFactory::new().refine_until(100).build();
        let mut solver = factory.prepare(&b).unwrap();
        let mut store = MemorySolutionStore::new();
        let mut d = BlockDispatch::new(&b, solver.as_mut(), &mut store, 0.0);

        let run = AdaptivityController::new(4).run(&mut d, 0).unwrap();
        assert_eq!(run.reference_solves, 4);
        assert_eq!(
            run.limit,
            Some(AdaptivityLimitExceeded {
                block: "V".into(),
                time_step: 0,
                steps: 4,
            })
        );
        assert_eq!(journal.count(Operation::SolveReference), 4);
    }

    #[test]
    fn resumes_after_recorded_reference() {
        let b = block(10);
        let (mut factory, journal) = ScriptedSolverFactory::new().refine_until(5).build();
        let mut solver = factory.prepare(&b).unwrap();
        let mut store =
            MemorySolutionStore::new().with_adaptive_history(b.id(), &b.field_ids(), 0, 2);
        let mut d = BlockDispatch::new(&b, solver.as_mut(), &mut store, 0.0);

        let run = AdaptivityController::new(10).run(&mut d, 0).unwrap();
        assert_eq!(run.first_step, 3);
        let calls = journal.calls();
        assert_eq!(calls[0], EngineCall::Resume { block: b.id(), adapt_step: 2 });
        let first_reference = calls
            .iter()
            .find(|c| c.operation() == Operation::SolveReference);
        assert_eq!(
            first_reference,
            Some(&EngineCall::SolveReference {
                block: b.id(),
                time_step: 0,
                adapt_step: 3,
            })
        );
    }

    #[test]
    fn stale_normal_solution_is_discarded_and_resolved() {
        let b = block(10);
        let (mut factory, journal) = ScriptedSolverFactory::new().build();
        let mut solver = factory.prepare(&b).unwrap();
        let stale = tandem_core::SolutionRecord {
            id: tandem_core::SolutionId::normal(b.id(), 0, 0),
            fields: b.field_ids(),
            time: 0.0,
        };
        let mut store = MemorySolutionStore::new().with_record(stale);
        let mut d = BlockDispatch::new(&b, solver.as_mut(), &mut store, 0.0);

        let run = AdaptivityController::new(10).run(&mut d, 0).unwrap();
        assert_eq!(run.first_step, 0);
        assert_eq!(run.reference_solves, 1);
        assert_eq!(journal.calls()[0], EngineCall::Resume { block: b.id(), adapt_step: 0 });
        // Re-solved: both modes now present at step 0.
        assert_eq!(
            store.adaptivity_state(b.id(), 0).last_reference,
            Some(0)
        );
    }

    #[test]
    fn single_increment_from_scratch() {
        let b = block(10);
        let (mut factory, journal) = ScriptedSolverFactory::new().build();
        let mut solver = factory.prepare(&b).unwrap();
        let mut store = MemorySolutionStore::new();
        let mut d = BlockDispatch::new(&b, solver.as_mut(), &mut store, 0.0);

        let step = AdaptivityController::new(10)
            .single_increment(&mut d, 0)
            .unwrap();
        assert_eq!(step, 1);
        let id = b.id();
        assert_eq!(
            journal.calls(),
            vec![
                EngineCall::CreateInitialSpace { block: id, time_step: 0 },
                EngineCall::SolveReference { block: id, time_step: 0, adapt_step: 0 },
                EngineCall::CreateAdaptedSpace { block: id, time_step: 0, adapt_step: 1, force: true },
                EngineCall::SolveReference { block: id, time_step: 0, adapt_step: 1 },
            ]
        );
    }

    #[test]
    fn single_increment_continues_recorded_history() {
        let b = block(10);
        let (mut factory, journal) = ScriptedSolverFactory::new().build();
        let mut solver = factory.prepare(&b).unwrap();
        let mut store =
            MemorySolutionStore::new().with_adaptive_history(b.id(), &b.field_ids(), 0, 1);
        let mut d = BlockDispatch::new(&b, solver.as_mut(), &mut store, 0.0);

        let step = AdaptivityController::new(10)
            .single_increment(&mut d, 0)
            .unwrap();
        assert_eq!(step, 2);
        assert_eq!(journal.count(Operation::CreateInitialSpace), 0);
        assert_eq!(journal.count(Operation::SolveReference), 1);
    }
}
