//! The top-level solve driver.
//!
//! [`SolveOrchestrator`] owns a [`Problem`] and its external
//! collaborators. A full solve proceeds in fixed order:
//!
//! 1. Reject illegal feature combinations (no state touched).
//! 2. Run [`solve_init`](SolveOrchestrator::solve_init): geometry check,
//!    block structure, mesh, boundary verification, one solver per block,
//!    problem snapshot. Only once it succeeds are the previous time-step
//!    record and stored solutions dropped.
//! 3. Time-step loop: per iteration walk the blocks in build order, then
//!    let the [`TimeStepController`] advance, retry, or finish.
//!
//! A failure in step 3 aborts the loop. Solutions recorded before the
//! failing call stay in the store, and the accepted prefix of the
//! time-step record stays readable through
//! [`time_steps`](SolveOrchestrator::time_steps).

use std::time::Instant;

use tandem_block::{build_blocks, Block, BlockSolver, SolverFactory};
use tandem_core::{
    FieldId, GeometryChecker, GeometryError, MeshError, MeshGenerator, NextStepProposal,
    SolutionStore,
};
use tracing::{debug, error, info, warn};

use crate::adaptivity::{AdaptivityController, AdaptivityLimitExceeded};
use crate::boundary::verify_boundaries;
use crate::cache::SessionCache;
use crate::config::{ConfigError, ProblemConfig, RemeshPolicy, TimeStepMethod};
use crate::dispatch::BlockDispatch;
use crate::error::SolveError;
use crate::metrics::{BlockMetrics, SolveMetrics};
use crate::problem::Problem;
use crate::time_step::{StepDecision, TimeStepController, TimeStepRecord};

// ── Public types ───────────────────────────────────────────────────

/// External services a [`SolveOrchestrator`] drives.
pub struct Collaborators {
    /// Creates one engine solver per block.
    pub solvers: Box<dyn SolverFactory>,
    /// Mesh generator.
    pub mesher: Box<dyn MeshGenerator>,
    /// Geometry validator.
    pub geometry: Box<dyn GeometryChecker>,
    /// Solution metadata store.
    pub store: Box<dyn SolutionStore>,
}

/// What a [`solve`](SolveOrchestrator::solve) call does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveMode {
    /// Clear, rebuild, and run the whole time-step loop.
    Full,
    /// One more adaptivity increment on a steady single-block problem,
    /// continuing whatever the store already holds.
    AdaptiveStep,
}

/// Result of a [`solve`](SolveOrchestrator::solve) call that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum SolveOutcome {
    /// The solve ran to completion.
    Completed(SolveReport),
    /// Another solve is in progress; nothing was done.
    AlreadySolving,
}

/// Summary of a completed solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveReport {
    /// Mode that ran.
    pub mode: SolveMode,
    /// Number of blocks.
    pub blocks: usize,
    /// Accepted time steps.
    pub time_steps: usize,
    /// Iterations of the block loop, retries included.
    pub iterations: u64,
    /// Refused and repeated time steps.
    pub retries: u64,
    /// Clock at termination.
    pub final_time: f64,
    /// Adaptivity runs cut short by their step bound.
    pub adaptivity: Vec<AdaptivityLimitExceeded>,
    /// Timing and call counts.
    pub metrics: SolveMetrics,
}

// ── SolveOrchestrator ──────────────────────────────────────────────

/// Drives a [`Problem`] through its external engine.
///
/// Runs entirely on the calling thread. The `in_progress` flag only
/// guards against re-entrant calls; it is not a lock.
pub struct SolveOrchestrator {
    problem: Problem,
    solvers: Box<dyn SolverFactory>,
    mesher: Box<dyn MeshGenerator>,
    geometry: Box<dyn GeometryChecker>,
    store: Box<dyn SolutionStore>,
    cache: SessionCache,
    blocks: Vec<Block>,
    block_solvers: Vec<Box<dyn BlockSolver>>,
    record: TimeStepRecord,
    in_progress: bool,
    solved: bool,
}

/// Per-iteration inputs shared by every block.
#[derive(Clone, Copy)]
struct Iteration {
    time_step: usize,
    time: f64,
    estimate: bool,
}

impl SolveOrchestrator {
    /// Wrap `problem` with its collaborators. Nothing runs yet.
    ///
    /// The store is pointed at the session's `runtime.json`.
    pub fn new(problem: Problem, collaborators: Collaborators) -> Self {
        let cache = SessionCache::from_config(problem.config());
        let mut store = collaborators.store;
        store.relocate(&cache.runtime_path());
        Self {
            problem,
            solvers: collaborators.solvers,
            mesher: collaborators.mesher,
            geometry: collaborators.geometry,
            store,
            cache,
            blocks: Vec::new(),
            block_solvers: Vec::new(),
            record: TimeStepRecord::new(),
            in_progress: false,
            solved: false,
        }
    }

    /// The problem.
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Edit the problem. Any existing solution is cleared first, since
    /// the block structure no longer matches.
    pub fn edit_problem<R>(&mut self, f: impl FnOnce(&mut Problem) -> R) -> Result<R, SolveError> {
        self.clear_solution()?;
        let out = f(&mut self.problem);
        self.rebind_cache();
        Ok(out)
    }

    /// Replace the configuration. Clears any existing solution.
    pub fn set_config(&mut self, config: ProblemConfig) -> Result<(), SolveError> {
        self.clear_solution()?;
        self.problem.set_config(config)?;
        self.rebind_cache();
        Ok(())
    }

    /// Follow `cache_dir` and `session` of the current configuration.
    fn rebind_cache(&mut self) {
        self.cache = SessionCache::from_config(self.problem.config());
        self.store.relocate(&self.cache.runtime_path());
    }

    /// Blocks of the current structure, empty before the first solve.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block containing `field`.
    pub fn block_of_field(&self, field: FieldId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.contains(field))
    }

    /// Accepted time-step lengths of the last solve.
    pub fn time_steps(&self) -> &TimeStepRecord {
        &self.record
    }

    /// `true` while a solve runs.
    pub fn is_solving(&self) -> bool {
        self.in_progress
    }

    /// `true` once a solve has completed and nothing was cleared since.
    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// The solution store.
    pub fn store(&self) -> &dyn SolutionStore {
        self.store.as_ref()
    }

    /// The session cache.
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Discard blocks, solvers, the time-step record, stored solutions,
    /// and the session cache.
    pub fn clear_solution(&mut self) -> Result<(), SolveError> {
        self.blocks.clear();
        self.block_solvers.clear();
        self.record = TimeStepRecord::new();
        self.solved = false;
        self.store.clear_all()?;
        self.cache.clear()?;
        Ok(())
    }

    /// Run a solve.
    ///
    /// Returns [`SolveOutcome::AlreadySolving`] without side effects if a
    /// solve is already in progress. Illegal feature combinations are
    /// rejected before any block work.
    pub fn solve(&mut self, mode: SolveMode) -> Result<SolveOutcome, SolveError> {
        if self.in_progress {
            warn!("solve requested while another solve is in progress");
            return Ok(SolveOutcome::AlreadySolving);
        }
        self.problem.validate_combination()?;

        info!(
            ?mode,
            fields = self.problem.fields().len(),
            session = %self.problem.config().session,
            "solve started"
        );
        self.in_progress = true;
        let started = Instant::now();
        let result = match mode {
            SolveMode::Full => self.run_full(),
            SolveMode::AdaptiveStep => self.run_adaptive_step(),
        };
        self.in_progress = false;

        let mut report = result.inspect_err(|e| error!(error = %e, "solve failed"))?;
        report.metrics.total_us = started.elapsed().as_micros() as u64;
        self.solved = true;
        info!(
            ?mode,
            blocks = report.blocks,
            time_steps = report.time_steps,
            retries = report.retries,
            total_us = report.metrics.total_us,
            "solve finished"
        );
        Ok(SolveOutcome::Completed(report))
    }

    /// Validate geometry, build the block structure, (re)mesh, verify
    /// boundaries, prepare solvers, and snapshot the problem.
    ///
    /// The orchestrator's blocks and solvers are replaced only if every
    /// step succeeds. Stored solutions are never touched here.
    pub fn solve_init(&mut self) -> Result<(), SolveError> {
        // 1. Something to solve.
        if self.problem.fields().is_empty() {
            return Err(ConfigError::NoFields.into());
        }

        // 2. Geometry.
        self.geometry.check_geometry_result()?;

        // 3. Block structure.
        let blocks = build_blocks(
            self.problem.fields().iter(),
            self.problem.couplings().couplings(),
        )?;

        // 4. Mesh.
        self.cache.ensure()?;
        let remesh = match self.problem.config().remesh {
            RemeshPolicy::Always => true,
            RemeshPolicy::IfMissing => !self.cache.has_mesh(),
        };
        if remesh {
            debug!(path = %self.cache.mesh_path().display(), "generating mesh");
            if !self.mesher.generate(&self.cache.mesh_path()) {
                return Err(MeshError::GenerationFailed.into());
            }
        }
        let mesh = self.cache.read_mesh()?;

        // 5. Assignment and boundary markers.
        if !self.geometry.check_geometry_assignment() {
            return Err(GeometryError::Unassigned.into());
        }
        verify_boundaries(&mesh, self.geometry.as_ref(), self.problem.fields().iter())?;

        // 6. One engine solver per block.
        let mut solvers = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let solver = self
                .solvers
                .prepare(block)
                .map_err(|source| SolveError::Engine {
                    block: block.label(),
                    source,
                })?;
            solvers.push(solver);
        }

        // 7. Snapshot the problem into the session cache.
        self.cache.write_snapshot(&self.problem.snapshot())?;

        info!(
            blocks = blocks.len(),
            nodes = mesh.nodes,
            elements = mesh.elements,
            "structure built"
        );
        self.blocks = blocks;
        self.block_solvers = solvers;
        Ok(())
    }

    fn run_full(&mut self) -> Result<SolveReport, SolveError> {
        let init_started = Instant::now();
        self.solve_init()?;
        let init_us = init_started.elapsed().as_micros() as u64;

        // The new structure is in place; drop the previous solution.
        self.record = TimeStepRecord::new();
        self.solved = false;
        self.store.clear_all()?;

        let config = self.problem.config().clone();
        let transient = self.problem.is_transient();
        let estimate = transient && config.time_step_method == TimeStepMethod::Adaptive;
        let mut controller = TimeStepController::new(
            config.total_time,
            config.initial_time_step,
            config.max_step_retries,
        );
        let mut metrics: Vec<BlockMetrics> =
            self.blocks.iter().map(BlockMetrics::for_block).collect();
        let mut limits = Vec::new();

        for (block, solver) in self.blocks.iter().zip(self.block_solvers.iter_mut()) {
            solver
                .create_initial_space(0)
                .map_err(|source| SolveError::Engine {
                    block: block.label(),
                    source,
                })?;
        }

        let result = loop {
            let it = Iteration {
                time_step: controller.begin_iteration(),
                time: controller.clock(),
                estimate,
            };
            let proposal = match solve_blocks(
                &self.blocks,
                &mut self.block_solvers,
                self.store.as_mut(),
                it,
                &config,
                &mut metrics,
                &mut limits,
            ) {
                Ok(p) => p,
                Err(e) => break Err(e),
            };

            if !transient {
                controller.finish();
                break Ok(());
            }
            if let Some(p) = proposal {
                controller.offer(p);
            }
            match controller.conclude() {
                Ok(StepDecision::Advance { time_step, length }) => {
                    debug!(time_step, length, clock = controller.clock(), "time step accepted");
                }
                Ok(StepDecision::Retry { discarded, length }) => {
                    info!(time_step = discarded, length, "time step refused, retrying");
                    if let Err(e) = self.store.remove_time_step(discarded) {
                        break Err(e.into());
                    }
                }
                Ok(StepDecision::Finished) => break Ok(()),
                Err(e) => break Err(e.into()),
            }
        };

        if result.is_err() {
            controller.fail();
        }
        self.record = controller.record().clone();
        result?;

        Ok(SolveReport {
            mode: SolveMode::Full,
            blocks: self.blocks.len(),
            time_steps: self.record.len(),
            iterations: controller.iterations(),
            retries: controller.retries(),
            final_time: controller.clock(),
            adaptivity: limits,
            metrics: SolveMetrics {
                total_us: 0,
                init_us,
                blocks: metrics,
            },
        })
    }

    fn run_adaptive_step(&mut self) -> Result<SolveReport, SolveError> {
        if self.problem.is_transient() {
            return Err(ConfigError::AdaptiveStepOnTransient.into());
        }

        let init_started = Instant::now();
        if self.blocks.is_empty() {
            self.solve_init()?;
            self.store.load_run_time_details()?;
        }
        let init_us = init_started.elapsed().as_micros() as u64;

        if self.blocks.len() != 1 {
            return Err(ConfigError::AdaptiveStepRequiresSingleBlock {
                blocks: self.blocks.len(),
            }
            .into());
        }
        let block = &self.blocks[0];
        let Some(controller) = AdaptivityController::for_block(block) else {
            return Err(ConfigError::BlockNotAdaptive {
                block: block.label(),
            }
            .into());
        };

        let mut m = BlockMetrics::for_block(block);
        let started = Instant::now();
        let mut dispatch =
            BlockDispatch::new(block, self.block_solvers[0].as_mut(), self.store.as_mut(), 0.0);
        let step = controller.single_increment(&mut dispatch, 0)?;
        m.solves = dispatch.solves();
        m.reference_solves = dispatch.reference_solves();
        m.elapsed_us = started.elapsed().as_micros() as u64;
        info!(block = %m.label, adapt_step = step, "adaptivity step solved");

        Ok(SolveReport {
            mode: SolveMode::AdaptiveStep,
            blocks: 1,
            time_steps: 0,
            iterations: 1,
            retries: 0,
            final_time: 0.0,
            adaptivity: Vec::new(),
            metrics: SolveMetrics {
                total_us: 0,
                init_us,
                blocks: vec![m],
            },
        })
    }
}

// ── Block loop ─────────────────────────────────────────────────────

/// Walk every block once in build order. Returns the estimator proposal
/// of the transient block, if one was asked for.
fn solve_blocks(
    blocks: &[Block],
    solvers: &mut [Box<dyn BlockSolver>],
    store: &mut dyn SolutionStore,
    it: Iteration,
    config: &ProblemConfig,
    metrics: &mut [BlockMetrics],
    limits: &mut Vec<AdaptivityLimitExceeded>,
) -> Result<Option<NextStepProposal>, SolveError> {
    let mut proposal = None;
    for ((block, solver), m) in blocks.iter().zip(solvers.iter_mut()).zip(metrics.iter_mut()) {
        let initial = block.is_transient() && it.time_step == 0;
        if !initial && block.skips(it.time, store.last_time(block.id())) {
            debug!(block = %block.label(), time = it.time, "block skipped");
            m.skipped += 1;
            continue;
        }
        if !initial {
            step_message(block, it, config);
        }

        let started = Instant::now();
        let mut dispatch = BlockDispatch::new(block, solver.as_mut(), &mut *store, it.time);
        let result = solve_block(&mut dispatch, it, initial, limits);
        m.solves += dispatch.solves();
        m.reference_solves += dispatch.reference_solves();
        m.estimates += dispatch.estimates();
        m.elapsed_us += started.elapsed().as_micros() as u64;
        if let Some(p) = result? {
            proposal = Some(p);
        }
    }
    Ok(proposal)
}

fn solve_block(
    dispatch: &mut BlockDispatch<'_>,
    it: Iteration,
    initial: bool,
    limits: &mut Vec<AdaptivityLimitExceeded>,
) -> Result<Option<NextStepProposal>, SolveError> {
    let block = dispatch.block();
    if initial {
        dispatch.initial()?;
    } else if let Some(controller) = AdaptivityController::for_block(block) {
        let run = controller.run(dispatch, it.time_step)?;
        limits.extend(run.limit);
    } else {
        dispatch.simple(it.time_step)?;
    }

    if it.estimate && block.is_transient() && it.time_step >= 1 {
        return dispatch.estimate(it.time_step).map(Some);
    }
    Ok(None)
}

fn step_message(block: &Block, it: Iteration, config: &ProblemConfig) {
    let label = block.label();
    if block.is_transient() {
        match config.time_step_method {
            TimeStepMethod::Fixed => {
                let steps = config.fixed_step_count();
                info!(block = %label, "transient step {}/{}", it.time_step, steps);
            }
            TimeStepMethod::Adaptive => {
                let percent = (100.0 * it.time / config.total_time) as u32;
                info!(block = %label, "transient step {} ({}%)", it.time_step, percent);
            }
        }
    } else if block.len() == 1 {
        info!(block = %label, "single analysis");
    } else {
        info!(block = %label, "coupled analysis");
    }
}
