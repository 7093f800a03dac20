//! The simulation clock: accepted step lengths and the step state machine.
//!
//! [`TimeStepRecord`] is the append-only sequence of accepted lengths.
//! [`TimeStepController`] owns one for the duration of a solve and moves
//! through `Init → Stepping → {Stepping, Retry} → Done | Failed`:
//!
//! - each iteration starts with [`begin_iteration`](TimeStepController::begin_iteration),
//!   which returns the time-step index to solve;
//! - the transient block's estimator output is handed over with
//!   [`offer`](TimeStepController::offer);
//! - [`conclude`](TimeStepController::conclude) consumes that proposal and
//!   either appends the next length, undoes the last one for a retry, or
//!   reports that the clock reached the end.

use serde::{Deserialize, Serialize};
use tandem_core::NextStepProposal;

// ── TimeStepRecord ─────────────────────────────────────────────────

/// Accepted step lengths, in order.
///
/// The solution at time-step index `i` belongs to the time
/// `lengths[0] + ... + lengths[i - 1]`; index 0 is the initial state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeStepRecord {
    lengths: Vec<f64>,
}

impl TimeStepRecord {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted lengths.
    pub fn lengths(&self) -> &[f64] {
        &self.lengths
    }

    /// Number of accepted lengths.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// `true` if no length was accepted.
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Most recent accepted length.
    pub fn last_length(&self) -> Option<f64> {
        self.lengths.last().copied()
    }

    /// Length of the step that ends at index `step`; `None` for 0 or
    /// past the end.
    pub fn length_at(&self, step: usize) -> Option<f64> {
        step.checked_sub(1).and_then(|i| self.lengths.get(i).copied())
    }

    /// Simulation time of index `step`. Indices past the end clamp to
    /// the current clock.
    pub fn time_at(&self, step: usize) -> f64 {
        self.lengths[..step.min(self.lengths.len())].iter().sum()
    }

    /// Current clock: the sum of all accepted lengths.
    pub fn actual_time(&self) -> f64 {
        self.lengths.iter().sum()
    }

    /// Index whose time is within `epsilon` of `time`.
    pub fn step_at_time(&self, time: f64, epsilon: f64) -> Option<usize> {
        let mut t = 0.0;
        for step in 0..=self.lengths.len() {
            if (t - time).abs() <= epsilon {
                return Some(step);
            }
            if let Some(len) = self.lengths.get(step) {
                t += len;
            }
        }
        None
    }

    fn push(&mut self, length: f64) {
        self.lengths.push(length);
    }

    fn pop(&mut self) -> Option<f64> {
        self.lengths.pop()
    }
}

// ── Errors / decisions ─────────────────────────────────────────────

/// Failure of the step state machine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeStepError {
    /// The same step was refused more often than the configured cap.
    #[error("time step {time_step} refused {retries} times in a row")]
    RetryLimitExceeded {
        /// Index of the step being retried.
        time_step: usize,
        /// Consecutive refusals.
        retries: u32,
    },

    /// An estimator proposed a non-positive or non-finite length.
    #[error("invalid step length {length} proposed at time step {time_step}")]
    InvalidLength {
        /// Index the proposal came from.
        time_step: usize,
        /// The rejected length.
        length: f64,
    },
}

/// Phase of a [`TimeStepController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeStepPhase {
    /// No iteration started yet.
    Init,
    /// Advancing normally.
    Stepping,
    /// Redoing a refused step.
    Retry,
    /// Clock reached total time.
    Done,
    /// A solve failed or the retry cap was hit.
    Failed,
}

/// Outcome of [`TimeStepController::conclude`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepDecision {
    /// A length was appended; the next iteration solves `time_step`.
    Advance {
        /// Next time-step index.
        time_step: usize,
        /// Appended length.
        length: f64,
    },
    /// The last length was undone and replaced; solutions of `discarded`
    /// are stale and `discarded` is solved again.
    Retry {
        /// Index whose solutions must be dropped.
        discarded: usize,
        /// Replacement length.
        length: f64,
    },
    /// Clock reached total time; no length was appended.
    Finished,
}

// ── TimeStepController ─────────────────────────────────────────────

/// Drives the clock for one solve.
#[derive(Debug)]
pub struct TimeStepController {
    record: TimeStepRecord,
    total_time: f64,
    initial_length: f64,
    max_retries: u32,
    phase: TimeStepPhase,
    pending: Option<NextStepProposal>,
    current: usize,
    consecutive_retries: u32,
    total_retries: u64,
    iterations: u64,
}

impl TimeStepController {
    /// A controller at clock 0 with an empty record.
    ///
    /// `total_time` and `initial_length` are expected to be validated
    /// already (see [`ProblemConfig::validate`](crate::ProblemConfig::validate)).
    pub fn new(total_time: f64, initial_length: f64, max_retries: u32) -> Self {
        Self {
            record: TimeStepRecord::new(),
            total_time,
            initial_length,
            max_retries,
            phase: TimeStepPhase::Init,
            pending: None,
            current: 0,
            consecutive_retries: 0,
            total_retries: 0,
            iterations: 0,
        }
    }

    /// Accepted lengths so far.
    pub fn record(&self) -> &TimeStepRecord {
        &self.record
    }

    /// Current phase.
    pub fn phase(&self) -> TimeStepPhase {
        self.phase
    }

    /// Current clock.
    pub fn clock(&self) -> f64 {
        self.record.actual_time()
    }

    /// Clock tolerance: `1e-9 * total_time`.
    pub fn epsilon(&self) -> f64 {
        1e-9 * self.total_time
    }

    /// Length of the last accepted step, or the initial length before
    /// the first one.
    pub fn actual_length(&self) -> f64 {
        self.record.last_length().unwrap_or(self.initial_length)
    }

    /// Iterations started, retries included.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Refused steps over the whole solve.
    pub fn retries(&self) -> u64 {
        self.total_retries
    }

    /// Start an iteration and return the time-step index to solve.
    pub fn begin_iteration(&mut self) -> usize {
        if self.phase == TimeStepPhase::Init {
            self.phase = TimeStepPhase::Stepping;
        }
        self.iterations += 1;
        self.current = self.record.len();
        self.current
    }

    /// Hand over the estimator output of this iteration. A later offer in
    /// the same iteration replaces an earlier one.
    pub fn offer(&mut self, proposal: NextStepProposal) {
        self.pending = Some(proposal);
    }

    /// Consume this iteration's proposal and decide what happens next.
    ///
    /// Without a proposal the last accepted length (or the initial length
    /// on the first iteration) is reused. Appended lengths are clamped so
    /// the clock never passes `total_time`.
    pub fn conclude(&mut self) -> Result<StepDecision, TimeStepError> {
        let proposal = self.pending.take();

        if let Some(p) = proposal.filter(|p| p.refuse) {
            self.consecutive_retries += 1;
            self.total_retries += 1;
            if self.consecutive_retries > self.max_retries {
                self.phase = TimeStepPhase::Failed;
                return Err(TimeStepError::RetryLimitExceeded {
                    time_step: self.current,
                    retries: self.consecutive_retries,
                });
            }
            self.check_length(p.length)?;
            self.record.pop();
            let length = self.clamp(p.length);
            self.record.push(length);
            self.phase = TimeStepPhase::Retry;
            return Ok(StepDecision::Retry {
                discarded: self.current,
                length,
            });
        }

        self.consecutive_retries = 0;
        if self.clock() > self.total_time - self.epsilon() {
            self.phase = TimeStepPhase::Done;
            return Ok(StepDecision::Finished);
        }

        let candidate = match proposal {
            Some(p) => p.length,
            None => self.record.last_length().unwrap_or(self.initial_length),
        };
        self.check_length(candidate)?;
        let length = self.clamp(candidate);
        self.record.push(length);
        self.phase = TimeStepPhase::Stepping;
        Ok(StepDecision::Advance {
            time_step: self.record.len(),
            length,
        })
    }

    /// Mark a steady solve as complete after its single iteration.
    pub fn finish(&mut self) {
        self.pending = None;
        self.phase = TimeStepPhase::Done;
    }

    /// Mark the solve as failed. The record keeps what was accepted.
    pub fn fail(&mut self) {
        self.pending = None;
        self.phase = TimeStepPhase::Failed;
    }

    fn check_length(&mut self, length: f64) -> Result<(), TimeStepError> {
        if length.is_finite() && length > 0.0 {
            return Ok(());
        }
        self.phase = TimeStepPhase::Failed;
        Err(TimeStepError::InvalidLength {
            time_step: self.current,
            length,
        })
    }

    fn clamp(&self, length: f64) -> f64 {
        length.min(self.total_time - self.clock())
    }
}
