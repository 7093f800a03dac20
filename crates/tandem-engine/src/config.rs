//! Problem configuration, validation, and error types.
//!
//! [`ProblemConfig`] carries the session-level settings: clock bounds,
//! time-step method, retry cap, and cache location.
//! [`validate()`](ProblemConfig::validate) checks numeric invariants; the
//! feature-combination checks that depend on the field set live in
//! [`Problem::validate_combination`](crate::Problem::validate_combination).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ── TimeStepMethod ─────────────────────────────────────────────────

/// How the next time-step length is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeStepMethod {
    /// Every step uses `initial_time_step`; the estimator is not consulted.
    #[default]
    Fixed,
    /// The transient block's estimator proposes each length and may
    /// refuse a step.
    Adaptive,
}

/// When the mesh generator runs during `solve_init`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemeshPolicy {
    /// Regenerate on every structure build.
    #[default]
    Always,
    /// Reuse a mesh already present in the session cache. A full solve
    /// keeps the cached mesh; only `clear_solution` and config or problem
    /// edits remove it.
    IfMissing,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Illegal configuration or feature combination, detected before any
/// block runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `total_time` is not finite and positive.
    #[error("total time must be finite and positive, got {value}")]
    InvalidTotalTime {
        /// The invalid value.
        value: f64,
    },

    /// `initial_time_step` is not finite and positive.
    #[error("initial time step must be finite and positive, got {value}")]
    InvalidInitialStep {
        /// The invalid value.
        value: f64,
    },

    /// `initial_time_step` is longer than the whole simulation.
    #[error("initial time step {initial} exceeds total time {total}")]
    InitialStepExceedsTotal {
        /// Configured initial step.
        initial: f64,
        /// Configured total time.
        total: f64,
    },

    /// Session key is empty or would escape the cache directory.
    #[error("invalid session key '{session}'")]
    InvalidSession {
        /// The rejected key.
        session: String,
    },

    /// No fields registered.
    #[error("problem has no fields")]
    NoFields,

    /// More than one transient field.
    #[error("{count} transient fields; at most one is supported")]
    MultipleTransientFields {
        /// Number of transient fields.
        count: usize,
    },

    /// Space adaptivity in a coupled transient problem.
    #[error("space adaptivity is not supported for coupled transient problems")]
    TransientCoupledAdaptivity,

    /// Space and time adaptivity together.
    #[error("space and time adaptivity cannot be combined")]
    SpaceAndTimeAdaptivity,

    /// Single adaptive step requested on a transient problem.
    #[error("single adaptive steps are only available for steady problems")]
    AdaptiveStepOnTransient,

    /// Single adaptive step requested with more than one block.
    #[error("single adaptive steps need exactly one block, found {blocks}")]
    AdaptiveStepRequiresSingleBlock {
        /// Number of blocks.
        blocks: usize,
    },

    /// Single adaptive step requested on a block without adaptivity.
    #[error("block '{block}' has no space adaptivity")]
    BlockNotAdaptive {
        /// Block label.
        block: String,
    },
}

// ── ProblemConfig ──────────────────────────────────────────────────

/// Session-level settings of a [`Problem`](crate::Problem).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemConfig {
    /// Simulation end time. Default: 1.0.
    pub total_time: f64,
    /// First (and, for [`TimeStepMethod::Fixed`], every) step length. Default: 0.1.
    pub initial_time_step: f64,
    /// Step-length selection. Default: [`TimeStepMethod::Fixed`].
    pub time_step_method: TimeStepMethod,
    /// Consecutive refusals of one step before the solve fails. Default: 16.
    pub max_step_retries: u32,
    /// Parent of all session caches. Default: `<tmp>/tandem`.
    pub cache_dir: PathBuf,
    /// Session key; names the cache subdirectory. Default: `"default"`.
    pub session: String,
    /// Mesh regeneration policy. Default: [`RemeshPolicy::Always`].
    pub remesh: RemeshPolicy,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            total_time: 1.0,
            initial_time_step: 0.1,
            time_step_method: TimeStepMethod::Fixed,
            max_step_retries: 16,
            cache_dir: std::env::temp_dir().join("tandem"),
            session: "default".to_string(),
            remesh: RemeshPolicy::Always,
        }
    }
}

impl ProblemConfig {
    /// Check numeric and path invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Total time finite and positive.
        if !self.total_time.is_finite() || self.total_time <= 0.0 {
            return Err(ConfigError::InvalidTotalTime {
                value: self.total_time,
            });
        }
        // 2. Initial step finite and positive.
        if !self.initial_time_step.is_finite() || self.initial_time_step <= 0.0 {
            return Err(ConfigError::InvalidInitialStep {
                value: self.initial_time_step,
            });
        }
        // 3. Initial step fits in the simulation.
        if self.initial_time_step > self.total_time {
            return Err(ConfigError::InitialStepExceedsTotal {
                initial: self.initial_time_step,
                total: self.total_time,
            });
        }
        // 4. Session key is a single plain path component.
        let s = self.session.as_str();
        if s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\']) {
            return Err(ConfigError::InvalidSession {
                session: self.session.clone(),
            });
        }
        Ok(())
    }

    /// Numerical tolerance on the clock: `1e-9 * total_time`.
    pub fn epsilon(&self) -> f64 {
        1e-9 * self.total_time
    }

    /// Time steps needed to reach `total_time` at `initial_time_step`.
    /// A final remainder within [`epsilon`](Self::epsilon) is not a step.
    pub fn fixed_step_count(&self) -> usize {
        ((self.total_time - self.epsilon()) / self.initial_time_step).ceil() as usize
    }
}
