//! Coupled-solve orchestration.
//!
//! [`SolveOrchestrator`] is the top-level driver. It validates the
//! [`Problem`], builds the block structure, and runs the time-step loop:
//! each iteration walks the blocks in order, dispatching each one to a
//! single solve or to the [`AdaptivityController`], and then lets the
//! [`TimeStepController`] accept, retry, or finish the step.
//!
//! Everything runs on the calling thread. The orchestrator never
//! installs a tracing subscriber; it only emits events.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adaptivity;
pub mod boundary;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod problem;
pub mod store;
pub mod time_step;

pub use adaptivity::{AdaptivityController, AdaptivityLimitExceeded, AdaptivityRun};
pub use boundary::verify_boundaries;
pub use cache::SessionCache;
pub use config::{ConfigError, ProblemConfig, RemeshPolicy, TimeStepMethod};
pub use dispatch::BlockDispatch;
pub use error::SolveError;
pub use metrics::{BlockMetrics, SolveMetrics};
pub use orchestrator::{Collaborators, SolveMode, SolveOrchestrator, SolveOutcome, SolveReport};
pub use problem::{Problem, ProblemSnapshot};
pub use store::JsonSolutionStore;
pub use time_step::{StepDecision, TimeStepController, TimeStepError, TimeStepPhase, TimeStepRecord};
