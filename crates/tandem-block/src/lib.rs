//! Block partitioning and the per-block solver contract.
//!
//! [`build_blocks`] partitions the registered fields into [`Block`]s,
//! the units of joint solution. [`BlockSolver`] is the capability
//! interface the finite-element engine implements per block, and
//! [`SolverFactory`] prepares one solver per block when the structure
//! is built.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod builder;
pub mod solver;

pub use block::Block;
pub use builder::{build_blocks, BlockError, CouplingDependencyError};
pub use solver::{BlockSolver, SolverFactory};
