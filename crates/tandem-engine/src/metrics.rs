//! Per-solve timing and call counts.
//!
//! [`SolveMetrics`] is filled in by the orchestrator as a solve runs and
//! returned in the [`SolveReport`](crate::SolveReport).

use tandem_block::Block;
use tandem_core::BlockId;

/// Counters for one block over a whole solve.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockMetrics {
    /// Block.
    pub block: BlockId,
    /// Field names joined with `" + "`.
    pub label: String,
    /// Normal solves (initial, simple, and projected).
    pub solves: u64,
    /// Reference solves.
    pub reference_solves: u64,
    /// Estimator calls.
    pub estimates: u64,
    /// Iterations the block sat out because of its time skip.
    pub skipped: u64,
    /// Wall-clock time spent in this block's engine calls, in microseconds.
    pub elapsed_us: u64,
}

impl BlockMetrics {
    /// Zeroed counters labelled for `block`.
    pub fn for_block(block: &Block) -> Self {
        Self {
            block: block.id(),
            label: block.label(),
            ..Self::default()
        }
    }
}

/// Timing collected during a single solve.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolveMetrics {
    /// Wall-clock time for the entire solve.
    pub total_us: u64,
    /// Time spent in `solve_init` (geometry, structure, mesh).
    pub init_us: u64,
    /// Per-block counters in block order.
    pub blocks: Vec<BlockMetrics>,
}

impl SolveMetrics {
    /// Total normal solves over all blocks.
    pub fn total_solves(&self) -> u64 {
        self.blocks.iter().map(|b| b.solves).sum()
    }
}
