//! Solution identifiers, adaptivity resume state, and step proposals.
//!
//! [`SolutionIndex`] is the in-memory bookkeeping shared by every
//! [`SolutionStore`](crate::SolutionStore) implementation: it answers the
//! "what was solved last" queries the orchestrator needs without knowing
//! where solution vectors actually live.

use serde::{Deserialize, Serialize};

use crate::id::{BlockId, FieldId};

/// Which solution of an adaptivity step a record refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionMode {
    /// Solution on the working space.
    Normal,
    /// Solution on the globally refined reference space.
    Reference,
}

/// Key of one stored solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolutionId {
    /// Block that produced it.
    pub block: BlockId,
    /// Time-step index.
    pub time_step: usize,
    /// Adaptivity-step index within the time step.
    pub adapt_step: usize,
    /// Normal or reference.
    pub mode: SolutionMode,
}

impl SolutionId {
    /// Shorthand for a [`SolutionMode::Normal`] key.
    pub fn normal(block: BlockId, time_step: usize, adapt_step: usize) -> Self {
        Self {
            block,
            time_step,
            adapt_step,
            mode: SolutionMode::Normal,
        }
    }

    /// Shorthand for a [`SolutionMode::Reference`] key.
    pub fn reference(block: BlockId, time_step: usize, adapt_step: usize) -> Self {
        Self {
            block,
            time_step,
            adapt_step,
            mode: SolutionMode::Reference,
        }
    }
}

/// Metadata of one stored solution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    /// Key.
    pub id: SolutionId,
    /// Fields of the block, in block order.
    pub fields: Vec<FieldId>,
    /// Simulation time the solution belongs to.
    pub time: f64,
}

// ── AdaptivityState ────────────────────────────────────────────────

/// Last recorded adaptivity steps of one block at one time step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdaptivityState {
    /// Highest adapt step with a normal solution.
    pub last_normal: Option<usize>,
    /// Highest adapt step with a reference solution.
    pub last_reference: Option<usize>,
}

/// Where an adaptive solve picks up, derived from [`AdaptivityState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumePoint {
    /// Nothing recorded; start at adapt step 0.
    Fresh,
    /// A normal solution exists at this step with no reference behind
    /// it. It must be discarded and the step re-solved.
    StaleNormal(usize),
    /// The reference solve of this step completed; continue with the next.
    AfterReference(usize),
}

impl AdaptivityState {
    /// `true` unless a normal solution runs more than one step ahead of
    /// the last reference solution.
    pub fn is_consistent(&self) -> bool {
        match (self.last_normal, self.last_reference) {
            (Some(n), Some(r)) => n <= r + 1,
            _ => true,
        }
    }

    /// Decide how to resume.
    pub fn resume_point(&self) -> ResumePoint {
        match (self.last_normal, self.last_reference) {
            (None, None) => ResumePoint::Fresh,
            (Some(n), None) => ResumePoint::StaleNormal(n),
            (Some(n), Some(r)) if n > r => ResumePoint::StaleNormal(n),
            (_, Some(r)) => ResumePoint::AfterReference(r),
        }
    }
}

// ── NextStepProposal ───────────────────────────────────────────────

/// Output of a block's time-step error estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NextStepProposal {
    /// Suggested length of the next (or repeated) step.
    pub length: f64,
    /// The step just computed is unacceptable and must be redone with
    /// `length`.
    pub refuse: bool,
}

impl NextStepProposal {
    /// Accept the current step and suggest `length` for the next.
    pub fn accept(length: f64) -> Self {
        Self {
            length,
            refuse: false,
        }
    }

    /// Reject the current step and redo it with `length`.
    pub fn refuse(length: f64) -> Self {
        Self {
            length,
            refuse: true,
        }
    }
}

// ── SolutionIndex ──────────────────────────────────────────────────

/// Ordered collection of [`SolutionRecord`]s with the store queries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolutionIndex {
    records: Vec<SolutionRecord>,
}

impl SolutionIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[SolutionRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace the record with the same key.
    pub fn insert(&mut self, record: SolutionRecord) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    /// Whether a record with this key exists.
    pub fn contains(&self, id: &SolutionId) -> bool {
        self.records.iter().any(|r| r.id == *id)
    }

    /// Remove the record with this key. Returns `true` if one existed.
    pub fn remove(&mut self, id: &SolutionId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != *id);
        self.records.len() != before
    }

    /// Remove every record of a time step. Returns how many were removed.
    pub fn remove_time_step(&mut self, time_step: usize) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.id.time_step != time_step);
        before - self.records.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Highest time step with a solution of `field` in `mode`.
    pub fn last_time_step(&self, field: FieldId, mode: SolutionMode) -> Option<usize> {
        self.records
            .iter()
            .filter(|r| r.id.mode == mode && r.fields.contains(&field))
            .map(|r| r.id.time_step)
            .max()
    }

    /// Highest adapt step of `block` at `time_step` in `mode`.
    pub fn last_adaptive_step(
        &self,
        block: BlockId,
        mode: SolutionMode,
        time_step: usize,
    ) -> Option<usize> {
        self.records
            .iter()
            .filter(|r| r.id.block == block && r.id.mode == mode && r.id.time_step == time_step)
            .map(|r| r.id.adapt_step)
            .max()
    }

    /// Latest simulation time at which `block` was solved.
    pub fn last_time(&self, block: BlockId) -> Option<f64> {
        self.records
            .iter()
            .filter(|r| r.id.block == block)
            .map(|r| r.time)
            .reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: SolutionId, time: f64) -> SolutionRecord {
        SolutionRecord {
            id,
            fields: vec![FieldId(0)],
            time,
        }
    }

    #[test]
    fn resume_points() {
        let s = |n, r| AdaptivityState {
            last_normal: n,
            last_reference: r,
        };
        assert_eq!(s(None, None).resume_point(), ResumePoint::Fresh);
        assert_eq!(s(Some(0), None).resume_point(), ResumePoint::StaleNormal(0));
        assert_eq!(s(None, Some(2)).resume_point(), ResumePoint::AfterReference(2));
        assert_eq!(s(Some(2), Some(2)).resume_point(), ResumePoint::AfterReference(2));
        assert_eq!(s(Some(3), Some(2)).resume_point(), ResumePoint::StaleNormal(3));
    }

    #[test]
    fn consistency_bound() {
        let s = |n, r| AdaptivityState {
            last_normal: Some(n),
            last_reference: Some(r),
        };
        assert!(s(3, 2).is_consistent());
        assert!(!s(4, 2).is_consistent());
        assert!(AdaptivityState::default().is_consistent());
    }

    #[test]
    fn insert_replaces_same_key() {
        let mut idx = SolutionIndex::new();
        let id = SolutionId::normal(BlockId(0), 1, 0);
        idx.insert(rec(id, 1.0));
        idx.insert(rec(id, 2.0));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.last_time(BlockId(0)), Some(2.0));
    }

    #[test]
    fn queries_filter_by_key() {
        let mut idx = SolutionIndex::new();
        idx.insert(rec(SolutionId::normal(BlockId(0), 0, 0), 0.0));
        idx.insert(rec(SolutionId::reference(BlockId(0), 0, 0), 0.0));
        idx.insert(rec(SolutionId::reference(BlockId(0), 0, 1), 0.0));
        idx.insert(rec(SolutionId::normal(BlockId(0), 1, 0), 0.5));
        idx.insert(rec(SolutionId::normal(BlockId(1), 2, 0), 1.0));

        assert_eq!(idx.last_adaptive_step(BlockId(0), SolutionMode::Reference, 0), Some(1));
        assert_eq!(idx.last_adaptive_step(BlockId(0), SolutionMode::Normal, 0), Some(0));
        assert_eq!(idx.last_adaptive_step(BlockId(0), SolutionMode::Reference, 1), None);
        assert_eq!(idx.last_time_step(FieldId(0), SolutionMode::Normal), Some(2));
        assert_eq!(idx.last_time(BlockId(0)), Some(0.5));
        assert_eq!(idx.last_time(BlockId(7)), None);

        assert_eq!(idx.remove_time_step(0), 3);
        assert_eq!(idx.len(), 2);
        assert!(idx.remove(&SolutionId::normal(BlockId(1), 2, 0)));
        assert!(!idx.contains(&SolutionId::normal(BlockId(1), 2, 0)));
    }
}
