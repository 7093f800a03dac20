//! Partitioning fields into blocks.
//!
//! [`build_blocks`] runs once per structure build. Blocks are emitted in
//! dependency order: every weak coupling's source lands in an earlier
//! block than (or the same block as) its target, so iterating the block
//! list front to back honors all ordering constraints.

use smallvec::SmallVec;
use tandem_core::{BlockId, CouplingDescriptor, FieldDescriptor, FieldId, FieldSet};

use crate::block::Block;

// ── Errors ─────────────────────────────────────────────────────────

/// Weak couplings among the remaining fields form a cycle, so no field
/// can be scheduled first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("weak couplings form a cycle among fields: {}", names.join(", "))]
pub struct CouplingDependencyError {
    /// IDs of the fields that could not be scheduled, in registration order.
    pub unresolved: Vec<FieldId>,
    /// Their names, parallel to `unresolved`.
    pub names: Vec<String>,
}

/// Errors detected by [`build_blocks`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    /// The weak-coupling graph is cyclic.
    #[error(transparent)]
    CouplingDependency(#[from] CouplingDependencyError),

    /// A coupling references a field that was not passed in.
    #[error("coupling {source_field} -> {target_field} references unknown field {missing}")]
    UndefinedField {
        /// Coupling source.
        source_field: FieldId,
        /// Coupling target.
        target_field: FieldId,
        /// The endpoint that is not defined.
        missing: FieldId,
    },

    /// A coupling links a field to itself.
    #[error("field {field} is coupled to itself")]
    SelfCoupling {
        /// The field.
        field: FieldId,
    },

    /// The same field ID was passed twice.
    #[error("field {field} listed twice")]
    DuplicateField {
        /// The field.
        field: FieldId,
    },
}

// ── Builder ────────────────────────────────────────────────────────

/// Partition `fields` into blocks.
///
/// Repeats until every field is assigned:
///
/// 1. Pick the first unassigned field (registration order) whose hard
///    group has no weak incoming coupling from a still-unassigned field
///    outside the group. For a field without hard couplings the group is
///    the field itself. If no field qualifies, the weak couplings are
///    cyclic.
/// 2. Seed a block with it.
/// 3. Grow to a fixed point: absorb every free hard coupling touching a
///    member, then every unassigned endpoint of an absorbed coupling.
///
/// The result is deterministic for a given input order and always a
/// partition of `fields`. Hard-linked fields always share a block, so
/// hard cycles of any length collapse into one block.
pub fn build_blocks<'a, I>(
    fields: I,
    couplings: &[CouplingDescriptor],
) -> Result<Vec<Block>, BlockError>
where
    I: IntoIterator<Item = (FieldId, &'a FieldDescriptor)>,
{
    let fields: Vec<(FieldId, &FieldDescriptor)> = fields.into_iter().collect();

    let mut defined = FieldSet::empty();
    for (id, _) in &fields {
        if !defined.insert(*id) {
            return Err(BlockError::DuplicateField { field: *id });
        }
    }
    for c in couplings {
        if c.source == c.target {
            return Err(BlockError::SelfCoupling { field: c.source });
        }
        for end in [c.source, c.target] {
            if !defined.contains(end) {
                return Err(BlockError::UndefinedField {
                    source_field: c.source,
                    target_field: c.target,
                    missing: end,
                });
            }
        }
    }

    let mut unassigned = defined;
    let mut free = vec![true; couplings.len()];
    let mut blocks = Vec::new();

    while !unassigned.is_empty() {
        let seed = fields
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| unassigned.contains(*id))
            .find(|id| {
                weak_inputs(&hard_group(*id, couplings), couplings).is_disjoint(&unassigned)
            });
        let Some(seed) = seed else {
            let (unresolved, names) = fields
                .iter()
                .filter(|(id, _)| unassigned.contains(*id))
                .map(|(id, f)| (*id, f.name().to_string()))
                .unzip();
            return Err(CouplingDependencyError { unresolved, names }.into());
        };

        let mut members = FieldSet::empty();
        members.insert(seed);
        unassigned.remove(seed);
        let mut bound: Vec<usize> = Vec::new();

        loop {
            let mut grew = false;
            for (i, c) in couplings.iter().enumerate() {
                if free[i] && c.is_hard() && (members.contains(c.source) || members.contains(c.target))
                {
                    free[i] = false;
                    bound.push(i);
                    grew = true;
                }
            }
            for &i in &bound {
                let c = &couplings[i];
                for end in [c.source, c.target] {
                    if unassigned.remove(end) {
                        members.insert(end);
                        grew = true;
                    }
                }
            }
            if !grew {
                break;
            }
        }

        bound.sort_unstable();
        let block_fields: SmallVec<[(FieldId, FieldDescriptor); 2]> = fields
            .iter()
            .filter(|(id, _)| members.contains(*id))
            .map(|(id, f)| (*id, (*f).clone()))
            .collect();
        let block_couplings = bound.iter().map(|&i| couplings[i]).collect();
        blocks.push(Block::new(
            BlockId(blocks.len() as u32),
            block_fields,
            block_couplings,
        ));
    }

    Ok(blocks)
}

/// All fields transitively hard-linked to `seed`, including `seed`.
///
/// A block always holds a whole group, so weak inputs are checked
/// against the group rather than the seed alone.
fn hard_group(seed: FieldId, couplings: &[CouplingDescriptor]) -> FieldSet {
    let mut group = FieldSet::empty();
    group.insert(seed);
    let mut grew = true;
    while grew {
        grew = false;
        for c in couplings.iter().filter(|c| c.is_hard()) {
            if group.contains(c.source) || group.contains(c.target) {
                grew |= group.insert(c.source);
                grew |= group.insert(c.target);
            }
        }
    }
    group
}

/// Sources outside `group` of weak couplings into it.
fn weak_inputs(group: &FieldSet, couplings: &[CouplingDescriptor]) -> FieldSet {
    couplings
        .iter()
        .filter(|c| c.is_weak() && group.contains(c.target) && !group.contains(c.source))
        .map(|c| c.source)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tandem_core::{CouplingStrength, FieldKind};

    fn named(names: &[&str]) -> Vec<(FieldId, FieldDescriptor)> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (FieldId(i as u32), FieldDescriptor::new(*n, FieldKind::General)))
            .collect()
    }

    fn build(
        fields: &[(FieldId, FieldDescriptor)],
        couplings: &[CouplingDescriptor],
    ) -> Result<Vec<Block>, BlockError> {
        build_blocks(fields.iter().map(|(id, f)| (*id, f)), couplings)
    }

    fn weak(s: u32, t: u32) -> CouplingDescriptor {
        CouplingDescriptor::new(FieldId(s), FieldId(t), CouplingStrength::Weak)
    }

    fn hard(s: u32, t: u32) -> CouplingDescriptor {
        CouplingDescriptor::new(FieldId(s), FieldId(t), CouplingStrength::Hard)
    }

    fn labels(blocks: &[Block]) -> Vec<String> {
        blocks.iter().map(Block::label).collect()
    }

    // ── Scenarios ──────────────────────────────────────────────

    #[test]
    fn empty_input_gives_no_blocks() {
        assert!(build(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn uncoupled_fields_one_block_each() {
        let f = named(&["A", "B"]);
        let blocks = build(&f, &[]).unwrap();
        assert_eq!(labels(&blocks), vec!["A", "B"]);
        assert_eq!(blocks[1].id(), BlockId(1));
        assert!(blocks.iter().all(|b| b.couplings().is_empty()));
    }

    #[test]
    fn hard_pair_shares_block() {
        let f = named(&["A", "B"]);
        let blocks = build(&f, &[hard(0, 1)]).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].label(), "A + B");
        assert_eq!(blocks[0].couplings(), &[hard(0, 1)]);
    }

    #[test]
    fn weak_chain_orders_sources_first() {
        // Registration order A, B, C; dependencies C -> B -> A.
        let f = named(&["A", "B", "C"]);
        let blocks = build(&f, &[weak(2, 1), weak(1, 0)]).unwrap();
        assert_eq!(labels(&blocks), vec!["C", "B", "A"]);
    }

    #[test]
    fn hard_three_cycle_is_one_block() {
        let f = named(&["A", "B", "C", "D"]);
        let blocks = build(&f, &[hard(0, 1), hard(1, 2), hard(2, 0)]).unwrap();
        assert_eq!(labels(&blocks), vec!["A + B + C", "D"]);
        assert_eq!(blocks[0].couplings().len(), 3);
    }

    #[test]
    fn hard_group_waits_for_external_weak_source() {
        // A depends weakly on D, and A is hard-linked to B through C. B has
        // no weak input of its own, but its hard group does, so D goes first.
        let f = named(&["A", "B", "C", "D"]);
        let blocks = build(&f, &[weak(3, 0), hard(1, 2), hard(2, 0)]).unwrap();
        assert_eq!(labels(&blocks), vec!["D", "A + B + C"]);
    }

    #[test]
    fn weak_coupling_inside_hard_group_is_not_a_cycle() {
        let f = named(&["A", "B"]);
        let blocks = build(&f, &[hard(0, 1), weak(1, 0)]).unwrap();
        assert_eq!(labels(&blocks), vec!["A + B"]);
    }

    #[test]
    fn weak_cycle_is_an_error() {
        let f = named(&["A", "B", "C"]);
        match build(&f, &[weak(0, 1), weak(1, 2), weak(2, 0)]) {
            Err(BlockError::CouplingDependency(e)) => {
                assert_eq!(e.unresolved, vec![FieldId(0), FieldId(1), FieldId(2)]);
                assert_eq!(e.to_string(), "weak couplings form a cycle among fields: A, B, C");
            }
            other => panic!("expected CouplingDependency, got {other:?}"),
        }
    }

    #[test]
    fn cycle_error_lists_only_unscheduled_fields() {
        let f = named(&["free", "B", "C"]);
        match build(&f, &[weak(1, 2), weak(2, 1)]) {
            Err(BlockError::CouplingDependency(e)) => {
                assert_eq!(e.names, vec!["B", "C"]);
            }
            other => panic!("expected CouplingDependency, got {other:?}"),
        }
    }

    #[test]
    fn self_and_undefined_couplings_rejected() {
        let f = named(&["A"]);
        assert_eq!(
            build(&f, &[hard(0, 0)]),
            Err(BlockError::SelfCoupling { field: FieldId(0) })
        );
        assert_eq!(
            build(&f, &[weak(0, 5)]),
            Err(BlockError::UndefinedField {
                source_field: FieldId(0),
                target_field: FieldId(5),
                missing: FieldId(5),
            })
        );
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut f = named(&["A"]);
        f.push(f[0].clone());
        assert_eq!(
            build(&f, &[]),
            Err(BlockError::DuplicateField { field: FieldId(0) })
        );
    }

    // ── Properties ─────────────────────────────────────────────

    /// Up to 8 fields with arbitrary couplings; one coupling per direction.
    fn arb_problem() -> impl Strategy<Value = (usize, Vec<CouplingDescriptor>)> {
        (1usize..=8).prop_flat_map(|n| {
            let edge = (0..n as u32, 0..n as u32, any::<bool>());
            (
                Just(n),
                prop::collection::vec(edge, 0..12).prop_map(|edges| {
                    let mut seen = Vec::new();
                    let mut out = Vec::new();
                    for (s, t, is_hard) in edges {
                        if s == t || seen.contains(&(s, t)) {
                            continue;
                        }
                        seen.push((s, t));
                        out.push(if is_hard { hard(s, t) } else { weak(s, t) });
                    }
                    out
                }),
            )
        })
    }

    /// `arb_problem` with the fields registered in random order.
    fn arb_shuffled_problem(
    ) -> impl Strategy<Value = (Vec<(FieldId, FieldDescriptor)>, Vec<CouplingDescriptor>)> {
        arb_problem().prop_flat_map(|(n, couplings)| {
            (Just(fields_of(n)).prop_shuffle(), Just(couplings))
        })
    }

    fn fields_of(n: usize) -> Vec<(FieldId, FieldDescriptor)> {
        (0..n)
            .map(|i| {
                (
                    FieldId(i as u32),
                    FieldDescriptor::new(format!("f{i}"), FieldKind::General),
                )
            })
            .collect()
    }

    proptest! {
        #[test]
        fn no_couplings_one_block_per_field(n in 0usize..16) {
            let f = fields_of(n);
            let blocks = build(&f, &[]).unwrap();
            prop_assert_eq!(blocks.len(), n);
            for (i, b) in blocks.iter().enumerate() {
                prop_assert_eq!(b.field_ids(), vec![FieldId(i as u32)]);
            }
        }

        #[test]
        fn blocks_partition_fields((n, couplings) in arb_problem()) {
            let f = fields_of(n);
            if let Ok(blocks) = build(&f, &couplings) {
                let mut seen = FieldSet::empty();
                for b in &blocks {
                    prop_assert!(!b.is_empty());
                    for id in b.field_ids() {
                        prop_assert!(seen.insert(id), "field {} in two blocks", id);
                    }
                }
                prop_assert_eq!(seen.len(), n);
            }
        }

        #[test]
        fn hard_endpoints_share_block((f, couplings) in arb_shuffled_problem()) {
            let hard_only: Vec<_> = couplings.iter().copied().filter(|c| c.is_hard()).collect();
            let mut built = vec![build(&f, &hard_only).unwrap()];
            built.extend(build(&f, &couplings).ok());
            for blocks in &built {
                for c in &hard_only {
                    let home = blocks.iter().position(|b| b.contains(c.source));
                    prop_assert!(home.is_some());
                    prop_assert_eq!(home, blocks.iter().position(|b| b.contains(c.target)));
                }
            }
        }

        #[test]
        fn weak_sources_never_come_later((n, couplings) in arb_problem()) {
            let f = fields_of(n);
            if let Ok(blocks) = build(&f, &couplings) {
                for c in couplings.iter().filter(|c| c.is_weak()) {
                    let s = blocks.iter().position(|b| b.contains(c.source));
                    let t = blocks.iter().position(|b| b.contains(c.target));
                    prop_assert!(s <= t);
                }
            }
        }

        #[test]
        fn forward_weak_couplings_always_build((n, couplings) in arb_problem()) {
            let acyclic: Vec<_> = couplings
                .into_iter()
                .filter(|c| c.is_weak() && c.source < c.target)
                .collect();
            let f = fields_of(n);
            prop_assert!(build(&f, &acyclic).is_ok());
        }

        #[test]
        fn hard_only_always_builds((n, couplings) in arb_problem()) {
            let hard_only: Vec<_> = couplings.into_iter().filter(|c| c.is_hard()).collect();
            let f = fields_of(n);
            prop_assert!(build(&f, &hard_only).is_ok());
        }

        #[test]
        fn deterministic((n, couplings) in arb_problem()) {
            let f = fields_of(n);
            prop_assert_eq!(build(&f, &couplings), build(&f, &couplings));
        }
    }
}
