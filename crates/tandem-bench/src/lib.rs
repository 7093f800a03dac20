//! Benchmark profiles for Tandem.
//!
//! - [`weak_chain`]: `n` fields linked by forward weak couplings
//! - [`mixed_profile`]: hard-coupled pairs plus pseudo-random forward weak couplings
//! - [`transient_problem`]: one transient field and `n` steady followers

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use tandem_core::{
    AnalysisType, CouplingDescriptor, CouplingStrength, FieldDescriptor, FieldId, FieldKind,
};
use tandem_engine::{Problem, ProblemConfig};

/// Fields with their IDs, in registration order.
pub type FieldList = Vec<(FieldId, FieldDescriptor)>;

/// `n` steady fields where field `i` feeds field `i + 1` weakly.
///
/// Couplings are listed target-first so the builder has to search.
pub fn weak_chain(n: u32) -> (FieldList, Vec<CouplingDescriptor>) {
    let fields = (0..n)
        .map(|i| (FieldId(i), FieldDescriptor::new(format!("f{i}"), FieldKind::General)))
        .collect();
    let couplings = (1..n)
        .rev()
        .map(|i| CouplingDescriptor::new(FieldId(i - 1), FieldId(i), CouplingStrength::Weak))
        .collect();
    (fields, couplings)
}

/// `2 * pairs` fields: each even/odd pair is hard-coupled, and every pair
/// receives up to two weak couplings from earlier fields chosen by `seed`.
pub fn mixed_profile(pairs: u32, seed: u64) -> (FieldList, Vec<CouplingDescriptor>) {
    let n = 2 * pairs;
    let fields = (0..n)
        .map(|i| (FieldId(i), FieldDescriptor::new(format!("f{i}"), FieldKind::General)))
        .collect();

    let mut couplings = Vec::new();
    for p in 0..pairs {
        let (a, b) = (2 * p, 2 * p + 1);
        couplings.push(CouplingDescriptor::new(
            FieldId(a),
            FieldId(b),
            CouplingStrength::Hard,
        ));
        if a == 0 {
            continue;
        }
        for k in 0..2u64 {
            // Deterministic pseudo-random earlier source.
            let h = (seed ^ ((u64::from(p) << 1) | k)).wrapping_mul(6364136223846793007);
            let source = (h >> 33) % u64::from(a);
            couplings.push(CouplingDescriptor::new(
                FieldId(source as u32),
                FieldId(a + (k as u32)),
                CouplingStrength::Weak,
            ));
        }
    }
    couplings.sort_by_key(|c| (c.source, c.target));
    couplings.dedup_by_key(|c| (c.source, c.target));
    (fields, couplings)
}

/// A transient heat field followed by `followers` steady elasticity
/// fields, with `steps` fixed time steps of length 1.
pub fn transient_problem(cache_dir: &Path, followers: u32, steps: u32) -> Problem {
    let config = ProblemConfig {
        total_time: f64::from(steps),
        initial_time_step: 1.0,
        cache_dir: cache_dir.to_path_buf(),
        ..Default::default()
    };
    let mut problem = match Problem::new(config) {
        Ok(p) => p,
        Err(e) => panic!("benchmark configuration rejected: {e}"),
    };
    let heat = FieldDescriptor::new("T", FieldKind::Heat).with_analysis(AnalysisType::Transient);
    let fields = std::iter::once(heat).chain(
        (0..followers).map(|i| FieldDescriptor::new(format!("u{i}"), FieldKind::Elasticity)),
    );
    problem.edit(|batch| {
        for f in fields {
            if let Err(e) = batch.add(f) {
                panic!("benchmark field rejected: {e}");
            }
        }
    });
    problem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_profile_is_deterministic_and_forward() {
        let (fields, a) = mixed_profile(32, 7);
        let (_, b) = mixed_profile(32, 7);
        assert_eq!(fields.len(), 64);
        assert_eq!(a, b);
        assert!(a.iter().all(|c| c.source < c.target));
    }

    #[test]
    fn weak_chain_links_neighbours() {
        let (fields, couplings) = weak_chain(4);
        assert_eq!(fields.len(), 4);
        assert_eq!(couplings.len(), 3);
        assert_eq!(couplings[0].target, FieldId(3));
    }

    #[test]
    fn transient_problem_shape() {
        let dir = std::env::temp_dir();
        let p = transient_problem(&dir, 3, 10);
        assert_eq!(p.fields().len(), 4);
        assert_eq!(p.num_transient_fields(), 1);
        assert_eq!(p.couplings().couplings().len(), 3);
    }
}
