//! Field kinds, field descriptors, and the [`FieldSet`] bitset.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FieldError;
use crate::id::FieldId;

// ── FieldKind ──────────────────────────────────────────────────────

/// The physical phenomenon a field models.
///
/// This is a closed set: adding new physics means adding a variant and
/// extending the capability tables below, not subclassing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Generic scalar PDE (Poisson/Helmholtz style).
    General,
    /// Electrostatic potential.
    Electrostatic,
    /// Magnetic vector potential.
    Magnetic,
    /// Heat transfer.
    Heat,
    /// Steady current flow in conductors.
    Current,
    /// Linear elasticity.
    Elasticity,
    /// Incompressible flow.
    Flow,
}

impl FieldKind {
    /// Every kind, in declaration order.
    pub const ALL: [FieldKind; 7] = [
        Self::General,
        Self::Electrostatic,
        Self::Magnetic,
        Self::Heat,
        Self::Current,
        Self::Elasticity,
        Self::Flow,
    ];

    /// Stable lowercase identifier.
    pub fn id(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Electrostatic => "electrostatic",
            Self::Magnetic => "magnetic",
            Self::Heat => "heat",
            Self::Current => "current",
            Self::Elasticity => "elasticity",
            Self::Flow => "flow",
        }
    }

    /// Whether this kind can be solved with the given analysis type.
    pub fn supports(self, analysis: AnalysisType) -> bool {
        use AnalysisType::*;
        match self {
            Self::General | Self::Magnetic => true,
            Self::Heat | Self::Flow => matches!(analysis, Steady | Transient),
            Self::Electrostatic | Self::Current | Self::Elasticity => analysis == Steady,
        }
    }

    /// Whether the engine can refine the space of this kind adaptively.
    pub fn supports_adaptivity(self) -> bool {
        !matches!(self, Self::Flow)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ── Analysis / adaptivity / linearity ──────────────────────────────

/// Time dependence of a field's solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// Time-independent.
    Steady,
    /// Marched through the simulation clock.
    Transient,
    /// Time-harmonic (complex amplitude at a fixed frequency).
    Harmonic,
}

/// Space-adaptivity mode of a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptivityType {
    /// No refinement.
    #[default]
    None,
    /// Element subdivision.
    H,
    /// Polynomial order increase.
    P,
    /// Combined subdivision and order increase.
    Hp,
}

impl AdaptivityType {
    /// Returns `true` for every mode except [`AdaptivityType::None`].
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }
}

/// Linearization strategy handed to the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearityType {
    /// Single linear solve.
    #[default]
    Linear,
    /// Fixed-point (Picard) iteration.
    Picard,
    /// Newton iteration.
    Newton,
}

// ── FieldDescriptor ────────────────────────────────────────────────

/// Highest polynomial order accepted by [`FieldDescriptor::validate`].
pub const MAX_POLYNOMIAL_ORDER: u32 = 10;

/// Discretization and analysis settings of one field.
///
/// Descriptors are owned by the [`FieldRegistry`](crate::FieldRegistry)
/// once registered; afterwards they change only through the registry's
/// `modify` entry points so that observers are notified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    analysis: AnalysisType,
    adaptivity: AdaptivityType,
    adaptivity_steps: u32,
    adaptivity_tolerance: f64,
    time_skip: f64,
    polynomial_order: u32,
    linearity: LinearityType,
}

impl FieldDescriptor {
    /// A steady, linear, non-adaptive field of order 2.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            analysis: AnalysisType::Steady,
            adaptivity: AdaptivityType::None,
            adaptivity_steps: 10,
            adaptivity_tolerance: 1.0,
            time_skip: 0.0,
            polynomial_order: 2,
            linearity: LinearityType::Linear,
        }
    }

    /// Builder-style [`set_analysis`](Self::set_analysis).
    pub fn with_analysis(mut self, analysis: AnalysisType) -> Self {
        self.analysis = analysis;
        self
    }

    /// Builder-style [`set_adaptivity`](Self::set_adaptivity).
    pub fn with_adaptivity(mut self, adaptivity: AdaptivityType, steps: u32) -> Self {
        self.set_adaptivity(adaptivity, steps);
        self
    }

    /// Builder-style [`set_time_skip`](Self::set_time_skip).
    pub fn with_time_skip(mut self, time_skip: f64) -> Self {
        self.time_skip = time_skip;
        self
    }

    /// Builder-style [`set_polynomial_order`](Self::set_polynomial_order).
    pub fn with_polynomial_order(mut self, order: u32) -> Self {
        self.polynomial_order = order;
        self
    }

    /// Builder-style [`set_linearity`](Self::set_linearity).
    pub fn with_linearity(mut self, linearity: LinearityType) -> Self {
        self.linearity = linearity;
        self
    }

    /// Field name, unique within a problem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Analysis type.
    pub fn analysis(&self) -> AnalysisType {
        self.analysis
    }

    /// Space-adaptivity mode.
    pub fn adaptivity(&self) -> AdaptivityType {
        self.adaptivity
    }

    /// Upper bound on adaptivity steps per time step.
    pub fn adaptivity_steps(&self) -> u32 {
        self.adaptivity_steps
    }

    /// Relative error target in percent, passed through to the engine.
    pub fn adaptivity_tolerance(&self) -> f64 {
        self.adaptivity_tolerance
    }

    /// Minimum simulation time between two solves of this field when it
    /// is not itself transient.
    pub fn time_skip(&self) -> f64 {
        self.time_skip
    }

    /// Polynomial order of the initial space.
    pub fn polynomial_order(&self) -> u32 {
        self.polynomial_order
    }

    /// Linearization strategy.
    pub fn linearity(&self) -> LinearityType {
        self.linearity
    }

    /// `true` if the analysis type is [`AnalysisType::Transient`].
    pub fn is_transient(&self) -> bool {
        self.analysis == AnalysisType::Transient
    }

    /// `true` if space adaptivity is enabled.
    pub fn is_adaptive(&self) -> bool {
        self.adaptivity.is_enabled()
    }

    /// `true` for Picard or Newton linearization.
    pub fn is_nonlinear(&self) -> bool {
        self.linearity != LinearityType::Linear
    }

    /// Set the analysis type.
    pub fn set_analysis(&mut self, analysis: AnalysisType) {
        self.analysis = analysis;
    }

    /// Set the adaptivity mode and its step bound.
    pub fn set_adaptivity(&mut self, adaptivity: AdaptivityType, steps: u32) {
        self.adaptivity = adaptivity;
        self.adaptivity_steps = steps;
    }

    /// Set the adaptivity error target (percent).
    pub fn set_adaptivity_tolerance(&mut self, tolerance: f64) {
        self.adaptivity_tolerance = tolerance;
    }

    /// Set the time-skip duration.
    pub fn set_time_skip(&mut self, time_skip: f64) {
        self.time_skip = time_skip;
    }

    /// Set the polynomial order.
    pub fn set_polynomial_order(&mut self, order: u32) {
        self.polynomial_order = order;
    }

    /// Set the linearization strategy.
    pub fn set_linearity(&mut self, linearity: LinearityType) {
        self.linearity = linearity;
    }

    /// Check the descriptor for settings the engine cannot honor.
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.name.trim().is_empty() {
            return Err(FieldError::EmptyName);
        }
        if !self.kind.supports(self.analysis) {
            return Err(FieldError::UnsupportedAnalysis {
                field: self.name.clone(),
                kind: self.kind,
                analysis: self.analysis,
            });
        }
        if self.polynomial_order == 0 || self.polynomial_order > MAX_POLYNOMIAL_ORDER {
            return Err(FieldError::PolynomialOrder {
                field: self.name.clone(),
                order: self.polynomial_order,
            });
        }
        if !self.time_skip.is_finite() || self.time_skip < 0.0 {
            return Err(FieldError::InvalidTimeSkip {
                field: self.name.clone(),
                value: self.time_skip,
            });
        }
        if self.is_adaptive() {
            if !self.kind.supports_adaptivity() {
                return Err(FieldError::UnsupportedAdaptivity {
                    field: self.name.clone(),
                    kind: self.kind,
                });
            }
            if self.adaptivity_steps == 0 {
                return Err(FieldError::ZeroAdaptivitySteps {
                    field: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

// ── FieldSet ───────────────────────────────────────────────────────

/// A set of field IDs implemented as a growable bitset.
///
/// Used for block membership and for the assigned/unassigned bookkeeping
/// of the block builder.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    words: Vec<u64>,
}

impl FieldSet {
    const WORD: usize = 64;

    /// Create an empty field set.
    pub fn empty() -> Self {
        Self { words: Vec::new() }
    }

    fn locate(field: FieldId) -> (usize, u64) {
        let idx = field.0 as usize;
        (idx / Self::WORD, 1u64 << (idx % Self::WORD))
    }

    /// Insert a field. Returns `true` if it was not already present.
    pub fn insert(&mut self, field: FieldId) -> bool {
        let (word, mask) = Self::locate(field);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Remove a field. Returns `true` if it was present.
    pub fn remove(&mut self, field: FieldId) -> bool {
        let (word, mask) = Self::locate(field);
        match self.words.get_mut(word) {
            Some(w) if *w & mask != 0 => {
                *w &= !mask;
                true
            }
            _ => false,
        }
    }

    /// Check whether the set contains a field.
    pub fn contains(&self, field: FieldId) -> bool {
        let (word, mask) = Self::locate(field);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Returns `true` if the two sets share no field.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.words.iter().zip(&other.words).all(|(a, b)| a & b == 0)
    }

    /// Returns `true` if the set contains no fields.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns the number of fields in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the field IDs in ascending order.
    pub fn iter(&self) -> FieldSetIter<'_> {
        FieldSetIter {
            words: &self.words,
            next: 0,
        }
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        let n = self.words.len().max(other.words.len());
        (0..n).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for FieldSet {}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = FieldId;
    type IntoIter = FieldSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`FieldSet`], yielding IDs in ascending order.
pub struct FieldSetIter<'a> {
    words: &'a [u64],
    next: usize,
}

impl Iterator for FieldSetIter<'_> {
    type Item = FieldId;

    fn next(&mut self) -> Option<Self::Item> {
        let limit = self.words.len() * FieldSet::WORD;
        while self.next < limit {
            let idx = self.next;
            self.next += 1;
            if self.words[idx / FieldSet::WORD] & (1u64 << (idx % FieldSet::WORD)) != 0 {
                return Some(FieldId(idx as u32));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ── descriptor ─────────────────────────────────────────────

    #[test]
    fn default_descriptor_is_valid_and_steady() {
        let f = FieldDescriptor::new("temperature", FieldKind::Heat);
        assert!(f.validate().is_ok());
        assert!(!f.is_transient());
        assert!(!f.is_adaptive());
        assert_eq!(f.polynomial_order(), 2);
    }

    #[test]
    fn electrostatic_rejects_transient() {
        let f = FieldDescriptor::new("phi", FieldKind::Electrostatic)
            .with_analysis(AnalysisType::Transient);
        match f.validate() {
            Err(FieldError::UnsupportedAnalysis { kind, analysis, .. }) => {
                assert_eq!(kind, FieldKind::Electrostatic);
                assert_eq!(analysis, AnalysisType::Transient);
            }
            other => panic!("expected UnsupportedAnalysis, got {other:?}"),
        }
    }

    #[test]
    fn polynomial_order_bounds() {
        let zero = FieldDescriptor::new("a", FieldKind::General).with_polynomial_order(0);
        assert!(matches!(zero.validate(), Err(FieldError::PolynomialOrder { order: 0, .. })));
        let high = FieldDescriptor::new("a", FieldKind::General)
            .with_polynomial_order(MAX_POLYNOMIAL_ORDER + 1);
        assert!(high.validate().is_err());
        let max = FieldDescriptor::new("a", FieldKind::General)
            .with_polynomial_order(MAX_POLYNOMIAL_ORDER);
        assert!(max.validate().is_ok());
    }

    #[test]
    fn negative_or_nan_time_skip_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let f = FieldDescriptor::new("a", FieldKind::Heat).with_time_skip(bad);
            assert!(
                matches!(f.validate(), Err(FieldError::InvalidTimeSkip { .. })),
                "time_skip {bad} accepted"
            );
        }
    }

    #[test]
    fn adaptive_field_needs_steps_and_support() {
        let no_steps =
            FieldDescriptor::new("a", FieldKind::Heat).with_adaptivity(AdaptivityType::H, 0);
        assert!(matches!(no_steps.validate(), Err(FieldError::ZeroAdaptivitySteps { .. })));

        let flow = FieldDescriptor::new("v", FieldKind::Flow).with_adaptivity(AdaptivityType::P, 3);
        assert!(matches!(flow.validate(), Err(FieldError::UnsupportedAdaptivity { .. })));
    }

    #[test]
    fn descriptor_serde_roundtrip() {
        let f = FieldDescriptor::new("A", FieldKind::Magnetic)
            .with_analysis(AnalysisType::Harmonic)
            .with_adaptivity(AdaptivityType::Hp, 4)
            .with_linearity(LinearityType::Newton);
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"harmonic\""));
        let back: FieldDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    // ── field set ──────────────────────────────────────────────

    #[test]
    fn insert_remove_contains() {
        let mut s = FieldSet::empty();
        assert!(s.insert(FieldId(70)));
        assert!(!s.insert(FieldId(70)));
        assert!(s.contains(FieldId(70)));
        assert!(!s.contains(FieldId(3)));
        assert!(s.remove(FieldId(70)));
        assert!(!s.remove(FieldId(70)));
        assert!(s.is_empty());
    }

    #[test]
    fn iter_is_ascending() {
        let s: FieldSet = [FieldId(65), FieldId(2), FieldId(0)].into_iter().collect();
        let ids: Vec<u32> = s.iter().map(|f| f.0).collect();
        assert_eq!(ids, vec![0, 2, 65]);
    }

    fn arb_field_set() -> impl Strategy<Value = FieldSet> {
        prop::collection::vec(0u32..160, 0..32)
            .prop_map(|ids| ids.into_iter().map(FieldId).collect::<FieldSet>())
    }

    proptest! {
        #[test]
        fn disjoint_iff_no_shared_member(a in arb_field_set(), b in arb_field_set()) {
            prop_assert_eq!(a.is_disjoint(&b), !a.iter().any(|f| b.contains(f)));
        }

        #[test]
        fn len_matches_iter(a in arb_field_set()) {
            prop_assert_eq!(a.len(), a.iter().count());
        }
    }
}
