//! Couplings between fields and the registry that derives them.
//!
//! A [`CouplingRegistry`] owns two things: a table of [`CouplingRule`]s
//! keyed by (source kind, target kind), and the current list of
//! [`CouplingDescriptor`]s derived from that table for the registered
//! fields. The list is never edited directly; it is recomputed by
//! [`CouplingRegistry::synchronize`] whenever the field set changes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CouplingError;
use crate::field::{AnalysisType, FieldDescriptor, FieldKind};
use crate::id::FieldId;

/// How tightly two coupled fields must be solved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouplingStrength {
    /// The target is solved after the source; ordering dependency only.
    Weak,
    /// Both fields are assembled and solved jointly in one block.
    Hard,
}

/// A directed coupling between two registered fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouplingDescriptor {
    /// Field whose solution feeds the target.
    pub source: FieldId,
    /// Field that consumes the source's solution.
    pub target: FieldId,
    /// Coupling strength.
    pub strength: CouplingStrength,
}

impl CouplingDescriptor {
    /// Create a descriptor.
    pub fn new(source: FieldId, target: FieldId, strength: CouplingStrength) -> Self {
        Self {
            source,
            target,
            strength,
        }
    }

    /// `true` for [`CouplingStrength::Hard`].
    pub fn is_hard(&self) -> bool {
        self.strength == CouplingStrength::Hard
    }

    /// `true` for [`CouplingStrength::Weak`].
    pub fn is_weak(&self) -> bool {
        self.strength == CouplingStrength::Weak
    }

    /// `true` if `field` is either endpoint.
    pub fn is_related(&self, field: FieldId) -> bool {
        self.source == field || self.target == field
    }
}

/// Which couplings are available between two field kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CouplingRule {
    /// Source kind.
    pub source: FieldKind,
    /// Target kind.
    pub target: FieldKind,
    /// Strength used unless overridden per field pair.
    pub default: CouplingStrength,
    /// Whether a per-pair override may select [`CouplingStrength::Weak`].
    pub weak_allowed: bool,
    /// Whether a per-pair override may select [`CouplingStrength::Hard`].
    pub hard_allowed: bool,
}

impl CouplingRule {
    /// Weak by default; hard only if `hard_allowed`.
    pub const fn weak(source: FieldKind, target: FieldKind, hard_allowed: bool) -> Self {
        Self {
            source,
            target,
            default: CouplingStrength::Weak,
            weak_allowed: true,
            hard_allowed,
        }
    }

    /// Hard by default; weak only if `weak_allowed`.
    pub const fn hard(source: FieldKind, target: FieldKind, weak_allowed: bool) -> Self {
        Self {
            source,
            target,
            default: CouplingStrength::Hard,
            weak_allowed,
            hard_allowed: true,
        }
    }

    /// Whether this rule permits `strength`.
    pub fn allows(&self, strength: CouplingStrength) -> bool {
        match strength {
            CouplingStrength::Weak => self.weak_allowed,
            CouplingStrength::Hard => self.hard_allowed,
        }
    }
}

/// Built-in coupling table.
pub const DEFAULT_RULES: [CouplingRule; 5] = [
    CouplingRule::weak(FieldKind::Current, FieldKind::Heat, true),
    CouplingRule::weak(FieldKind::Magnetic, FieldKind::Heat, true),
    CouplingRule::weak(FieldKind::Heat, FieldKind::Elasticity, false),
    CouplingRule::weak(FieldKind::Electrostatic, FieldKind::Elasticity, false),
    CouplingRule::hard(FieldKind::Flow, FieldKind::Heat, true),
];

/// Coupling rules plus the couplings currently derived from them.
#[derive(Clone, Debug)]
pub struct CouplingRegistry {
    rules: IndexMap<(FieldKind, FieldKind), CouplingRule>,
    overrides: IndexMap<(FieldId, FieldId), CouplingStrength>,
    members: IndexMap<FieldId, (FieldKind, AnalysisType)>,
    couplings: Vec<CouplingDescriptor>,
}

impl Default for CouplingRegistry {
    fn default() -> Self {
        Self::with_rules(DEFAULT_RULES)
    }
}

impl CouplingRegistry {
    /// A registry with no rules; no field pair will ever be coupled.
    pub fn empty() -> Self {
        Self::with_rules([])
    }

    /// A registry with the given rules. Later duplicates replace earlier ones.
    pub fn with_rules(rules: impl IntoIterator<Item = CouplingRule>) -> Self {
        let mut registry = Self {
            rules: IndexMap::new(),
            overrides: IndexMap::new(),
            members: IndexMap::new(),
            couplings: Vec::new(),
        };
        for rule in rules {
            registry.add_rule(rule);
        }
        registry
    }

    /// Install a rule, returning the one it replaced.
    ///
    /// Takes effect at the next [`synchronize`](Self::synchronize).
    pub fn add_rule(&mut self, rule: CouplingRule) -> Option<CouplingRule> {
        self.rules.insert((rule.source, rule.target), rule)
    }

    /// The rule for a kind pair, if any.
    pub fn rule(&self, source: FieldKind, target: FieldKind) -> Option<&CouplingRule> {
        self.rules.get(&(source, target))
    }

    /// Current couplings, source-major in field registration order.
    pub fn couplings(&self) -> &[CouplingDescriptor] {
        &self.couplings
    }

    /// Whether a coupling `source -> target` exists, and its strength.
    pub fn coupling(&self, source: FieldId, target: FieldId) -> Option<CouplingStrength> {
        self.couplings
            .iter()
            .find(|c| c.source == source && c.target == target)
            .map(|c| c.strength)
    }

    /// Override the strength of an existing coupling.
    ///
    /// The override survives resynchronization for as long as both
    /// fields stay registered. Hard couplings additionally require both
    /// fields to share an analysis type.
    pub fn set_strength(
        &mut self,
        source: FieldId,
        target: FieldId,
        strength: CouplingStrength,
    ) -> Result<(), CouplingError> {
        let idx = self
            .couplings
            .iter()
            .position(|c| c.source == source && c.target == target)
            .ok_or(CouplingError::UnknownCoupling {
                source_field: source,
                target_field: target,
            })?;
        let (Some(&(source_kind, source_analysis)), Some(&(target_kind, target_analysis))) =
            (self.members.get(&source), self.members.get(&target))
        else {
            return Err(CouplingError::UnknownCoupling {
                source_field: source,
                target_field: target,
            });
        };
        let rule = self.rule(source_kind, target_kind).ok_or(CouplingError::NoRule {
            source_kind,
            target_kind,
        })?;
        let mixed = source_analysis != target_analysis;
        if !rule.allows(strength) || (strength == CouplingStrength::Hard && mixed) {
            return Err(CouplingError::StrengthNotAllowed {
                source_kind,
                target_kind,
                strength,
            });
        }
        self.overrides.insert((source, target), strength);
        self.couplings[idx].strength = strength;
        Ok(())
    }

    /// Recompute the coupling list for the given fields.
    ///
    /// Adds couplings that became available and drops those whose fields
    /// are gone. Returns `true` if the list changed.
    pub fn synchronize<'a, I>(&mut self, fields: I) -> bool
    where
        I: IntoIterator<Item = (FieldId, &'a FieldDescriptor)>,
    {
        self.members = fields
            .into_iter()
            .map(|(id, f)| (id, (f.kind(), f.analysis())))
            .collect();
        let members = &self.members;
        self.overrides
            .retain(|(s, t), _| members.contains_key(s) && members.contains_key(t));

        let mut next = Vec::new();
        for (&source, &(source_kind, source_analysis)) in &self.members {
            for (&target, &(target_kind, target_analysis)) in &self.members {
                if source == target {
                    continue;
                }
                let Some(rule) = self.rules.get(&(source_kind, target_kind)) else {
                    continue;
                };
                let wanted = self
                    .overrides
                    .get(&(source, target))
                    .copied()
                    .filter(|s| rule.allows(*s))
                    .unwrap_or(rule.default);
                let strength = if wanted == CouplingStrength::Hard
                    && source_analysis != target_analysis
                {
                    if !rule.weak_allowed {
                        continue;
                    }
                    CouplingStrength::Weak
                } else {
                    wanted
                };
                next.push(CouplingDescriptor::new(source, target, strength));
            }
        }

        let changed = next != self.couplings;
        self.couplings = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(specs: &[(&str, FieldKind, AnalysisType)]) -> Vec<(FieldId, FieldDescriptor)> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (name, kind, analysis))| {
                (
                    FieldId(i as u32),
                    FieldDescriptor::new(*name, *kind).with_analysis(*analysis),
                )
            })
            .collect()
    }

    fn sync(reg: &mut CouplingRegistry, f: &[(FieldId, FieldDescriptor)]) -> bool {
        reg.synchronize(f.iter().map(|(id, d)| (*id, d)))
    }

    #[test]
    fn uncoupled_kinds_produce_nothing() {
        let mut reg = CouplingRegistry::default();
        let f = fields(&[
            ("a", FieldKind::General, AnalysisType::Steady),
            ("b", FieldKind::Electrostatic, AnalysisType::Steady),
        ]);
        assert!(!sync(&mut reg, &f));
        assert!(reg.couplings().is_empty());
    }

    #[test]
    fn default_rule_applies_in_direction() {
        let mut reg = CouplingRegistry::default();
        let f = fields(&[
            ("T", FieldKind::Heat, AnalysisType::Steady),
            ("J", FieldKind::Current, AnalysisType::Steady),
        ]);
        assert!(sync(&mut reg, &f));
        assert_eq!(reg.coupling(FieldId(1), FieldId(0)), Some(CouplingStrength::Weak));
        assert_eq!(reg.coupling(FieldId(0), FieldId(1)), None);
    }

    #[test]
    fn hard_default_degrades_to_weak_across_analysis_types() {
        let mut reg = CouplingRegistry::default();
        let f = fields(&[
            ("v", FieldKind::Flow, AnalysisType::Steady),
            ("T", FieldKind::Heat, AnalysisType::Transient),
        ]);
        sync(&mut reg, &f);
        assert_eq!(reg.coupling(FieldId(0), FieldId(1)), Some(CouplingStrength::Weak));

        let f = fields(&[
            ("v", FieldKind::Flow, AnalysisType::Steady),
            ("T", FieldKind::Heat, AnalysisType::Steady),
        ]);
        sync(&mut reg, &f);
        assert_eq!(reg.coupling(FieldId(0), FieldId(1)), Some(CouplingStrength::Hard));
    }

    #[test]
    fn override_survives_resync_and_dies_with_field() {
        let mut reg = CouplingRegistry::default();
        let mut f = fields(&[
            ("J", FieldKind::Current, AnalysisType::Steady),
            ("T", FieldKind::Heat, AnalysisType::Steady),
        ]);
        sync(&mut reg, &f);
        reg.set_strength(FieldId(0), FieldId(1), CouplingStrength::Hard)
            .unwrap();
        assert!(!sync(&mut reg, &f));
        assert_eq!(reg.coupling(FieldId(0), FieldId(1)), Some(CouplingStrength::Hard));

        f.pop();
        assert!(sync(&mut reg, &f));
        assert!(reg.couplings().is_empty());

        // Re-adding the heat field under a fresh ID starts from the default.
        f.push((FieldId(2), FieldDescriptor::new("T", FieldKind::Heat)));
        sync(&mut reg, &f);
        assert_eq!(reg.coupling(FieldId(0), FieldId(2)), Some(CouplingStrength::Weak));
    }

    #[test]
    fn forbidden_override_rejected() {
        let mut reg = CouplingRegistry::default();
        let f = fields(&[
            ("T", FieldKind::Heat, AnalysisType::Steady),
            ("u", FieldKind::Elasticity, AnalysisType::Steady),
        ]);
        sync(&mut reg, &f);
        match reg.set_strength(FieldId(0), FieldId(1), CouplingStrength::Hard) {
            Err(CouplingError::StrengthNotAllowed { strength, .. }) => {
                assert_eq!(strength, CouplingStrength::Hard);
            }
            other => panic!("expected StrengthNotAllowed, got {other:?}"),
        }
        assert!(matches!(
            reg.set_strength(FieldId(1), FieldId(0), CouplingStrength::Weak),
            Err(CouplingError::UnknownCoupling { .. })
        ));
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let mut reg = CouplingRegistry::empty();
        assert!(reg
            .add_rule(CouplingRule::hard(FieldKind::General, FieldKind::General, false))
            .is_none());
        let f = fields(&[
            ("a", FieldKind::General, AnalysisType::Steady),
            ("b", FieldKind::General, AnalysisType::Steady),
        ]);
        sync(&mut reg, &f);
        // Both directions match the same-kind rule.
        assert_eq!(reg.couplings().len(), 2);
        assert!(reg.couplings().iter().all(|c| c.is_hard()));
    }
}
