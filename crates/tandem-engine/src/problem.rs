//! The problem model: fields, couplings, and configuration.

use crossbeam_channel::Receiver;
use serde::Serialize;
use tandem_core::{
    AnalysisType, BatchUpdate, CouplingDescriptor, CouplingError, CouplingRegistry,
    CouplingStrength, FieldDescriptor, FieldError, FieldId, FieldRegistry, RegistryEvent,
};

use crate::config::{ConfigError, ProblemConfig, TimeStepMethod};

/// Fields, their derived couplings, and session configuration.
///
/// Couplings are resynchronized after every field edit, so
/// [`couplings`](Self::couplings) always reflects the current field set.
#[derive(Debug)]
pub struct Problem {
    fields: FieldRegistry,
    couplings: CouplingRegistry,
    config: ProblemConfig,
}

/// Serializable view of a [`Problem`], written to the session cache.
#[derive(Clone, Debug, Serialize)]
pub struct ProblemSnapshot {
    /// Configuration.
    pub config: ProblemConfig,
    /// Registered fields in registration order.
    pub fields: Vec<(FieldId, FieldDescriptor)>,
    /// Current couplings.
    pub couplings: Vec<CouplingDescriptor>,
}

impl Problem {
    /// An empty problem using the built-in coupling rules.
    pub fn new(config: ProblemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fields: FieldRegistry::new(),
            couplings: CouplingRegistry::default(),
            config,
        })
    }

    /// Replace the coupling rule table.
    pub fn with_coupling_rules(mut self, couplings: CouplingRegistry) -> Self {
        self.couplings = couplings;
        self.sync();
        self
    }

    /// Configuration.
    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    /// Replace the configuration after validating it.
    pub fn set_config(&mut self, config: ProblemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Registered fields.
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// Coupling rules and current couplings.
    pub fn couplings(&self) -> &CouplingRegistry {
        &self.couplings
    }

    /// Subscribe to field-set changes.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        self.fields.subscribe()
    }

    /// Register a field.
    pub fn add_field(&mut self, field: FieldDescriptor) -> Result<FieldId, FieldError> {
        let id = self.fields.add(field)?;
        self.sync();
        Ok(id)
    }

    /// Remove a field.
    pub fn remove_field(&mut self, id: FieldId) -> Option<FieldDescriptor> {
        let removed = self.fields.remove(id);
        self.sync();
        removed
    }

    /// Edit a field through its setters.
    pub fn modify_field(
        &mut self,
        id: FieldId,
        edit: impl FnOnce(&mut FieldDescriptor),
    ) -> Result<(), FieldError> {
        self.fields.modify(id, edit)?;
        self.sync();
        Ok(())
    }

    /// Run several field edits as one batch.
    ///
    /// Subscribers see a single event and couplings are resynchronized
    /// once at the end.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut BatchUpdate<'_>) -> R) -> R {
        let out = {
            let mut batch = self.fields.batch();
            f(&mut batch)
        };
        self.sync();
        out
    }

    /// Override the strength of an existing coupling.
    pub fn set_coupling_strength(
        &mut self,
        source: FieldId,
        target: FieldId,
        strength: CouplingStrength,
    ) -> Result<(), CouplingError> {
        self.couplings.set_strength(source, target, strength)
    }

    fn sync(&mut self) -> bool {
        self.couplings.synchronize(self.fields.iter())
    }

    /// Number of transient fields.
    pub fn num_transient_fields(&self) -> usize {
        self.fields.iter().filter(|(_, f)| f.is_transient()).count()
    }

    /// Number of fields with space adaptivity.
    pub fn num_adaptive_fields(&self) -> usize {
        self.fields.iter().filter(|(_, f)| f.is_adaptive()).count()
    }

    /// `true` if any field is transient.
    pub fn is_transient(&self) -> bool {
        self.num_transient_fields() > 0
    }

    /// `true` if any field is time-harmonic.
    pub fn is_harmonic(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, f)| f.analysis() == AnalysisType::Harmonic)
    }

    /// `true` if any field is nonlinear.
    pub fn is_nonlinear(&self) -> bool {
        self.fields.iter().any(|(_, f)| f.is_nonlinear())
    }

    /// Reject feature combinations the solve loop cannot drive.
    pub fn validate_combination(&self) -> Result<(), ConfigError> {
        let transient = self.num_transient_fields();
        let adaptive = self.num_adaptive_fields();
        // 1. One transient field at most.
        if transient > 1 {
            return Err(ConfigError::MultipleTransientFields { count: transient });
        }
        // 2. No space adaptivity in coupled transient problems.
        if self.fields.len() > 1 && transient >= 1 && adaptive >= 1 {
            return Err(ConfigError::TransientCoupledAdaptivity);
        }
        // 3. No space adaptivity together with time adaptivity.
        if transient >= 1
            && self.config.time_step_method == TimeStepMethod::Adaptive
            && adaptive >= 1
        {
            return Err(ConfigError::SpaceAndTimeAdaptivity);
        }
        Ok(())
    }

    /// Capture fields, couplings, and configuration.
    pub fn snapshot(&self) -> ProblemSnapshot {
        ProblemSnapshot {
            config: self.config.clone(),
            fields: self.fields.iter().map(|(id, f)| (id, f.clone())).collect(),
            couplings: self.couplings.couplings().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{AdaptivityType, FieldKind, LinearityType};

    fn problem() -> Problem {
        Problem::new(ProblemConfig::default()).unwrap()
    }

    fn transient_heat() -> FieldDescriptor {
        FieldDescriptor::new("T", FieldKind::Heat).with_analysis(AnalysisType::Transient)
    }

    #[test]
    fn couplings_follow_field_edits() {
        let mut p = problem();
        let t = p.add_field(FieldDescriptor::new("T", FieldKind::Heat)).unwrap();
        let j = p
            .add_field(FieldDescriptor::new("J", FieldKind::Current))
            .unwrap();
        assert_eq!(p.couplings().coupling(j, t), Some(CouplingStrength::Weak));
        p.remove_field(j);
        assert!(p.couplings().couplings().is_empty());
    }

    #[test]
    fn modify_resyncs_hard_coupling() {
        let mut p = problem();
        let v = p.add_field(FieldDescriptor::new("v", FieldKind::Flow)).unwrap();
        let t = p.add_field(FieldDescriptor::new("T", FieldKind::Heat)).unwrap();
        assert_eq!(p.couplings().coupling(v, t), Some(CouplingStrength::Hard));
        p.modify_field(t, |f| f.set_analysis(AnalysisType::Transient))
            .unwrap();
        assert_eq!(p.couplings().coupling(v, t), Some(CouplingStrength::Weak));
    }

    #[test]
    fn batch_edit_emits_one_event() {
        let mut p = problem();
        let rx = p.subscribe();
        let ids = p.edit(|batch| {
            let a = batch.add(FieldDescriptor::new("J", FieldKind::Current)).unwrap();
            let b = batch.add(FieldDescriptor::new("T", FieldKind::Heat)).unwrap();
            (a, b)
        });
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(p.couplings().coupling(ids.0, ids.1), Some(CouplingStrength::Weak));
    }

    #[test]
    fn queries() {
        let mut p = problem();
        p.add_field(transient_heat()).unwrap();
        p.add_field(
            FieldDescriptor::new("A", FieldKind::Magnetic)
                .with_analysis(AnalysisType::Harmonic)
                .with_linearity(LinearityType::Newton),
        )
        .unwrap();
        assert_eq!(p.num_transient_fields(), 1);
        assert!(p.is_transient());
        assert!(p.is_harmonic());
        assert!(p.is_nonlinear());
        assert_eq!(p.num_adaptive_fields(), 0);
    }

    // ── feature combinations ───────────────────────────────────

    #[test]
    fn two_transient_fields_rejected() {
        let mut p = problem();
        p.add_field(transient_heat()).unwrap();
        p.add_field(
            FieldDescriptor::new("A", FieldKind::Magnetic).with_analysis(AnalysisType::Transient),
        )
        .unwrap();
        assert_eq!(
            p.validate_combination(),
            Err(ConfigError::MultipleTransientFields { count: 2 })
        );
    }

    #[test]
    fn coupled_transient_with_adaptivity_rejected() {
        let mut p = problem();
        p.add_field(transient_heat()).unwrap();
        p.add_field(
            FieldDescriptor::new("u", FieldKind::Elasticity).with_adaptivity(AdaptivityType::H, 3),
        )
        .unwrap();
        assert_eq!(
            p.validate_combination(),
            Err(ConfigError::TransientCoupledAdaptivity)
        );
    }

    #[test]
    fn space_and_time_adaptivity_rejected() {
        let mut p = Problem::new(ProblemConfig {
            time_step_method: TimeStepMethod::Adaptive,
            ..Default::default()
        })
        .unwrap();
        p.add_field(transient_heat().with_adaptivity(AdaptivityType::Hp, 2))
            .unwrap();
        assert_eq!(
            p.validate_combination(),
            Err(ConfigError::SpaceAndTimeAdaptivity)
        );

        // Same field with fixed stepping is fine.
        p.set_config(ProblemConfig::default()).unwrap();
        assert!(p.validate_combination().is_ok());
    }

    #[test]
    fn snapshot_serializes() {
        let mut p = problem();
        p.add_field(FieldDescriptor::new("J", FieldKind::Current))
            .unwrap();
        p.add_field(FieldDescriptor::new("T", FieldKind::Heat)).unwrap();
        let json = serde_json::to_value(p.snapshot()).unwrap();
        assert_eq!(json["fields"].as_array().unwrap().len(), 2);
        assert_eq!(json["couplings"][0]["strength"], "weak");
    }
}
