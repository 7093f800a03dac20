//! Reusable field fixtures.
//!
//! Each helper returns a valid [`FieldDescriptor`] so tests only spell
//! out the attribute they care about.

use tandem_core::{AdaptivityType, AnalysisType, FieldDescriptor, FieldKind};

/// Steady heat transfer.
pub fn steady_heat(name: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, FieldKind::Heat)
}

/// Transient heat transfer.
pub fn transient_heat(name: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, FieldKind::Heat).with_analysis(AnalysisType::Transient)
}

/// Steady current field; couples weakly into heat.
pub fn current(name: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, FieldKind::Current)
}

/// Steady flow; couples hard into heat.
pub fn flow(name: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, FieldKind::Flow)
}

/// Steady elasticity.
pub fn elasticity(name: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, FieldKind::Elasticity)
}

/// Steady electrostatics with `h` adaptivity capped at `steps`.
pub fn adaptive_electrostatic(name: &str, steps: u32) -> FieldDescriptor {
    FieldDescriptor::new(name, FieldKind::Electrostatic).with_adaptivity(AdaptivityType::H, steps)
}
