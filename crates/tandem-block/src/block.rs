//! The [`Block`] type: fields solved jointly.

use smallvec::SmallVec;
use tandem_core::{AdaptivityType, BlockId, CouplingDescriptor, FieldDescriptor, FieldId, FieldSet};

/// One or more hard-coupled fields solved together each iteration.
///
/// Blocks are created by [`build_blocks`](crate::build_blocks) and never
/// change afterwards. Field descriptors are snapshotted at build time;
/// editing a field means rebuilding the structure.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    id: BlockId,
    fields: SmallVec<[(FieldId, FieldDescriptor); 2]>,
    couplings: Vec<CouplingDescriptor>,
    members: FieldSet,
}

impl Block {
    pub(crate) fn new(
        id: BlockId,
        fields: SmallVec<[(FieldId, FieldDescriptor); 2]>,
        couplings: Vec<CouplingDescriptor>,
    ) -> Self {
        let members = fields.iter().map(|(id, _)| *id).collect();
        Self {
            id,
            fields,
            couplings,
            members,
        }
    }

    /// Position of this block in emission order.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Fields in registration order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &FieldDescriptor)> {
        self.fields.iter().map(|(id, f)| (*id, f))
    }

    /// Field IDs in registration order.
    pub fn field_ids(&self) -> Vec<FieldId> {
        self.fields.iter().map(|(id, _)| *id).collect()
    }

    /// Membership set.
    pub fn members(&self) -> &FieldSet {
        &self.members
    }

    /// The hard couplings that bind this block together.
    pub fn couplings(&self) -> &[CouplingDescriptor] {
        &self.couplings
    }

    /// Whether `field` belongs to this block.
    pub fn contains(&self, field: FieldId) -> bool {
        self.members.contains(field)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always `false` for blocks produced by the builder.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `true` if any field is transient.
    pub fn is_transient(&self) -> bool {
        self.fields.iter().any(|(_, f)| f.is_transient())
    }

    /// `true` if any field uses Picard or Newton iteration.
    pub fn is_nonlinear(&self) -> bool {
        self.fields.iter().any(|(_, f)| f.is_nonlinear())
    }

    fn first_adaptive(&self) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .map(|(_, f)| f)
            .find(|f| f.is_adaptive())
    }

    /// Adaptivity mode of the first adaptive field, or `None`.
    pub fn adaptivity(&self) -> AdaptivityType {
        self.first_adaptive()
            .map_or(AdaptivityType::None, |f| f.adaptivity())
    }

    /// `true` if [`adaptivity`](Self::adaptivity) is enabled.
    pub fn is_adaptive(&self) -> bool {
        self.first_adaptive().is_some()
    }

    /// Step bound of the first adaptive field, or 0.
    pub fn adaptivity_steps(&self) -> usize {
        self.first_adaptive()
            .map_or(0, |f| f.adaptivity_steps() as usize)
    }

    /// Minimum simulation time between two solves of this block.
    ///
    /// Transient blocks are solved every step and report 0. Otherwise the
    /// smallest skip of any member field wins.
    pub fn time_skip(&self) -> f64 {
        if self.is_transient() {
            return 0.0;
        }
        self.fields
            .iter()
            .map(|(_, f)| f.time_skip())
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Whether the block should sit out the iteration at `actual_time`,
    /// given the time it was last solved.
    pub fn skips(&self, actual_time: f64, last_solved: Option<f64>) -> bool {
        if actual_time == 0.0 {
            return false;
        }
        match last_solved {
            Some(last) => last + self.time_skip() > actual_time,
            None => false,
        }
    }

    /// Field names joined with `" + "`.
    pub fn label(&self) -> String {
        self.fields
            .iter()
            .map(|(_, f)| f.name())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}
