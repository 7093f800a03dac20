//! The field registry and its batch-update scope.
//!
//! Every edit publishes a [`RegistryEvent`] to subscribers. Edits made
//! through a [`BatchUpdate`] are accumulated and published as one
//! coalesced event when the batch is dropped.

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;

use crate::error::FieldError;
use crate::field::FieldDescriptor;
use crate::id::FieldId;

/// A change to the registered field set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryEvent {
    /// Fields registered since the last event.
    pub added: Vec<FieldId>,
    /// Fields removed since the last event.
    pub removed: Vec<FieldId>,
    /// Surviving fields whose descriptor changed.
    pub modified: Vec<FieldId>,
}

impl RegistryEvent {
    /// `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    fn note_added(&mut self, id: FieldId) {
        self.added.push(id);
    }

    fn note_removed(&mut self, id: FieldId) {
        self.modified.retain(|m| *m != id);
        if let Some(pos) = self.added.iter().position(|a| *a == id) {
            // Added and removed inside one batch: observers never saw it.
            self.added.remove(pos);
        } else {
            self.removed.push(id);
        }
    }

    fn note_modified(&mut self, id: FieldId) {
        if !self.added.contains(&id) && !self.modified.contains(&id) {
            self.modified.push(id);
        }
    }
}

/// Registered fields, in registration order.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: IndexMap<FieldId, FieldDescriptor>,
    next_id: u32,
    subscribers: Vec<Sender<RegistryEvent>>,
}

impl FieldRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if no field is registered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field.
    pub fn get(&self, id: FieldId) -> Option<&FieldDescriptor> {
        self.fields.get(&id)
    }

    /// Look up a field ID by name.
    pub fn id_of(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .find(|(_, f)| f.name() == name)
            .map(|(id, _)| *id)
    }

    /// Iterate over `(id, descriptor)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldDescriptor)> {
        self.fields.iter().map(|(id, f)| (*id, f))
    }

    /// Receive one event per unbatched edit and one per batch.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Register a field, replacing any field with the same name.
    pub fn add(&mut self, field: FieldDescriptor) -> Result<FieldId, FieldError> {
        let mut event = RegistryEvent::default();
        let id = self.add_into(field, &mut event)?;
        self.publish(event);
        Ok(id)
    }

    /// Remove a field.
    pub fn remove(&mut self, id: FieldId) -> Option<FieldDescriptor> {
        let mut event = RegistryEvent::default();
        let removed = self.remove_into(id, &mut event);
        self.publish(event);
        removed
    }

    /// Edit a field through its setters.
    ///
    /// The edit is validated afterwards and reverted if invalid.
    pub fn modify(
        &mut self,
        id: FieldId,
        edit: impl FnOnce(&mut FieldDescriptor),
    ) -> Result<(), FieldError> {
        let mut event = RegistryEvent::default();
        self.modify_into(id, edit, &mut event)?;
        self.publish(event);
        Ok(())
    }

    /// Open a batch-update scope.
    pub fn batch(&mut self) -> BatchUpdate<'_> {
        BatchUpdate {
            registry: self,
            pending: RegistryEvent::default(),
        }
    }

    fn add_into(
        &mut self,
        field: FieldDescriptor,
        event: &mut RegistryEvent,
    ) -> Result<FieldId, FieldError> {
        field.validate()?;
        if let Some(existing) = self.id_of(field.name()) {
            self.remove_into(existing, event);
        }
        let id = FieldId(self.next_id);
        self.next_id += 1;
        self.fields.insert(id, field);
        event.note_added(id);
        Ok(id)
    }

    fn remove_into(&mut self, id: FieldId, event: &mut RegistryEvent) -> Option<FieldDescriptor> {
        let removed = self.fields.shift_remove(&id)?;
        event.note_removed(id);
        Some(removed)
    }

    fn modify_into(
        &mut self,
        id: FieldId,
        edit: impl FnOnce(&mut FieldDescriptor),
        event: &mut RegistryEvent,
    ) -> Result<(), FieldError> {
        let field = self.fields.get_mut(&id).ok_or(FieldError::UnknownField(id))?;
        let before = field.clone();
        edit(field);
        if let Err(e) = field.validate() {
            *field = before;
            return Err(e);
        }
        if *field != before {
            event.note_modified(id);
        }
        Ok(())
    }

    fn publish(&mut self, event: RegistryEvent) {
        if event.is_empty() {
            return;
        }
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// A scope in which registry edits are coalesced into one event.
///
/// Obtained from [`FieldRegistry::batch`]. The event is published when
/// the scope is dropped, and only if something changed.
pub struct BatchUpdate<'a> {
    registry: &'a mut FieldRegistry,
    pending: RegistryEvent,
}

impl BatchUpdate<'_> {
    /// Batched [`FieldRegistry::add`].
    pub fn add(&mut self, field: FieldDescriptor) -> Result<FieldId, FieldError> {
        self.registry.add_into(field, &mut self.pending)
    }

    /// Batched [`FieldRegistry::remove`].
    pub fn remove(&mut self, id: FieldId) -> Option<FieldDescriptor> {
        self.registry.remove_into(id, &mut self.pending)
    }

    /// Batched [`FieldRegistry::modify`].
    pub fn modify(
        &mut self,
        id: FieldId,
        edit: impl FnOnce(&mut FieldDescriptor),
    ) -> Result<(), FieldError> {
        self.registry.modify_into(id, edit, &mut self.pending)
    }

    /// Read access to the registry mid-batch.
    pub fn registry(&self) -> &FieldRegistry {
        self.registry
    }
}

impl Drop for BatchUpdate<'_> {
    fn drop(&mut self) {
        let event = std::mem::take(&mut self.pending);
        self.registry.publish(event);
    }
}
