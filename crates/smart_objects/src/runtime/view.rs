//! Scoped accessors handed to `read_slot_data` / `mutate_slot_data` callbacks.
//!
//! A view only lives for the duration of the callback, while the owning
//! object is locked.

use super::slot::RuntimeSlot;
use crate::definition::SlotDefinition;
use crate::tags::TagContainer;
use crate::types::{SlotHandle, SlotState, UserHandle};
use std::any::Any;

/// Read-only view of one slot.
pub struct SlotView<'a> {
    handle: SlotHandle,
    slot: &'a RuntimeSlot,
    definition: &'a SlotDefinition,
}

impl<'a> SlotView<'a> {
    pub(crate) fn new(handle: SlotHandle, slot: &'a RuntimeSlot, definition: &'a SlotDefinition) -> Self {
        Self { handle, slot, definition }
    }

    pub fn handle(&self) -> SlotHandle {
        self.handle
    }

    pub fn state(&self) -> SlotState {
        self.slot.state()
    }

    pub fn user(&self) -> UserHandle {
        self.slot.user()
    }

    pub fn tags(&self) -> &TagContainer {
        self.slot.tags()
    }

    pub fn definition(&self) -> &SlotDefinition {
        self.definition
    }

    pub fn state_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.slot.state_data::<T>()
    }
}

/// Mutable view of one slot. Only state data can be changed through it.
pub struct SlotViewMut<'a> {
    handle: SlotHandle,
    slot: &'a mut RuntimeSlot,
    definition: &'a SlotDefinition,
}

impl<'a> SlotViewMut<'a> {
    pub(crate) fn new(handle: SlotHandle, slot: &'a mut RuntimeSlot, definition: &'a SlotDefinition) -> Self {
        Self { handle, slot, definition }
    }

    pub fn handle(&self) -> SlotHandle {
        self.handle
    }

    pub fn state(&self) -> SlotState {
        self.slot.state()
    }

    pub fn tags(&self) -> &TagContainer {
        self.slot.tags()
    }

    pub fn definition(&self) -> &SlotDefinition {
        self.definition
    }

    pub fn state_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.slot.state_data::<T>()
    }

    pub fn state_data_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.slot.state_data_mut::<T>()
    }
}
