/// Enabled state, tags and read accessors
use super::core::{Notification, SmartObjectSubsystem};
use crate::definition::SmartObjectDefinition;
use crate::events::{ChangeReason, SmartObjectEvent, UserPayload};
use crate::math::{Transform, Vec3};
use crate::tags::{Tag, TagContainer, GAMEPLAY_REASON};
use crate::types::{ClaimHandle, ObjectHandle, OwnerData, SlotHandle};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl SmartObjectSubsystem {
    // ========================================================================
    // Enabled state
    // ========================================================================

    /// Enables or disables an object for the gameplay reason.
    pub fn set_enabled(&self, handle: ObjectHandle, enabled: bool) -> bool {
        self.set_enabled_for_reason(handle, &Tag::new(GAMEPLAY_REASON), enabled)
    }

    /// Sets or clears the disable bit owned by `reason`.
    ///
    /// The object is enabled only when no reason disables it. Object and
    /// slot events fire only when that combined state actually changes.
    pub fn set_enabled_for_reason(&self, handle: ObjectHandle, reason: &Tag, enabled: bool) -> bool {
        let mask = match self.reasons.mask_for(reason) {
            Ok(mask) => mask,
            Err(err) => {
                warn!("set_enabled_for_reason on '{}': {}", handle, err);
                return false;
            }
        };

        self.with_object(handle, "set_enabled_for_reason", |object, notifications| {
            if object.is_enabled_for_mask(mask) == enabled {
                info!(
                    "Ignoring redundant call to set '{}' {} for reason {}",
                    handle,
                    if enabled { "enabled" } else { "disabled" },
                    reason
                );
                return;
            }

            let was_enabled = object.is_enabled();
            let flags = if enabled {
                object.disable_flags() & !mask
            } else {
                object.disable_flags() | mask
            };

            let previous: Vec<bool> = object.slots.iter().map(|slot| slot.is_enabled()).collect();
            object.set_disable_flags(flags);
            if object.is_enabled() == was_enabled {
                return;
            }

            notifications.push(Notification::Event(SmartObjectEvent::object(
                handle,
                if enabled {
                    ChangeReason::OnObjectEnabled
                } else {
                    ChangeReason::OnObjectDisabled
                },
            )));

            for (index, (slot, was_slot_enabled)) in object.slots.iter().zip(previous).enumerate() {
                if slot.is_enabled() == was_slot_enabled {
                    continue;
                }
                let reason = if slot.is_enabled() {
                    ChangeReason::OnSlotEnabled
                } else {
                    ChangeReason::OnSlotDisabled
                };
                notifications.push(Notification::Event(
                    SmartObjectEvent::slot(SlotHandle::new(handle, index), reason)
                        .with_payload(slot.user_data().cloned()),
                ));
            }
        })
        .is_some()
    }

    pub fn is_enabled(&self, handle: ObjectHandle) -> bool {
        self.with_object(handle, "is_enabled", |object, _| object.is_enabled())
            .unwrap_or(false)
    }

    /// False only when `reason` currently disables the object.
    pub fn is_enabled_for_reason(&self, handle: ObjectHandle, reason: &Tag) -> bool {
        let mask = self.reasons.existing_mask(reason);
        self.with_object(handle, "is_enabled_for_reason", |object, _| {
            mask.map(|mask| object.is_enabled_for_mask(mask)).unwrap_or(true)
        })
        .unwrap_or(false)
    }

    // ========================================================================
    // Object tags
    // ========================================================================

    pub fn instance_tags(&self, handle: ObjectHandle) -> Option<TagContainer> {
        self.with_object(handle, "instance_tags", |object, _| object.tags().clone())
    }

    pub fn add_tag_to_instance(&self, handle: ObjectHandle, tag: Tag) -> bool {
        self.with_object(handle, "add_tag_to_instance", |object, notifications| {
            if object.tags.add(tag.clone()) {
                notifications.push(Notification::Event(
                    SmartObjectEvent::object(handle, ChangeReason::OnTagAdded).with_tag(tag),
                ));
            }
        })
        .is_some()
    }

    pub fn remove_tag_from_instance(&self, handle: ObjectHandle, tag: &Tag) -> bool {
        self.with_object(handle, "remove_tag_from_instance", |object, notifications| {
            if object.tags.remove(tag) {
                notifications.push(Notification::Event(
                    SmartObjectEvent::object(handle, ChangeReason::OnTagRemoved).with_tag(tag.clone()),
                ));
            }
        })
        .is_some()
    }

    // ========================================================================
    // Slot tags and state
    // ========================================================================

    pub fn slot_tags(&self, slot: SlotHandle) -> Option<TagContainer> {
        self.with_slot(slot, "slot_tags", |object, index, _| {
            object.slot(index).map(|runtime_slot| runtime_slot.tags().clone())
        })
        .flatten()
    }

    pub fn add_tag_to_slot(&self, slot: SlotHandle, tag: Tag) -> bool {
        self.with_slot(slot, "add_tag_to_slot", |object, index, notifications| {
            let Some(runtime_slot) = object.slot_mut(index) else {
                return false;
            };
            if runtime_slot.tags.add(tag.clone()) {
                notifications.push(Notification::Event(
                    SmartObjectEvent::slot(slot, ChangeReason::OnTagAdded)
                        .with_tag(tag)
                        .with_payload(runtime_slot.user_data().cloned()),
                ));
            }
            true
        })
        .unwrap_or(false)
    }

    /// Removes `tag` from a slot.
    ///
    /// Returns true only if the tag was present.
    pub fn remove_tag_from_slot(&self, slot: SlotHandle, tag: &Tag) -> bool {
        self.with_slot(slot, "remove_tag_from_slot", |object, index, notifications| {
            let Some(runtime_slot) = object.slot_mut(index) else {
                return false;
            };
            if !runtime_slot.tags.remove(tag) {
                return false;
            }
            notifications.push(Notification::Event(
                SmartObjectEvent::slot(slot, ChangeReason::OnTagRemoved)
                    .with_tag(tag.clone())
                    .with_payload(runtime_slot.user_data().cloned()),
            ));
            true
        })
        .unwrap_or(false)
    }

    /// Sets the slot's own enabled flag.
    ///
    /// # Returns
    ///
    /// The combined (slot and object) enabled value before the change.
    pub fn set_slot_enabled(&self, slot: SlotHandle, enabled: bool) -> bool {
        self.with_slot(slot, "set_slot_enabled", |object, index, notifications| {
            let Some(runtime_slot) = object.slot_mut(index) else {
                return false;
            };
            let was_enabled = runtime_slot.is_enabled();
            runtime_slot.set_slot_flag(enabled);
            if runtime_slot.is_enabled() != was_enabled {
                let reason = if runtime_slot.is_enabled() {
                    ChangeReason::OnSlotEnabled
                } else {
                    ChangeReason::OnSlotDisabled
                };
                notifications.push(Notification::Event(
                    SmartObjectEvent::slot(slot, reason).with_payload(runtime_slot.user_data().cloned()),
                ));
            }
            was_enabled
        })
        .unwrap_or(false)
    }

    /// Raises a custom event on a slot.
    ///
    /// # Returns
    ///
    /// True when the slot exists and somebody is listening to the object.
    pub fn send_slot_event(&self, slot: SlotHandle, tag: Tag, payload: Option<UserPayload>) -> bool {
        let listening = self.events.has_subscribers(slot.object) || self.events.has_subscribers(ObjectHandle::INVALID);
        self.with_slot(slot, "send_slot_event", |_, _, notifications| {
            notifications.push(Notification::Event(
                SmartObjectEvent::slot(slot, ChangeReason::OnEvent)
                    .with_tag(tag)
                    .with_payload(payload),
            ));
            listening
        })
        .unwrap_or(false)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn get_slot_location(&self, slot: SlotHandle) -> Option<Vec3> {
        self.get_slot_transform(slot).map(|transform| transform.location)
    }

    pub fn get_slot_transform(&self, slot: SlotHandle) -> Option<Transform> {
        self.with_slot(slot, "get_slot_transform", |object, index, _| object.slot_transform(index))
            .flatten()
    }

    pub fn get_object_transform(&self, handle: ObjectHandle) -> Option<Transform> {
        self.with_object(handle, "get_object_transform", |object, _| *object.transform())
    }

    pub fn object_definition(&self, handle: ObjectHandle) -> Option<Arc<SmartObjectDefinition>> {
        self.with_object(handle, "object_definition", |object, _| object.definition().clone())
    }

    pub fn get_owner_data(&self, handle: ObjectHandle) -> Option<OwnerData> {
        self.with_object(handle, "get_owner_data", |object, _| object.owner().clone())
    }

    pub fn is_smart_object_valid(&self, handle: ObjectHandle) -> bool {
        handle.is_valid() && self.objects.read().contains_key(&handle)
    }

    /// Whether `claim` still refers to a live object. Says nothing about
    /// whether the claim itself is still held.
    pub fn is_claimed_smart_object_valid(&self, claim: ClaimHandle) -> bool {
        claim.is_valid() && self.is_smart_object_slot_valid(claim.slot)
    }

    pub fn is_smart_object_slot_valid(&self, slot: SlotHandle) -> bool {
        if !slot.is_valid() {
            return false;
        }
        let Some(object) = self.object_arc(slot.object) else {
            debug!("Slot {} refers to an object that is not part of the simulation", slot);
            return false;
        };
        let valid = slot.index < object.lock().slot_count();
        valid
    }
}
