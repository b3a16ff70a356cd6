/// Slot reservation: claim, occupy, release and per-claim data
use super::core::{Notification, SmartObjectSubsystem};
use super::stats::StatsCounters;
use crate::definition::BehaviorDefinition;
use crate::events::{ChangeReason, ReleaseInfo, SmartObjectEvent, UserPayload};
use crate::runtime::{SlotInvalidationCallback, SlotView, SlotViewMut};
use crate::types::{ClaimHandle, ClaimPriority, RequestResult, SlotHandle, SlotState};
use std::any::Any;
use tracing::{debug, error, warn};

impl SmartObjectSubsystem {
    /// Reserves a slot for a new user.
    ///
    /// A slot already claimed at a strictly lower priority is taken over: the
    /// previous claimant's invalidation callback runs and a release event
    /// flagged as aborted and overridden is raised before the claim event.
    ///
    /// # Returns
    ///
    /// The new claim, or [`ClaimHandle::INVALID`] if the slot could not be
    /// claimed.
    pub fn claim(&self, slot: SlotHandle, priority: ClaimPriority, user_data: Option<UserPayload>) -> ClaimHandle {
        if !slot.is_valid() {
            debug!("claim called with an unset slot handle");
            return ClaimHandle::INVALID;
        }

        self.with_slot(slot, "claim", |object, index, notifications| {
            let Some(runtime_slot) = object.slot_mut(index) else {
                return ClaimHandle::INVALID;
            };

            if !runtime_slot.can_be_claimed(priority) {
                debug!(
                    "Can't claim slot {}: {} (priority {:?})",
                    slot,
                    runtime_slot.state(),
                    runtime_slot.claim_priority()
                );
                StatsCounters::bump(&self.stats.claims_rejected);
                return ClaimHandle::INVALID;
            }

            if runtime_slot.state() == SlotState::Claimed {
                let previous = ClaimHandle::new(slot, runtime_slot.user());
                if let Some(released) = runtime_slot.release(&previous) {
                    if let Some(callback) = released.invalidation {
                        notifications.push(Notification::SlotInvalidated {
                            callback,
                            claim: previous,
                            state: released.previous_state,
                        });
                    }
                    notifications.push(Notification::Event(
                        SmartObjectEvent::slot(slot, ChangeReason::OnReleased)
                            .with_payload(released.user_data)
                            .with_release(ReleaseInfo { aborted: true, overridden: true }),
                    ));
                    StatsCounters::bump(&self.stats.claims_overridden);
                    StatsCounters::bump(&self.stats.aborted_releases);
                    debug!("Claim {} overridden at priority {:?}", previous, priority);
                }
            }

            let user = self.next_user();
            if !runtime_slot.claim(user, priority, user_data.clone()) {
                StatsCounters::bump(&self.stats.claims_rejected);
                return ClaimHandle::INVALID;
            }

            let claim = ClaimHandle::new(slot, user);
            notifications.push(Notification::Event(
                SmartObjectEvent::slot(slot, ChangeReason::OnClaimed).with_payload(user_data),
            ));
            StatsCounters::bump(&self.stats.claims_granted);
            debug!("Claim {} succeeded", claim);
            claim
        })
        .unwrap_or(ClaimHandle::INVALID)
    }

    /// Whether [`Self::claim`] at `priority` would succeed right now.
    pub fn can_be_claimed(&self, slot: SlotHandle, priority: ClaimPriority) -> bool {
        self.with_slot(slot, "can_be_claimed", |object, index, _| {
            object
                .slot(index)
                .map(|runtime_slot| runtime_slot.can_be_claimed(priority))
                .unwrap_or(false)
        })
        .unwrap_or(false)
    }

    /// Transitions a claimed slot to occupied.
    ///
    /// # Returns
    ///
    /// The behavior definition matching `behavior_class` (or the first one
    /// when `None`). Nothing changes when the object is disabled, no
    /// behavior matches, or `claim` is not the current claimant of a
    /// claimed slot.
    pub fn mark_slot_as_occupied(&self, claim: ClaimHandle, behavior_class: Option<&str>) -> Option<BehaviorDefinition> {
        if !claim.is_valid() {
            debug!("mark_slot_as_occupied called with an invalid claim handle");
            return None;
        }

        self.with_slot(claim.slot, "mark_slot_as_occupied", |object, index, notifications| {
            if !object.is_enabled() {
                debug!("Can't use slot {}: smart object is disabled", claim.slot);
                return None;
            }

            let definition = object.definition().clone();
            let Some(behavior) = definition.behavior_definition(index, behavior_class) else {
                warn!(
                    "Unable to find a behavior definition of class {:?} in '{}'",
                    behavior_class, definition.name
                );
                return None;
            };

            let runtime_slot = object.slot_mut(index)?;
            if runtime_slot.state() != SlotState::Claimed {
                error!(
                    "Should be claimed before being used. Current state: {}. Claim: {}",
                    runtime_slot.state(),
                    claim
                );
                return None;
            }
            if runtime_slot.user() != claim.user {
                error!(
                    "Attempt to use slot {} from claim {} but it is assigned to {}",
                    claim.slot,
                    claim,
                    runtime_slot.user()
                );
                return None;
            }

            runtime_slot.mark_occupied();
            notifications.push(Notification::Event(
                SmartObjectEvent::slot(claim.slot, ChangeReason::OnOccupied)
                    .with_payload(runtime_slot.user_data().cloned()),
            ));
            StatsCounters::bump(&self.stats.occupations);
            debug!("Slot {} occupied by {}", claim.slot, claim);
            Some(behavior.clone())
        })
        .flatten()
    }

    /// Frees the slot held by `claim`.
    ///
    /// The invalidation callback is dropped without being invoked; only
    /// forced releases call it.
    pub fn release(&self, claim: ClaimHandle) -> bool {
        if !claim.is_valid() {
            debug!("release called with an invalid claim handle");
            return false;
        }

        self.with_slot(claim.slot, "release", |object, index, notifications| {
            let Some(runtime_slot) = object.slot_mut(index) else {
                return false;
            };
            let state = runtime_slot.state();
            match runtime_slot.release(&claim) {
                Some(released) => {
                    notifications.push(Notification::Event(
                        SmartObjectEvent::slot(claim.slot, ChangeReason::OnReleased)
                            .with_payload(released.user_data)
                            .with_release(ReleaseInfo::default()),
                    ));
                    StatsCounters::bump(&self.stats.releases);
                    debug!("Released {} from slot {}", claim, claim.slot);
                    true
                }
                None => {
                    debug!(
                        "Claim {} not released: slot is {} and assigned to {}",
                        claim,
                        state,
                        runtime_slot.user()
                    );
                    false
                }
            }
        })
        .unwrap_or(false)
    }

    pub fn get_slot_state(&self, slot: SlotHandle) -> Option<SlotState> {
        self.with_slot(slot, "get_slot_state", |object, index, _| {
            object.slot(index).map(|runtime_slot| runtime_slot.state())
        })
        .flatten()
    }

    /// Behavior definition for the slot held by `claim`, without changing its state.
    pub fn behavior_definition(&self, claim: ClaimHandle, behavior_class: Option<&str>) -> Option<BehaviorDefinition> {
        self.behavior_definition_for_slot(claim.slot, behavior_class, "behavior_definition")
    }

    pub fn behavior_definition_for_result(
        &self,
        result: RequestResult,
        behavior_class: Option<&str>,
    ) -> Option<BehaviorDefinition> {
        self.behavior_definition_for_slot(result.slot, behavior_class, "behavior_definition_for_result")
    }

    fn behavior_definition_for_slot(
        &self,
        slot: SlotHandle,
        behavior_class: Option<&str>,
        operation: &str,
    ) -> Option<BehaviorDefinition> {
        self.with_slot(slot, operation, |object, index, _| {
            object
                .definition()
                .behavior_definition(index, behavior_class)
                .cloned()
        })
        .flatten()
    }

    // ========================================================================
    // Per-claim callbacks and data
    // ========================================================================

    /// Installs the callback run if the claim is forcibly released.
    ///
    /// Fails when `claim` is not the slot's current claimant.
    pub fn register_slot_invalidation_callback(&self, claim: ClaimHandle, callback: SlotInvalidationCallback) -> bool {
        self.set_invalidation_callback(claim, Some(callback), "register_slot_invalidation_callback")
    }

    pub fn unregister_slot_invalidation_callback(&self, claim: ClaimHandle) -> bool {
        self.set_invalidation_callback(claim, None, "unregister_slot_invalidation_callback")
    }

    fn set_invalidation_callback(
        &self,
        claim: ClaimHandle,
        callback: Option<SlotInvalidationCallback>,
        operation: &str,
    ) -> bool {
        if !claim.is_valid() {
            debug!("{} called with an invalid claim handle", operation);
            return false;
        }
        self.with_slot(claim.slot, operation, |object, index, _| match object.slot_mut(index) {
            Some(runtime_slot) if runtime_slot.user() == claim.user => {
                runtime_slot.set_invalidation_callback(callback);
                true
            }
            _ => {
                debug!("{}: claim {} does not hold the slot", operation, claim);
                false
            }
        })
        .unwrap_or(false)
    }

    /// Attaches typed data to the claimed slot, replacing data of the same type.
    ///
    /// The data lives until the slot is released.
    pub fn add_slot_data<T: Any + Send + Sync>(&self, claim: ClaimHandle, data: T) -> bool {
        if !claim.is_valid() {
            debug!("add_slot_data called with an invalid claim handle");
            return false;
        }
        self.with_slot(claim.slot, "add_slot_data", |object, index, _| match object.slot_mut(index) {
            Some(runtime_slot) if runtime_slot.user() == claim.user => {
                runtime_slot.add_state_data(data);
                true
            }
            _ => {
                debug!("add_slot_data: claim {} does not hold the slot", claim);
                false
            }
        })
        .unwrap_or(false)
    }

    /// Runs `f` with read access to a slot and its definition.
    pub fn read_slot_data(&self, slot: SlotHandle, f: impl FnOnce(SlotView<'_>)) -> bool {
        self.with_slot(slot, "read_slot_data", |object, index, _| {
            let definition = object.definition().clone();
            match (object.slot(index), definition.slots.get(index)) {
                (Some(runtime_slot), Some(slot_definition)) => {
                    f(SlotView::new(slot, runtime_slot, slot_definition));
                    true
                }
                _ => false,
            }
        })
        .unwrap_or(false)
    }

    /// Runs `f` with write access to a slot's state data.
    pub fn mutate_slot_data(&self, slot: SlotHandle, f: impl FnOnce(SlotViewMut<'_>)) -> bool {
        self.with_slot(slot, "mutate_slot_data", |object, index, _| {
            let definition = object.definition().clone();
            match (object.slot_mut(index), definition.slots.get(index)) {
                (Some(runtime_slot), Some(slot_definition)) => {
                    f(SlotViewMut::new(slot, runtime_slot, slot_definition));
                    true
                }
                _ => false,
            }
        })
        .unwrap_or(false)
    }
}
