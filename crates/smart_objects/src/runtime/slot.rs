//! Per-slot reservation state.

use crate::conditions::PreconditionState;
use crate::events::UserPayload;
use crate::math::{Rotator, Vec3};
use crate::tags::TagContainer;
use crate::types::{ClaimHandle, ClaimPriority, SlotState, UserHandle};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Called when a claimed or occupied slot is forcibly released.
///
/// Receives the claim that was invalidated and the state the slot was in.
pub type SlotInvalidationCallback = Arc<dyn Fn(ClaimHandle, SlotState) + Send + Sync>;

/// Typed state blob attached to a slot by its user.
pub type SlotStateData = Box<dyn Any + Send + Sync>;

/// What a successful release took off the slot.
pub(crate) struct ReleasedClaim {
    pub previous_state: SlotState,
    pub user_data: Option<UserPayload>,
    pub invalidation: Option<SlotInvalidationCallback>,
}

/// Live state of one slot.
pub struct RuntimeSlot {
    pub(crate) offset: Vec3,
    pub(crate) rotation: Rotator,
    pub(crate) tags: TagContainer,
    pub(crate) precondition_state: PreconditionState,
    state: SlotState,
    slot_enabled: bool,
    object_enabled: bool,
    user: UserHandle,
    priority: ClaimPriority,
    user_data: Option<UserPayload>,
    invalidation: Option<SlotInvalidationCallback>,
    state_data: SmallVec<[SlotStateData; 2]>,
}

impl RuntimeSlot {
    pub(crate) fn new(offset: Vec3, rotation: Rotator, enabled: bool, tags: TagContainer, object_enabled: bool) -> Self {
        Self {
            offset,
            rotation,
            tags,
            precondition_state: PreconditionState::Inactive,
            state: SlotState::Free,
            slot_enabled: enabled,
            object_enabled,
            user: UserHandle::INVALID,
            priority: ClaimPriority::Normal,
            user_data: None,
            invalidation: None,
            state_data: SmallVec::new(),
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn user(&self) -> UserHandle {
        self.user
    }

    pub fn claim_priority(&self) -> ClaimPriority {
        self.priority
    }

    pub fn tags(&self) -> &TagContainer {
        &self.tags
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn rotation(&self) -> Rotator {
        self.rotation
    }

    pub fn user_data(&self) -> Option<&UserPayload> {
        self.user_data.as_ref()
    }

    /// Slot flag combined with the parent object's enabled state.
    pub fn is_enabled(&self) -> bool {
        self.slot_enabled && self.object_enabled
    }

    pub(crate) fn slot_flag(&self) -> bool {
        self.slot_enabled
    }

    pub(crate) fn set_slot_flag(&mut self, enabled: bool) {
        self.slot_enabled = enabled;
    }

    pub(crate) fn set_object_enabled(&mut self, enabled: bool) {
        self.object_enabled = enabled;
    }

    /// Enabled and either free or claimed at a strictly lower priority.
    pub fn can_be_claimed(&self, priority: ClaimPriority) -> bool {
        self.is_enabled()
            && (self.state == SlotState::Free || (self.state == SlotState::Claimed && self.priority < priority))
    }

    pub(crate) fn claim(&mut self, user: UserHandle, priority: ClaimPriority, user_data: Option<UserPayload>) -> bool {
        if self.state != SlotState::Free || !user.is_valid() {
            return false;
        }
        self.state = SlotState::Claimed;
        self.user = user;
        self.priority = priority;
        self.user_data = user_data;
        true
    }

    pub(crate) fn mark_occupied(&mut self) {
        self.state = SlotState::Occupied;
    }

    /// Frees the slot if `claim` matches the current claimant.
    ///
    /// Returns `None` without touching the slot when the state or user does
    /// not match.
    pub(crate) fn release(&mut self, claim: &ClaimHandle) -> Option<ReleasedClaim> {
        if !matches!(self.state, SlotState::Claimed | SlotState::Occupied) || self.user != claim.user {
            return None;
        }

        let released = ReleasedClaim {
            previous_state: self.state,
            user_data: self.user_data.take(),
            invalidation: self.invalidation.take(),
        };
        self.state = SlotState::Free;
        self.user = UserHandle::INVALID;
        self.priority = ClaimPriority::Normal;
        self.state_data.clear();
        Some(released)
    }

    /// Resets to free regardless of the claimant.
    pub(crate) fn reset(&mut self) {
        self.state = SlotState::Free;
        self.user = UserHandle::INVALID;
        self.priority = ClaimPriority::Normal;
        self.user_data = None;
        self.invalidation = None;
        self.state_data.clear();
    }

    pub(crate) fn set_invalidation_callback(&mut self, callback: Option<SlotInvalidationCallback>) {
        self.invalidation = callback;
    }

    pub(crate) fn has_invalidation_callback(&self) -> bool {
        self.invalidation.is_some()
    }

    /// Stores `data`, replacing an existing blob of the same type.
    pub(crate) fn add_state_data<T: Any + Send + Sync>(&mut self, data: T) {
        match self.state_data.iter_mut().find(|existing| existing.is::<T>()) {
            Some(existing) => *existing = Box::new(data),
            None => self.state_data.push(Box::new(data)),
        }
    }

    pub fn state_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.state_data.iter().find_map(|data| data.downcast_ref::<T>())
    }

    pub fn state_data_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.state_data.iter_mut().find_map(|data| data.downcast_mut::<T>())
    }

    pub fn state_data_len(&self) -> usize {
        self.state_data.len()
    }
}

impl fmt::Debug for RuntimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSlot")
            .field("state", &self.state)
            .field("enabled", &self.is_enabled())
            .field("user", &self.user)
            .field("priority", &self.priority)
            .field("tags", &self.tags)
            .field("state_data", &self.state_data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectHandle, SlotHandle};

    fn slot() -> RuntimeSlot {
        RuntimeSlot::new(Vec3::ZERO, Rotator::ZERO, true, TagContainer::new(), true)
    }

    fn claim_for(user: u64) -> ClaimHandle {
        ClaimHandle::new(SlotHandle::new(ObjectHandle::dynamic(), 0), UserHandle(user))
    }

    #[test]
    fn claimed_slot_only_yields_to_higher_priority() {
        let mut slot = slot();
        assert!(slot.claim(UserHandle(1), ClaimPriority::Normal, None));
        assert!(!slot.can_be_claimed(ClaimPriority::Normal));
        assert!(!slot.can_be_claimed(ClaimPriority::Low));
        assert!(slot.can_be_claimed(ClaimPriority::AboveNormal));

        slot.mark_occupied();
        assert!(!slot.can_be_claimed(ClaimPriority::High));
    }

    #[test]
    fn disabled_slots_cannot_be_claimed() {
        let mut slot = slot();
        slot.set_object_enabled(false);
        assert!(!slot.can_be_claimed(ClaimPriority::High));
        slot.set_object_enabled(true);
        slot.set_slot_flag(false);
        assert!(!slot.is_enabled());
    }

    #[test]
    fn reset_clears_claim_priority() {
        let mut slot = slot();
        slot.claim(UserHandle(3), ClaimPriority::High, None);
        slot.add_state_data(5u8);
        slot.reset();

        assert_eq!(slot.state(), SlotState::Free);
        assert_eq!(slot.claim_priority(), ClaimPriority::Normal);
        assert!(slot.can_be_claimed(ClaimPriority::Low));
    }

    #[test]
    fn release_requires_matching_user() {
        let mut slot = slot();
        slot.claim(UserHandle(7), ClaimPriority::Normal, Some(Arc::new(42u32)));
        assert!(slot.release(&claim_for(8)).is_none());
        assert_eq!(slot.state(), SlotState::Claimed);

        let released = slot.release(&claim_for(7)).unwrap();
        assert_eq!(released.previous_state, SlotState::Claimed);
        assert_eq!(released.user_data.unwrap().downcast_ref::<u32>(), Some(&42));
        assert_eq!(slot.state(), SlotState::Free);
        assert!(!slot.user().is_valid());
        assert!(slot.release(&claim_for(7)).is_none());
    }

    #[test]
    fn state_data_of_same_type_is_replaced() {
        #[derive(Debug, PartialEq)]
        struct Progress(u32);

        let mut slot = slot();
        slot.add_state_data(Progress(1));
        slot.add_state_data(String::from("note"));
        slot.add_state_data(Progress(2));
        assert_eq!(slot.state_data_len(), 2);
        assert_eq!(slot.state_data::<Progress>(), Some(&Progress(2)));

        slot.state_data_mut::<Progress>().unwrap().0 = 5;
        assert_eq!(slot.state_data::<Progress>(), Some(&Progress(5)));
    }
}
