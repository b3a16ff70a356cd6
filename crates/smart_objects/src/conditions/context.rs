//! Evaluation context and owner resolution.

use crate::events::UserPayload;
use crate::tags::TagContainer;
use crate::types::{ObjectHandle, OwnerData, SlotHandle};

/// Values bound for one condition evaluation.
///
/// Object-level evaluations carry no slot handle and no slot tags.
#[derive(Clone, Copy)]
pub struct ConditionContext<'a> {
    pub object: ObjectHandle,
    pub slot: Option<SlotHandle>,
    pub owner: &'a OwnerData,
    pub object_tags: &'a TagContainer,
    pub slot_tags: Option<&'a TagContainer>,
    pub user_tags: &'a TagContainer,
    pub user_data: Option<&'a UserPayload>,
}

impl<'a> ConditionContext<'a> {
    pub fn for_object(
        object: ObjectHandle,
        owner: &'a OwnerData,
        object_tags: &'a TagContainer,
        user_tags: &'a TagContainer,
    ) -> Self {
        Self {
            object,
            slot: None,
            owner,
            object_tags,
            slot_tags: None,
            user_tags,
            user_data: None,
        }
    }

    pub fn with_slot(mut self, slot: SlotHandle, slot_tags: &'a TagContainer) -> Self {
        self.slot = Some(slot);
        self.slot_tags = Some(slot_tags);
        self
    }

    pub fn with_user_data(mut self, user_data: Option<&'a UserPayload>) -> Self {
        self.user_data = user_data;
        self
    }
}

impl std::fmt::Debug for ConditionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionContext")
            .field("object", &self.object)
            .field("slot", &self.slot)
            .field("owner", self.owner)
            .field("user_tags", self.user_tags)
            .finish()
    }
}

/// Decides whether the external owner of an object is currently loaded.
///
/// Conditions are only activated for objects whose owner resolves. Objects
/// whose owner is dehydrated fail their conditions until it resolves.
/// Objects with a bound component always resolve and objects without owner
/// data never do; the resolver is only asked about the remaining cases.
pub trait OwnerResolver: Send + Sync {
    fn is_resolvable(&self, owner: &OwnerData) -> bool;
}

/// Treats every owner payload as loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysResolvable;

impl OwnerResolver for AlwaysResolvable {
    fn is_resolvable(&self, _owner: &OwnerData) -> bool {
        true
    }
}
