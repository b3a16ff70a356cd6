//! Live smart object instance.

use super::slot::RuntimeSlot;
use crate::conditions::{ConditionContext, OwnerResolver, PreconditionState};
use crate::definition::SmartObjectDefinition;
use crate::events::UserPayload;
use crate::math::{Box3, Transform, Vec3};
use crate::spatial::SpatialEntryToken;
use crate::tags::TagContainer;
use crate::types::{ComponentId, ObjectHandle, OwnerData, SlotHandle};
use std::fmt;
use std::sync::Arc;

/// One smart object living in the simulation.
pub struct RuntimeObject {
    handle: ObjectHandle,
    definition: Arc<SmartObjectDefinition>,
    transform: Transform,
    bounds: Box3,
    /// One bit per disable reason; enabled when zero.
    disable_flags: u16,
    pub(crate) tags: TagContainer,
    owner: OwnerData,
    pub(crate) slots: Vec<RuntimeSlot>,
    precondition_state: PreconditionState,
    pub(crate) spatial_entry: Option<SpatialEntryToken>,
    owner_component: Option<ComponentId>,
}

impl RuntimeObject {
    pub(crate) fn new(
        handle: ObjectHandle,
        definition: Arc<SmartObjectDefinition>,
        transform: Transform,
        owner: OwnerData,
    ) -> Self {
        let slots = definition
            .slots
            .iter()
            .map(|slot| RuntimeSlot::new(slot.offset, slot.rotation, slot.enabled, slot.runtime_tags.clone(), true))
            .collect();
        let bounds = definition.world_bounds(&transform);

        Self {
            handle,
            definition,
            transform,
            bounds,
            disable_flags: 0,
            tags: TagContainer::new(),
            owner,
            slots,
            precondition_state: PreconditionState::Inactive,
            spatial_entry: None,
            owner_component: None,
        }
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn definition(&self) -> &Arc<SmartObjectDefinition> {
        &self.definition
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn location(&self) -> Vec3 {
        self.transform.location
    }

    /// World-space bounds for the current transform.
    pub fn bounds(&self) -> Box3 {
        self.bounds
    }

    pub fn tags(&self) -> &TagContainer {
        &self.tags
    }

    pub fn owner(&self) -> &OwnerData {
        &self.owner
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&RuntimeSlot> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut RuntimeSlot> {
        self.slots.get_mut(index)
    }

    pub fn is_enabled(&self) -> bool {
        self.disable_flags == 0
    }

    /// True unless the object is disabled for the reason owning `mask`.
    pub fn is_enabled_for_mask(&self, mask: u16) -> bool {
        self.disable_flags & mask == 0
    }

    pub(crate) fn disable_flags(&self) -> u16 {
        self.disable_flags
    }

    pub(crate) fn set_disable_flags(&mut self, flags: u16) {
        self.disable_flags = flags;
        let enabled = flags == 0;
        for slot in &mut self.slots {
            slot.set_object_enabled(enabled);
        }
    }

    pub(crate) fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.bounds = self.definition.world_bounds(&transform);
    }

    /// World transform of a slot.
    pub fn slot_transform(&self, index: usize) -> Option<Transform> {
        self.slots.get(index).map(|slot| {
            self.transform
                .compose(&Transform::new(slot.offset(), slot.rotation()))
        })
    }

    pub fn owner_component(&self) -> Option<ComponentId> {
        self.owner_component
    }

    pub fn is_bound_to_component(&self) -> bool {
        self.owner_component.is_some()
    }

    pub(crate) fn bind_component(&mut self, component: ComponentId) {
        self.owner_component = Some(component);
    }

    pub(crate) fn unbind_component(&mut self) -> Option<ComponentId> {
        self.owner_component.take()
    }

    pub(crate) fn set_owner(&mut self, owner: OwnerData) {
        self.owner = owner;
    }

    /// Whether conditions may be activated for this object right now.
    pub(crate) fn is_owner_resolvable(&self, resolver: &dyn OwnerResolver) -> bool {
        self.owner_component.is_some() || (self.owner.is_set() && resolver.is_resolvable(&self.owner))
    }

    pub fn precondition_state(&self) -> PreconditionState {
        self.precondition_state
    }

    // ========================================================================
    // Preconditions
    // ========================================================================

    /// Activates object and slot conditions if the owner resolves; otherwise
    /// leaves them pending.
    pub(crate) fn initialize_preconditions(&mut self, resolver: &dyn OwnerResolver) {
        let resolvable = self.is_owner_resolvable(resolver);
        let definition = self.definition.clone();
        let empty = TagContainer::new();
        let context = ConditionContext::for_object(self.handle, &self.owner, &self.tags, &empty);

        self.precondition_state
            .try_activate(&definition.preconditions, resolvable, &context);

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let slot_context = context.with_slot(SlotHandle::new(self.handle, index), &slot.tags);
            let set = &definition.slots[index].selection_preconditions;
            slot.precondition_state.try_activate(set, resolvable, &slot_context);
        }
    }

    pub(crate) fn deactivate_preconditions(&mut self) {
        let definition = self.definition.clone();
        let empty = TagContainer::new();
        let context = ConditionContext::for_object(self.handle, &self.owner, &self.tags, &empty);

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let slot_context = context.with_slot(SlotHandle::new(self.handle, index), &slot.tags);
            let set = &definition.slots[index].selection_preconditions;
            slot.precondition_state.deactivate(set, &slot_context);
        }
        self.precondition_state
            .deactivate(&definition.preconditions, &context);
    }

    pub(crate) fn evaluate_object_conditions(
        &mut self,
        resolver: &dyn OwnerResolver,
        user_tags: &TagContainer,
        user_data: Option<&UserPayload>,
    ) -> bool {
        let resolvable = self.is_owner_resolvable(resolver);
        let definition = self.definition.clone();
        let context =
            ConditionContext::for_object(self.handle, &self.owner, &self.tags, user_tags).with_user_data(user_data);
        self.precondition_state
            .evaluate(&definition.preconditions, resolvable, &context)
    }

    pub(crate) fn evaluate_slot_conditions(
        &mut self,
        index: usize,
        resolver: &dyn OwnerResolver,
        user_tags: &TagContainer,
        user_data: Option<&UserPayload>,
    ) -> bool {
        let resolvable = self.is_owner_resolvable(resolver);
        let definition = self.definition.clone();
        let Some(slot_definition) = definition.slots.get(index) else {
            return false;
        };
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        let context = ConditionContext::for_object(self.handle, &self.owner, &self.tags, user_tags)
            .with_user_data(user_data)
            .with_slot(SlotHandle::new(self.handle, index), &slot.tags);
        slot.precondition_state
            .evaluate(&slot_definition.selection_preconditions, resolvable, &context)
    }
}

impl fmt::Debug for RuntimeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeObject")
            .field("handle", &self.handle)
            .field("definition", &self.definition.name)
            .field("location", &self.transform.location)
            .field("enabled", &self.is_enabled())
            .field("tags", &self.tags)
            .field("slots", &self.slots)
            .field("component", &self.owner_component)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{AlwaysResolvable, ConditionExpr, PreconditionSet};
    use crate::definition::SlotDefinition;
    use crate::math::Rotator;
    use crate::tags::{Tag, TagQuery};

    fn object(owner: OwnerData) -> RuntimeObject {
        let mut slot = SlotDefinition::at(Vec3::new(100.0, 0.0, 0.0));
        slot.selection_preconditions =
            PreconditionSet::new().with("guards", ConditionExpr::UserTagsMatch(TagQuery::any(["Role.Guard"])));
        let mut disabled = SlotDefinition::at(Vec3::new(-100.0, 0.0, 0.0));
        disabled.enabled = false;
        let definition = Arc::new(SmartObjectDefinition::new("Post", vec![slot, disabled]));
        RuntimeObject::new(
            ObjectHandle::dynamic(),
            definition,
            Transform::new(Vec3::new(0.0, 0.0, 0.0), Rotator::from_yaw(90.0)),
            owner,
        )
    }

    #[test]
    fn slots_follow_definition_and_object_transform() {
        let object = object(OwnerData::None);
        assert_eq!(object.slot_count(), 2);
        assert!(object.slot(0).unwrap().is_enabled());
        assert!(!object.slot(1).unwrap().is_enabled());
        let transform = object.slot_transform(0).unwrap();
        assert!(transform.location.approx_eq(Vec3::new(0.0, 100.0, 0.0), 1e-9));
    }

    #[test]
    fn disable_flags_propagate_to_slots() {
        let mut object = object(OwnerData::None);
        object.set_disable_flags(0b10);
        assert!(!object.is_enabled());
        assert!(object.is_enabled_for_mask(0b01));
        assert!(!object.slot(0).unwrap().is_enabled());
        object.set_disable_flags(0);
        assert!(object.slot(0).unwrap().is_enabled());
    }

    #[test]
    fn conditions_stay_pending_without_owner() {
        let mut object = object(OwnerData::None);
        object.initialize_preconditions(&AlwaysResolvable);
        let guard: TagContainer = [Tag::new("Role.Guard")].into_iter().collect();

        assert!(object.evaluate_object_conditions(&AlwaysResolvable, &guard, None));
        assert!(!object.evaluate_slot_conditions(0, &AlwaysResolvable, &guard, None));
        assert_eq!(
            object.slot(0).unwrap().precondition_state,
            PreconditionState::ActivationPending
        );

        object.bind_component(ComponentId::new());
        assert!(object.evaluate_slot_conditions(0, &AlwaysResolvable, &guard, None));
        assert!(!object.evaluate_slot_conditions(0, &AlwaysResolvable, &TagContainer::new(), None));
    }
}
