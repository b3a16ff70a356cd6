/// Slot and object search
use super::core::SmartObjectSubsystem;
use super::stats::StatsCounters;
use crate::definition::{SmartObjectDefinition, UserTagsFilteringPolicy};
use crate::events::UserPayload;
use crate::math::Box3;
use crate::runtime::RuntimeObject;
use crate::tags::{TagContainer, TagQuery};
use crate::types::{ClaimPriority, ComponentId, ObjectHandle, RequestResult, SlotHandle, SlotState};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Extra per-object test applied by a [`RequestFilter`].
pub type SlotPredicate = Arc<dyn Fn(ObjectHandle) -> bool + Send + Sync>;

/// Which slots a search accepts.
#[derive(Clone)]
pub struct RequestFilter {
    /// Tags describing the user, matched against user tag filters
    pub user_tags: TagContainer,
    /// Matched against the slot's activity tags merged with the object's
    pub activity_requirements: TagQuery,
    /// When non-empty, the slot must offer a behavior of one of these classes
    pub behavior_definition_classes: Vec<String>,
    /// Claimed slots below this priority are reported as candidates
    pub claim_priority: ClaimPriority,
    pub include_claimed_slots: bool,
    pub include_disabled_slots: bool,
    pub evaluate_conditions: bool,
    pub predicate: Option<SlotPredicate>,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self {
            user_tags: TagContainer::new(),
            activity_requirements: TagQuery::Empty,
            behavior_definition_classes: Vec::new(),
            claim_priority: ClaimPriority::Normal,
            include_claimed_slots: false,
            include_disabled_slots: false,
            evaluate_conditions: true,
            predicate: None,
        }
    }
}

impl fmt::Debug for RequestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFilter")
            .field("user_tags", &self.user_tags)
            .field("activity_requirements", &self.activity_requirements)
            .field("behavior_definition_classes", &self.behavior_definition_classes)
            .field("claim_priority", &self.claim_priority)
            .field("include_claimed_slots", &self.include_claimed_slots)
            .field("include_disabled_slots", &self.include_disabled_slots)
            .field("evaluate_conditions", &self.evaluate_conditions)
            .field("predicate", &self.predicate.as_ref().map(|_| "[fn]"))
            .finish()
    }
}

impl RequestFilter {
    pub fn with_user_tags(mut self, tags: TagContainer) -> Self {
        self.user_tags = tags;
        self
    }

    pub fn with_activity_requirements(mut self, query: TagQuery) -> Self {
        self.activity_requirements = query;
        self
    }

    pub fn with_behavior_class(mut self, class: impl Into<String>) -> Self {
        self.behavior_definition_classes.push(class.into());
        self
    }

    pub fn with_claim_priority(mut self, priority: ClaimPriority) -> Self {
        self.claim_priority = priority;
        self
    }

    pub fn including_claimed(mut self) -> Self {
        self.include_claimed_slots = true;
        self
    }

    pub fn including_disabled(mut self) -> Self {
        self.include_disabled_slots = true;
        self
    }

    pub fn without_conditions(mut self) -> Self {
        self.evaluate_conditions = false;
        self
    }

    pub fn with_predicate(mut self, predicate: impl Fn(ObjectHandle) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }
}

/// A spatial search: every object whose location lies in `query_box`.
#[derive(Debug, Clone)]
pub struct SmartObjectRequest {
    pub query_box: Box3,
    pub filter: RequestFilter,
}

impl SmartObjectRequest {
    pub fn new(query_box: Box3, filter: RequestFilter) -> Self {
        Self { query_box, filter }
    }
}

/// Slots of `definition` that pass the static parts of `filter`.
fn matching_slot_indices(definition: &SmartObjectDefinition, filter: &RequestFilter) -> Vec<usize> {
    let policy = definition.user_tags_filtering_policy;
    if policy == UserTagsFilteringPolicy::Combine && !definition.user_tag_filter.matches(&filter.user_tags) {
        return Vec::new();
    }

    (0..definition.slot_count())
        .filter(|&index| {
            if !filter.behavior_definition_classes.is_empty()
                && !filter
                    .behavior_definition_classes
                    .iter()
                    .any(|class| definition.behavior_definition(index, Some(class)).is_some())
            {
                return false;
            }

            if !filter.activity_requirements.is_empty()
                && !filter
                    .activity_requirements
                    .matches(&definition.slot_activity_tags(index))
            {
                return false;
            }

            let slot_filter = &definition.slots[index].user_tag_filter;
            match policy {
                UserTagsFilteringPolicy::NoFilter => true,
                UserTagsFilteringPolicy::Combine => slot_filter.matches(&filter.user_tags),
                UserTagsFilteringPolicy::Override => {
                    if slot_filter.is_empty() {
                        definition.user_tag_filter.matches(&filter.user_tags)
                    } else {
                        slot_filter.matches(&filter.user_tags)
                    }
                }
            }
        })
        .collect()
}

impl SmartObjectSubsystem {
    /// Appends the slots of a locked object accepted by `filter`.
    fn find_slots_internal(
        &self,
        object: &mut RuntimeObject,
        filter: &RequestFilter,
        user_data: Option<&UserPayload>,
        out: &mut Vec<SlotHandle>,
    ) {
        if !object.is_enabled() {
            return;
        }
        let handle = object.handle();
        if let Some(predicate) = &filter.predicate {
            if !predicate(handle) {
                return;
            }
        }

        let definition = object.definition().clone();
        let indices = matching_slot_indices(&definition, filter);
        if indices.is_empty() {
            return;
        }

        if filter.evaluate_conditions
            && !object.evaluate_object_conditions(self.resolver.as_ref(), &filter.user_tags, user_data)
        {
            trace!("Object conditions of '{}' rejected the request", handle);
            return;
        }

        for index in indices {
            let Some(slot) = object.slot(index) else {
                continue;
            };
            if !filter.include_disabled_slots && !slot.is_enabled() {
                continue;
            }
            let available = filter.include_claimed_slots
                || slot.state() == SlotState::Free
                || (slot.state() == SlotState::Claimed && slot.claim_priority() < filter.claim_priority);
            if !available {
                continue;
            }
            if filter.evaluate_conditions
                && !object.evaluate_slot_conditions(index, self.resolver.as_ref(), &filter.user_tags, user_data)
            {
                continue;
            }
            out.push(SlotHandle::new(handle, index));
        }
    }

    /// Slots of one object accepted by `filter`.
    pub fn find_slots(
        &self,
        handle: ObjectHandle,
        filter: &RequestFilter,
        user_data: Option<&UserPayload>,
    ) -> Vec<SlotHandle> {
        let mut slots = Vec::new();
        self.with_object(handle, "find_slots", |object, _| {
            self.find_slots_internal(object, filter, user_data, &mut slots);
        });
        slots
    }

    /// Every slot of one object, regardless of state.
    pub fn get_all_slots(&self, handle: ObjectHandle) -> Vec<SlotHandle> {
        self.with_object(handle, "get_all_slots", |object, _| {
            (0..object.slot_count())
                .map(|index| SlotHandle::new(handle, index))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Searches the spatial index and filters the slots of every hit.
    ///
    /// Objects are selected by location, not by bounds: an object whose
    /// bounds overlap the query box but whose origin lies outside it is
    /// skipped.
    pub fn find_smart_objects(
        &self,
        request: &SmartObjectRequest,
        user_data: Option<&UserPayload>,
    ) -> Vec<RequestResult> {
        if !self.is_runtime_initialized() {
            if !self.config.disable_runtime {
                warn!("find_smart_objects called before the runtime was initialized");
            }
            return Vec::new();
        }
        StatsCounters::bump(&self.stats.queries);

        let mut handles = Vec::new();
        self.spatial.lock().find(&request.query_box, &mut handles);

        let mut slots = Vec::new();
        for handle in handles {
            // Removed between the spatial query and now.
            let Some(object) = self.object_arc(handle) else {
                continue;
            };
            let mut object = object.lock();
            if !request.query_box.contains_point(object.location()) {
                continue;
            }
            self.find_slots_internal(&mut object, &request.filter, user_data, &mut slots);
        }

        debug!("find_smart_objects found {} slots", slots.len());
        slots.into_iter().map(RequestResult::new).collect()
    }

    /// Single candidate; the last one found, or an invalid result.
    pub fn find_smart_object(&self, request: &SmartObjectRequest, user_data: Option<&UserPayload>) -> RequestResult {
        self.find_smart_objects(request, user_data)
            .last()
            .copied()
            .unwrap_or_default()
    }

    /// Like [`Self::find_smart_objects`] but over the objects bound to the
    /// given components instead of a spatial query.
    pub fn find_smart_objects_in_list(
        &self,
        filter: &RequestFilter,
        components: &[ComponentId],
        user_data: Option<&UserPayload>,
    ) -> Vec<RequestResult> {
        let handles: Vec<ObjectHandle> = {
            let registrations = self.components.read();
            components
                .iter()
                .filter_map(|id| registrations.get(id).map(|registration| registration.handle))
                .collect()
        };

        handles
            .into_iter()
            .flat_map(|handle| self.find_slots(handle, filter, user_data))
            .map(RequestResult::new)
            .collect()
    }

    // ========================================================================
    // Selection conditions
    // ========================================================================

    /// Keeps the slots whose object and slot selection conditions hold.
    ///
    /// Object conditions are evaluated once per run of consecutive slots of
    /// the same object.
    pub fn filter_slots_by_selection_conditions(
        &self,
        slots: &[SlotHandle],
        user_tags: &TagContainer,
        user_data: Option<&UserPayload>,
    ) -> Vec<SlotHandle> {
        let mut cached: Option<(ObjectHandle, bool)> = None;
        slots
            .iter()
            .copied()
            .filter(|slot| self.evaluate_selection_conditions_cached(*slot, user_tags, user_data, &mut cached))
            .collect()
    }

    pub fn filter_results_by_selection_conditions(
        &self,
        results: &[RequestResult],
        user_tags: &TagContainer,
        user_data: Option<&UserPayload>,
    ) -> Vec<RequestResult> {
        let mut cached: Option<(ObjectHandle, bool)> = None;
        results
            .iter()
            .copied()
            .filter(|result| self.evaluate_selection_conditions_cached(result.slot, user_tags, user_data, &mut cached))
            .collect()
    }

    /// Object and slot selection conditions for one slot.
    pub fn evaluate_selection_conditions(
        &self,
        slot: SlotHandle,
        user_tags: &TagContainer,
        user_data: Option<&UserPayload>,
    ) -> bool {
        self.evaluate_selection_conditions_cached(slot, user_tags, user_data, &mut None)
    }

    fn evaluate_selection_conditions_cached(
        &self,
        slot: SlotHandle,
        user_tags: &TagContainer,
        user_data: Option<&UserPayload>,
        cached: &mut Option<(ObjectHandle, bool)>,
    ) -> bool {
        self.with_slot(slot, "evaluate_selection_conditions", |object, index, _| {
            let object_passed = match *cached {
                Some((handle, passed)) if handle == slot.object => passed,
                _ => {
                    let passed = object.evaluate_object_conditions(self.resolver.as_ref(), user_tags, user_data);
                    *cached = Some((slot.object, passed));
                    passed
                }
            };
            object_passed && object.evaluate_slot_conditions(index, self.resolver.as_ref(), user_tags, user_data)
        })
        .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{BehaviorDefinition, SlotDefinition};
    use crate::math::Vec3;
    use crate::tags::Tag;

    fn definition(policy: UserTagsFilteringPolicy) -> SmartObjectDefinition {
        let mut bench = SlotDefinition::at(Vec3::new(-50.0, 0.0, 0.0));
        bench.activity_tags.add(Tag::new("Activity.Sit"));
        bench.behavior_definitions.push(BehaviorDefinition::new("Sit"));
        bench.user_tag_filter = TagQuery::any([Tag::new("Role.Guard")]);

        let mut counter = SlotDefinition::at(Vec3::new(50.0, 0.0, 0.0));
        counter.activity_tags.add(Tag::new("Activity.Work"));

        let mut definition = SmartObjectDefinition::new("Stall", vec![bench, counter]);
        definition.user_tag_filter = TagQuery::any([Tag::new("Role.Villager")]);
        definition.user_tags_filtering_policy = policy;
        definition
    }

    fn villager() -> TagContainer {
        [Tag::new("Role.Villager")].into_iter().collect()
    }

    #[test]
    fn override_policy_prefers_the_slot_filter() {
        let definition = definition(UserTagsFilteringPolicy::Override);
        let filter = RequestFilter::default().with_user_tags(villager());
        assert_eq!(matching_slot_indices(&definition, &filter), vec![1]);
    }

    #[test]
    fn combine_policy_requires_both_filters() {
        let definition = definition(UserTagsFilteringPolicy::Combine);
        let filter = RequestFilter::default().with_user_tags(villager());
        // The counter has no slot filter, so the empty query lets it through.
        assert_eq!(matching_slot_indices(&definition, &filter), vec![1]);

        let guard: TagContainer = [Tag::new("Role.Guard")].into_iter().collect();
        let filter = RequestFilter::default().with_user_tags(guard);
        assert!(matching_slot_indices(&definition, &filter).is_empty());
    }

    #[test]
    fn no_filter_policy_ignores_user_tags() {
        let definition = definition(UserTagsFilteringPolicy::NoFilter);
        assert_eq!(matching_slot_indices(&definition, &RequestFilter::default()), vec![0, 1]);
    }

    #[test]
    fn activity_and_behavior_requirements() {
        let definition = definition(UserTagsFilteringPolicy::NoFilter);

        let filter = RequestFilter::default().with_activity_requirements(TagQuery::any([Tag::new("Activity.Work")]));
        assert_eq!(matching_slot_indices(&definition, &filter), vec![1]);

        let filter = RequestFilter::default().with_behavior_class("Sit");
        assert_eq!(matching_slot_indices(&definition, &filter), vec![0]);

        let filter = RequestFilter::default().with_behavior_class("Dance");
        assert!(matching_slot_indices(&definition, &filter).is_empty());
    }
}
