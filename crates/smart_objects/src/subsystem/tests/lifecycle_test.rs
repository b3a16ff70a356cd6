//! Object lifecycle, component registration and collections

use super::support::{bench_definition, initialized, slot, with_bench_at, EventLog};
use crate::collection::{CollectionId, CollectionRegistrationResult, PersistentCollection};
use crate::component::{RegistrationType, SmartObjectComponent};
use crate::config::SubsystemConfig;
use crate::definition::SmartObjectDefinition;
use crate::events::{ChangeReason, ReleaseInfo};
use crate::math::{Box3, Transform, Vec3};
use crate::subsystem::{RequestFilter, SmartObjectRequest, SmartObjectSubsystem};
use crate::tags::TagContainer;
use crate::types::{ClaimHandle, ClaimPriority, ObjectHandle, OwnerData, SlotState};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

fn collection_with(entries: &[(ObjectHandle, Vec3)], definition: &Arc<SmartObjectDefinition>) -> PersistentCollection {
    let mut collection = PersistentCollection::new("Plaza");
    for (handle, location) in entries {
        assert!(collection.container.add_entry(
            *handle,
            definition,
            Transform::from_location(*location),
            TagContainer::new(),
            None,
        ));
    }
    collection
}

fn everything() -> SmartObjectRequest {
    SmartObjectRequest::new(
        Box3::from_center_extent(Vec3::ZERO, Vec3::splat(100_000.0)),
        RequestFilter::default(),
    )
}

#[test]
fn creation_requires_initialized_runtime_and_valid_definition() {
    let subsystem = SmartObjectSubsystem::new(SubsystemConfig::default());
    let handle = subsystem.create_smart_object(bench_definition(), Transform::IDENTITY, OwnerData::None);
    assert_eq!(handle, ObjectHandle::INVALID);

    subsystem.initialize_runtime();
    let empty = Arc::new(SmartObjectDefinition::new("Empty", Vec::new()));
    assert!(!subsystem
        .create_smart_object(empty, Transform::IDENTITY, OwnerData::None)
        .is_valid());
    assert_eq!(subsystem.object_count(), 0);
}

#[test]
fn disabled_runtime_never_initializes() {
    let config = SubsystemConfig {
        disable_runtime: true,
        ..SubsystemConfig::default()
    };
    let subsystem = SmartObjectSubsystem::new(config);
    subsystem.initialize_runtime();
    assert!(!subsystem.is_runtime_initialized());
    assert!(subsystem.find_smart_objects(&everything(), None).is_empty());
}

#[test]
fn destroy_aborts_claims_and_invokes_invalidation() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let invalidated = Arc::new(Mutex::new(Vec::new()));

    let claimed = subsystem.claim(slot(handle, 0), ClaimPriority::Normal, None);
    let sink = invalidated.clone();
    subsystem.register_slot_invalidation_callback(
        claimed,
        Arc::new(move |claim: ClaimHandle, state: SlotState| sink.lock().push((claim, state))),
    );
    let occupied = subsystem.claim(slot(handle, 1), ClaimPriority::Normal, None);
    assert!(subsystem.mark_slot_as_occupied(occupied, None).is_some());

    let log = EventLog::attach(&subsystem);
    assert!(subsystem.destroy_smart_object(handle));

    assert_eq!(
        log.reasons(),
        vec![
            ChangeReason::OnReleased,
            ChangeReason::OnReleased,
            ChangeReason::OnObjectDisabled
        ]
    );
    let aborted = Some(ReleaseInfo { aborted: true, overridden: false });
    assert!(log.events()[..2].iter().all(|event| event.release == aborted));
    assert_eq!(invalidated.lock().as_slice(), &[(claimed, SlotState::Claimed)]);

    assert!(!subsystem.release(occupied));
    assert!(!subsystem.destroy_smart_object(handle));
    assert_eq!(subsystem.stats().aborted_releases, 2);
    assert_eq!(subsystem.stats().objects_destroyed, 1);
}

#[test]
fn transform_update_moves_the_spatial_entry() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let near_origin = SmartObjectRequest::new(
        Box3::from_center_extent(Vec3::ZERO, Vec3::splat(200.0)),
        RequestFilter::default(),
    );
    assert_eq!(subsystem.find_smart_objects(&near_origin, None).len(), 2);

    assert!(subsystem.update_smart_object_transform(handle, Transform::from_location(Vec3::new(5000.0, 0.0, 0.0))));
    assert!(subsystem.find_smart_objects(&near_origin, None).is_empty());

    let far = SmartObjectRequest::new(
        Box3::from_center_extent(Vec3::new(5000.0, 0.0, 0.0), Vec3::splat(200.0)),
        RequestFilter::default(),
    );
    assert_eq!(subsystem.find_smart_objects(&far, None).len(), 2);
    assert!(!subsystem.update_smart_object_transform(ObjectHandle::INVALID, Transform::IDENTITY));
}

#[test]
fn components_registered_early_are_processed_on_initialization() {
    let subsystem = SmartObjectSubsystem::new(SubsystemConfig::default());
    let log = EventLog::attach(&subsystem);
    let component = SmartObjectComponent::new(Uuid::new_v4(), bench_definition(), Transform::IDENTITY);
    let id = component.id;
    let handle = component.handle();

    assert!(subsystem.register_smart_object(component.clone()));
    assert!(!subsystem.register_smart_object(component));
    assert_eq!(subsystem.stats().pending_components, 1);
    assert_eq!(subsystem.object_count(), 0);

    subsystem.initialize_runtime();
    assert_eq!(subsystem.stats().pending_components, 0);
    assert!(subsystem.is_smart_object_valid(handle));
    assert_eq!(
        log.reasons(),
        vec![ChangeReason::OnObjectEnabled, ChangeReason::OnComponentBound]
    );

    let registration = subsystem.component_registration(id).expect("registered");
    assert_eq!(registration.registration_type, RegistrationType::Dynamic);
    assert!(registration.bound);
    assert_eq!(registration.handle, handle);
}

#[test]
fn pending_component_can_be_withdrawn() {
    let subsystem = SmartObjectSubsystem::new(SubsystemConfig::default());
    let component = SmartObjectComponent::new(Uuid::new_v4(), bench_definition(), Transform::IDENTITY);
    let id = component.id;

    assert!(subsystem.register_smart_object(component));
    assert!(subsystem.unregister_smart_object(id));
    assert!(!subsystem.unregister_smart_object(id));
    subsystem.initialize_runtime();
    assert_eq!(subsystem.object_count(), 0);
}

#[test]
fn registration_refuses_missing_or_invalid_definitions() {
    let subsystem = initialized();
    let mut component = SmartObjectComponent::new(Uuid::new_v4(), bench_definition(), Transform::IDENTITY);
    component.definition = None;
    assert!(!subsystem.register_smart_object(component.clone()));

    component.definition = Some(Arc::new(SmartObjectDefinition::new("NoSlots", Vec::new())));
    assert!(!subsystem.register_smart_object(component));
    assert_eq!(subsystem.object_count(), 0);
}

#[test]
fn unregistering_dynamic_component_destroys_its_object() {
    let subsystem = initialized();
    let component = SmartObjectComponent::new(Uuid::new_v4(), bench_definition(), Transform::IDENTITY);
    let id = component.id;
    let handle = component.handle();

    assert!(subsystem.register_smart_object(component));
    assert!(subsystem.is_smart_object_valid(handle));
    assert!(subsystem.unregister_smart_object(id));
    assert!(!subsystem.is_smart_object_valid(handle));
    assert!(subsystem.component_registration(id).is_none());
    assert!(subsystem.main_container().is_empty());
}

#[test]
fn component_bound_to_collection_entry_is_only_unbound() {
    let definition = bench_definition();
    let component = SmartObjectComponent::new(Uuid::new_v4(), definition.clone(), Transform::IDENTITY);
    let handle = component.handle();
    let id = component.id;

    let subsystem = SmartObjectSubsystem::new(SubsystemConfig::default());
    let collection = collection_with(&[(handle, Vec3::ZERO)], &definition);
    assert_eq!(subsystem.register_collection(collection), CollectionRegistrationResult::Succeeded);
    subsystem.initialize_runtime();
    assert!(subsystem.is_smart_object_valid(handle));

    let log = EventLog::attach(&subsystem);
    assert!(subsystem.register_smart_object(component));
    let registration = subsystem.component_registration(id).expect("registered");
    assert_eq!(registration.registration_type, RegistrationType::BindToExistingInstance);
    assert!(matches!(subsystem.get_owner_data(handle), Some(OwnerData::Actor(_))));

    assert!(subsystem.unregister_smart_object(id));
    assert!(subsystem.is_smart_object_valid(handle));
    assert_eq!(
        log.reasons(),
        vec![ChangeReason::OnComponentBound, ChangeReason::OnComponentUnbound]
    );
}

#[test]
fn remove_smart_object_destroys_even_bound_instances() {
    let definition = bench_definition();
    let component = SmartObjectComponent::new(Uuid::new_v4(), definition.clone(), Transform::IDENTITY);
    let handle = component.handle();
    let id = component.id;

    let subsystem = initialized();
    let collection = collection_with(&[(handle, Vec3::ZERO)], &definition);
    assert_eq!(subsystem.register_collection(collection), CollectionRegistrationResult::Succeeded);
    assert!(subsystem.register_smart_object(component));

    assert!(subsystem.remove_smart_object(id));
    assert!(!subsystem.is_smart_object_valid(handle));
    assert!(!subsystem.remove_smart_object(id));
}

#[test]
fn collections_register_and_unregister() {
    let definition = bench_definition();
    let handles = [ObjectHandle::dynamic(), ObjectHandle::dynamic()];
    let collection = collection_with(
        &[(handles[0], Vec3::ZERO), (handles[1], Vec3::new(800.0, 0.0, 0.0))],
        &definition,
    );
    let id = collection.id;

    let subsystem = SmartObjectSubsystem::new(SubsystemConfig::default());
    assert_eq!(subsystem.register_collection(collection.clone()), CollectionRegistrationResult::Succeeded);
    assert_eq!(
        subsystem.register_collection(collection),
        CollectionRegistrationResult::FailedAlreadyRegistered
    );
    assert_eq!(subsystem.object_count(), 0);

    subsystem.initialize_runtime();
    assert_eq!(subsystem.object_count(), 2);
    assert_eq!(subsystem.find_smart_objects(&everything(), None).len(), 4);

    // Entries destroyed explicitly are skipped on unregistration.
    assert!(subsystem.destroy_smart_object(handles[0]));
    assert!(subsystem.unregister_collection(id));
    assert_eq!(subsystem.object_count(), 0);
    assert!(subsystem.main_container().is_empty());
    assert!(!subsystem.unregister_collection(id));
}

#[test]
fn invalid_collection_is_refused() {
    let subsystem = initialized();
    let mut collection = PersistentCollection::new("Broken");
    collection.id = CollectionId(Uuid::nil());
    assert_eq!(
        subsystem.register_collection(collection),
        CollectionRegistrationResult::FailedInvalidCollection
    );
}

#[test]
fn collection_registered_after_initialization_is_simulated_immediately() {
    let subsystem = initialized();
    let handle = ObjectHandle::dynamic();
    let collection = collection_with(&[(handle, Vec3::new(0.0, 300.0, 0.0))], &bench_definition());
    assert_eq!(subsystem.register_collection(collection), CollectionRegistrationResult::Succeeded);
    assert!(subsystem.is_smart_object_valid(handle));
}

#[test]
fn definition_mismatch_requests_rebuild() {
    let subsystem = initialized();
    let component = SmartObjectComponent::new(Uuid::new_v4(), bench_definition(), Transform::IDENTITY);
    let handle = component.handle();
    assert!(subsystem.register_smart_object(component.clone()));
    assert!(!subsystem.collection_needs_rebuild());

    let mut collection = PersistentCollection::new("Stale");
    collection.container.add_entry(
        handle,
        &bench_definition(),
        Transform::IDENTITY,
        TagContainer::new(),
        Some(component.id),
    );
    assert_eq!(subsystem.register_collection(collection), CollectionRegistrationResult::Succeeded);
    assert!(subsystem.collection_needs_rebuild());
    assert_eq!(subsystem.object_count(), 1);
}

#[test]
fn cleanup_requeues_components_for_the_next_initialization() {
    let subsystem = initialized();
    let component = SmartObjectComponent::new(Uuid::new_v4(), bench_definition(), Transform::IDENTITY);
    let handle = component.handle();
    assert!(subsystem.register_smart_object(component));
    let dynamic = subsystem.create_smart_object(bench_definition(), Transform::IDENTITY, OwnerData::None);
    assert!(dynamic.is_valid());

    subsystem.cleanup_runtime();
    assert!(!subsystem.is_runtime_initialized());
    assert_eq!(subsystem.object_count(), 0);
    assert_eq!(subsystem.stats().pending_components, 1);

    subsystem.initialize_runtime();
    assert!(subsystem.is_smart_object_valid(handle));
    assert!(!subsystem.is_smart_object_valid(dynamic));
}
