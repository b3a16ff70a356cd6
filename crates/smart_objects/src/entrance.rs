//! # Entrance Locations
//!
//! Finds where a user should stand to enter or leave a slot. Candidates come
//! from the slot's entrance annotations (or the slot location itself as a
//! fallback), are ranked, then validated one by one against the host's
//! navigation and collision data through a [`NavigationValidator`].
//!
//! ## Validation stages
//!
//! Each candidate runs through the requested stages in order and stops at the
//! first failure:
//!
//! 1. Projection onto navigable space (replaces the location)
//! 2. Ground trace (replaces the location)
//! 3. User capsule overlap at the entrance
//! 4. Transition trajectory between the entrance and the slot
//!
//! A blocked slot location invalidates every candidate of that slot.

use crate::config::EntranceConfig;
use crate::definition::{EntranceAnnotation, SlotDefinition, SmartObjectDefinition, UserCapsuleParams};
use crate::math::{Box3, Capsule, Rotator, Transform, Vec3};
use crate::subsystem::SmartObjectSubsystem;
use crate::tags::TagContainer;
use crate::types::{EntranceKind, ObjectHandle, SlotEntranceHandle, SlotHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Navigation and collision queries supplied by the host.
pub trait NavigationValidator: Send + Sync {
    /// Whether any navigation data is loaded
    fn has_navigation_data(&self) -> bool;

    /// Closest navigable point to `point` inside `search_box`
    fn project_to_navigable(&self, point: Vec3, search_box: &Box3) -> Option<Vec3>;

    /// Ground hit below or above `point` inside `search_box`
    fn trace_ground(&self, point: Vec3, search_box: &Box3) -> Option<Vec3>;

    /// Returns `true` when any of the colliders hits the world
    fn test_overlap(&self, colliders: &[Capsule]) -> bool;
}

/// How candidates are ordered before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntranceSelectMethod {
    /// Highest priority first, then definition order
    #[default]
    First,
    /// Highest priority first, then closest to the search location
    NearestToSearchLocation,
}

/// Whether the user is arriving at or leaving the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntranceLocationType {
    #[default]
    Entry,
    Exit,
}

/// Which candidates to consider and how strictly to validate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntranceLocationRequest {
    /// Reference point for [`EntranceSelectMethod::NearestToSearchLocation`]
    pub search_location: Option<Vec3>,
    pub select_method: EntranceSelectMethod,
    pub location_type: EntranceLocationType,
    pub project_navigation_location: bool,
    pub trace_ground_location: bool,
    pub check_transition_trajectory: bool,
    pub check_entrance_location_overlap: bool,
    pub check_slot_location_overlap: bool,
    /// Validate the slot location when the slot has no matching entrance
    pub use_slot_location_as_fallback: bool,
    /// Keep only the yaw of the result rotation
    pub use_up_axis_locked_rotation: bool,
    /// Capsule used for overlap checks; the configured default when `None`
    pub user_capsule: Option<UserCapsuleParams>,
    /// Box half-size for navigation projection; the configured default when `None`
    pub search_extents: Option<Vec3>,
}

impl Default for EntranceLocationRequest {
    fn default() -> Self {
        Self {
            search_location: None,
            select_method: EntranceSelectMethod::First,
            location_type: EntranceLocationType::Entry,
            project_navigation_location: true,
            trace_ground_location: true,
            check_transition_trajectory: true,
            check_entrance_location_overlap: true,
            check_slot_location_overlap: true,
            use_slot_location_as_fallback: false,
            use_up_axis_locked_rotation: false,
            user_capsule: None,
            search_extents: None,
        }
    }
}

impl EntranceLocationRequest {
    /// A request that runs no validation stage.
    pub fn unchecked() -> Self {
        Self {
            project_navigation_location: false,
            trace_ground_location: false,
            check_transition_trajectory: false,
            check_entrance_location_overlap: false,
            check_slot_location_overlap: false,
            ..Self::default()
        }
    }

    pub fn nearest_to(mut self, location: Vec3) -> Self {
        self.search_location = Some(location);
        self.select_method = EntranceSelectMethod::NearestToSearchLocation;
        self
    }

    pub fn for_exit(mut self) -> Self {
        self.location_type = EntranceLocationType::Exit;
        self
    }

    pub fn with_slot_fallback(mut self) -> Self {
        self.use_slot_location_as_fallback = true;
        self
    }
}

/// One candidate after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct EntranceLocationResult {
    pub location: Vec3,
    pub rotation: Rotator,
    /// Tags of the entrance annotation; empty for the slot location
    pub tags: TagContainer,
    pub entrance: SlotEntranceHandle,
    pub is_valid: bool,
}

// ============================================================================
// Candidate collection
// ============================================================================

struct Candidate<'a> {
    kind: EntranceKind,
    transform: Transform,
    annotation: Option<&'a EntranceAnnotation>,
    trace_ground: bool,
    priority: u8,
    distance_sq: f64,
}

fn collect_candidates<'a>(
    slot: &'a SlotDefinition,
    slot_transform: &Transform,
    request: &EntranceLocationRequest,
    only: Option<EntranceKind>,
) -> Vec<Candidate<'a>> {
    let reference = request.search_location.unwrap_or(slot_transform.location);
    let mut candidates = Vec::new();

    if only != Some(EntranceKind::Slot) {
        for (index, annotation) in slot.entrances() {
            if only.is_some_and(|kind| kind != EntranceKind::Entrance(index)) {
                continue;
            }
            let direction_ok = match request.location_type {
                EntranceLocationType::Entry => annotation.is_entry,
                EntranceLocationType::Exit => annotation.is_exit,
            };
            if !direction_ok {
                continue;
            }
            let transform = slot_transform.compose(&Transform::new(annotation.offset, annotation.rotation));
            candidates.push(Candidate {
                kind: EntranceKind::Entrance(index),
                distance_sq: transform.location.dist_squared(reference),
                transform,
                annotation: Some(annotation),
                trace_ground: annotation.trace_ground_location,
                priority: annotation.selection_priority,
            });
        }
    }

    let wants_slot = only == Some(EntranceKind::Slot)
        || (only.is_none() && candidates.is_empty() && request.use_slot_location_as_fallback);
    if wants_slot {
        candidates.push(Candidate {
            kind: EntranceKind::Slot,
            transform: *slot_transform,
            annotation: None,
            trace_ground: true,
            priority: 0,
            distance_sq: slot_transform.location.dist_squared(reference),
        });
    }

    match request.select_method {
        EntranceSelectMethod::First => candidates.sort_by(|a, b| b.priority.cmp(&a.priority)),
        EntranceSelectMethod::NearestToSearchLocation => {
            if request.search_location.is_none() {
                debug!("Nearest entrance requested without a search location, using the slot location");
            }
            candidates.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.distance_sq.total_cmp(&b.distance_sq))
            });
        }
    }
    candidates
}

/// Capsules swept along the straight line between two points.
fn trajectory_colliders(from: Vec3, to: Vec3, radius: f64, capsule: &UserCapsuleParams) -> Vec<Capsule> {
    let radius = radius.max(1.0);
    let params = UserCapsuleParams {
        radius,
        height: capsule.height.max(radius * 2.0),
        step_height: capsule.step_height,
    };
    let length = from.distance(to);
    let steps = (length / (radius * 2.0)).ceil().max(1.0) as usize;
    (0..=steps)
        .map(|step| {
            let t = step as f64 / steps as f64;
            params.collider_at(from + (to - from) * t)
        })
        .collect()
}

// ============================================================================
// Validation
// ============================================================================

/// Validates the candidates of one slot in ranked order.
///
/// `on_result` sees every validated candidate, valid or not, and returns
/// whether to keep going.
#[allow(clippy::too_many_arguments)]
fn validate_slot_entrances(
    definition: &SmartObjectDefinition,
    object_transform: &Transform,
    slot: SlotHandle,
    request: &EntranceLocationRequest,
    config: &EntranceConfig,
    validator: &dyn NavigationValidator,
    only: Option<EntranceKind>,
    on_result: &mut dyn FnMut(EntranceLocationResult) -> bool,
) -> bool {
    let Some(slot_definition) = definition.slots.get(slot.index) else {
        return true;
    };
    let Some(slot_transform) = definition.slot_world_transform(slot.index, object_transform) else {
        return true;
    };

    if request.project_navigation_location && !validator.has_navigation_data() {
        warn!("Entrance validation requested navigation projection but no navigation data is loaded");
        return false;
    }

    let user_capsule = request.user_capsule.unwrap_or(config.default_user_capsule);
    // Only slots that declare user collision are checked.
    let slot_blocked = request.check_slot_location_overlap
        && slot_definition
            .user_collision()
            .is_some_and(|collision| validator.test_overlap(&[collision.capsule.collider_at(slot_transform.location)]));
    if slot_blocked {
        debug!("Slot {} location is blocked", slot);
    }

    let navigation_extents = request.search_extents.unwrap_or(config.navigation_search_extents);

    for candidate in collect_candidates(slot_definition, &slot_transform, request, only) {
        let mut location = candidate.transform.location;
        let mut is_valid = !slot_blocked;
        // Projection and ground trace share one box around the unadjusted candidate.
        let search_box = Box3::from_center_extent(location, navigation_extents);

        if is_valid && request.project_navigation_location {
            match validator.project_to_navigable(location, &search_box) {
                Some(projected) => location = projected,
                None => is_valid = false,
            }
        }

        if is_valid && request.trace_ground_location && candidate.trace_ground {
            match validator.trace_ground(location, &search_box) {
                Some(ground) => location = ground,
                None => is_valid = false,
            }
        }

        if is_valid && request.check_entrance_location_overlap {
            is_valid = !validator.test_overlap(&[user_capsule.collider_at(location)]);
        }

        if is_valid && request.check_transition_trajectory {
            if let Some(annotation) = candidate.annotation.filter(|a| a.check_transition_trajectory) {
                let colliders = trajectory_colliders(
                    location,
                    slot_transform.location,
                    annotation.trajectory_radius,
                    &user_capsule,
                );
                is_valid = !validator.test_overlap(&colliders);
            }
        }

        let mut rotation = candidate.transform.rotation;
        if request.location_type == EntranceLocationType::Exit {
            rotation = rotation.add(0.0, 180.0, 0.0).clamp();
        }
        if request.use_up_axis_locked_rotation {
            rotation = rotation.up_axis_locked();
        }

        let result = EntranceLocationResult {
            location,
            rotation,
            tags: candidate.annotation.map(|a| a.tags.clone()).unwrap_or_default(),
            entrance: SlotEntranceHandle::new(slot, candidate.kind),
            is_valid,
        };
        if !on_result(result) {
            return false;
        }
    }
    true
}

/// Validates every entrance of every slot of a definition placed at
/// `transform`, without a live instance. Result handles carry an invalid
/// object.
pub fn query_all_validated_entrance_locations(
    definition: &SmartObjectDefinition,
    transform: &Transform,
    request: &EntranceLocationRequest,
    config: &EntranceConfig,
    validator: &dyn NavigationValidator,
) -> Vec<EntranceLocationResult> {
    let mut results = Vec::new();
    for index in 0..definition.slot_count() {
        let slot = SlotHandle::new(ObjectHandle::INVALID, index);
        let keep_going = validate_slot_entrances(
            definition,
            transform,
            slot,
            request,
            config,
            validator,
            None,
            &mut |result: EntranceLocationResult| {
                results.push(result);
                true
            },
        );
        if !keep_going {
            break;
        }
    }
    results
}

impl SmartObjectSubsystem {
    /// First valid entrance location of a slot.
    pub fn find_entrance_location_for_slot(
        &self,
        slot: SlotHandle,
        request: &EntranceLocationRequest,
        validator: &dyn NavigationValidator,
    ) -> Option<EntranceLocationResult> {
        self.first_valid_entrance(slot, request, validator, None)
    }

    /// Revalidates a single entrance, typically one returned earlier, after
    /// the world around it may have changed.
    pub fn update_entrance_location(
        &self,
        entrance: SlotEntranceHandle,
        request: &EntranceLocationRequest,
        validator: &dyn NavigationValidator,
    ) -> Option<EntranceLocationResult> {
        if !entrance.is_valid() {
            debug!("update_entrance_location called with an invalid entrance handle");
            return None;
        }
        self.first_valid_entrance(entrance.slot, request, validator, Some(entrance.kind))
    }

    fn first_valid_entrance(
        &self,
        slot: SlotHandle,
        request: &EntranceLocationRequest,
        validator: &dyn NavigationValidator,
        only: Option<EntranceKind>,
    ) -> Option<EntranceLocationResult> {
        if !self.is_smart_object_slot_valid(slot) {
            return None;
        }
        // Copied out so the validator runs without any object lock held.
        let definition = self.object_definition(slot.object)?;
        let transform = self.get_object_transform(slot.object)?;

        let mut found = None;
        validate_slot_entrances(
            &definition,
            &transform,
            slot,
            request,
            &self.config().entrance,
            validator,
            only,
            &mut |result: EntranceLocationResult| {
                if result.is_valid {
                    found = Some(result);
                    return false;
                }
                true
            },
        );
        found
    }
}
