//! # Smart Object Definitions
//!
//! Read-only schema shared by every instance of one kind of smart object:
//! slot layout, activity and user tags, preconditions, behavior definitions
//! and per-slot annotations such as entrances.
//!
//! Definitions are loaded by the host (the simulation reads them from TOML)
//! and shared as `Arc<SmartObjectDefinition>`. Collections deduplicate them
//! by pointer identity.
//!
//! ## Key Types
//!
//! - [`SmartObjectDefinition`] - Object-level schema
//! - [`SlotDefinition`] - One slot: offset, tags, preconditions, annotations
//! - [`BehaviorDefinition`] - What a user does once it occupies a slot
//! - [`SlotAnnotation`] - Entrance locations and user collision
//! - [`UserTagsFilteringPolicy`] - How slot and object user filters combine

use crate::conditions::PreconditionSet;
use crate::error::DefinitionError;
use crate::math::{Box3, Capsule, Rotator, Transform, Vec3};
use crate::tags::{TagContainer, TagQuery};
use serde::{Deserialize, Serialize};

/// Half-size of the box put around each slot when a definition has no explicit bounds.
const DEFAULT_SLOT_EXTENT: f64 = 50.0;

fn default_true() -> bool {
    true
}

// ============================================================================
// Behaviors and filters
// ============================================================================

/// Describes the behavior a user runs while occupying a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDefinition {
    /// Behavior kind, used to select among several definitions on one slot
    pub class: String,
    #[serde(default)]
    pub name: String,
    /// Opaque parameters interpreted by the behavior implementation
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub parameters: serde_json::Value,
}

impl BehaviorDefinition {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: String::new(),
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// How the object-level user filter relates to a slot's own filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserTagsFilteringPolicy {
    /// User tags are ignored
    NoFilter,
    /// Both the object filter and the slot filter must match
    Combine,
    /// A non-empty slot filter replaces the object filter
    #[default]
    Override,
}

// ============================================================================
// Annotations
// ============================================================================

/// Size of the capsule a user occupies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserCapsuleParams {
    pub radius: f64,
    pub height: f64,
    /// Height the user can step over; the overlap capsule starts above it.
    #[serde(default)]
    pub step_height: f64,
}

impl Default for UserCapsuleParams {
    fn default() -> Self {
        Self { radius: 35.0, height: 180.0, step_height: 45.0 }
    }
}

impl UserCapsuleParams {
    /// Capsule for a user standing with its feet at `location`.
    pub fn collider_at(&self, location: Vec3) -> Capsule {
        let max_step = (self.height - self.radius * 2.0).max(0.0);
        let step = self.step_height.max(0.0).min(max_step);
        let half_height = (self.height - step) * 0.5;
        Capsule {
            center: Vec3::new(location.x, location.y, location.z + step + half_height),
            radius: self.radius,
            half_height,
        }
    }
}

/// A location from which a user can enter or leave a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntranceAnnotation {
    /// Offset relative to the slot
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default)]
    pub rotation: Rotator,
    #[serde(default = "default_true")]
    pub is_entry: bool,
    #[serde(default = "default_true")]
    pub is_exit: bool,
    #[serde(default)]
    pub tags: TagContainer,
    #[serde(default = "default_true")]
    pub trace_ground_location: bool,
    #[serde(default = "default_true")]
    pub check_transition_trajectory: bool,
    /// Higher values are tried first
    #[serde(default)]
    pub selection_priority: u8,
    #[serde(default = "default_trajectory_radius")]
    pub trajectory_radius: f64,
}

fn default_trajectory_radius() -> f64 {
    10.0
}

impl Default for EntranceAnnotation {
    fn default() -> Self {
        Self {
            offset: Vec3::ZERO,
            rotation: Rotator::ZERO,
            is_entry: true,
            is_exit: true,
            tags: TagContainer::new(),
            trace_ground_location: true,
            check_transition_trajectory: true,
            selection_priority: 0,
            trajectory_radius: default_trajectory_radius(),
        }
    }
}

/// Collision volume of a user occupying the slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotUserCollision {
    pub capsule: UserCapsuleParams,
}

/// Typed records attached to a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SlotAnnotation {
    Entrance(EntranceAnnotation),
    UserCollision(SlotUserCollision),
}

// ============================================================================
// Slot definition
// ============================================================================

/// Schema for one slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDefinition {
    #[serde(default)]
    pub name: String,
    /// Offset relative to the object transform
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default)]
    pub rotation: Rotator,
    /// Initial enabled state of the slot
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tags copied onto the runtime slot at creation
    #[serde(default)]
    pub runtime_tags: TagContainer,
    #[serde(default)]
    pub activity_tags: TagContainer,
    #[serde(default)]
    pub user_tag_filter: TagQuery,
    #[serde(default)]
    pub selection_preconditions: PreconditionSet,
    #[serde(default)]
    pub behavior_definitions: Vec<BehaviorDefinition>,
    #[serde(default)]
    pub annotations: Vec<SlotAnnotation>,
}

impl Default for SlotDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            offset: Vec3::ZERO,
            rotation: Rotator::ZERO,
            enabled: true,
            runtime_tags: TagContainer::new(),
            activity_tags: TagContainer::new(),
            user_tag_filter: TagQuery::Empty,
            selection_preconditions: PreconditionSet::default(),
            behavior_definitions: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

impl SlotDefinition {
    pub fn at(offset: Vec3) -> Self {
        Self { offset, ..Self::default() }
    }

    /// Entrance annotations with their index in `annotations`.
    pub fn entrances(&self) -> impl Iterator<Item = (usize, &EntranceAnnotation)> {
        self.annotations.iter().enumerate().filter_map(|(idx, annotation)| match annotation {
            SlotAnnotation::Entrance(entrance) => Some((idx, entrance)),
            _ => None,
        })
    }

    pub fn user_collision(&self) -> Option<&SlotUserCollision> {
        self.annotations.iter().find_map(|annotation| match annotation {
            SlotAnnotation::UserCollision(collision) => Some(collision),
            _ => None,
        })
    }

    /// Transform of the slot relative to its object.
    pub fn local_transform(&self) -> Transform {
        Transform::new(self.offset, self.rotation)
    }
}

// ============================================================================
// Object definition
// ============================================================================

/// Schema for one kind of smart object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartObjectDefinition {
    pub name: String,
    pub slots: Vec<SlotDefinition>,
    /// Local-space bounds; computed from the slots when absent
    #[serde(default)]
    pub bounds: Option<Box3>,
    #[serde(default)]
    pub activity_tags: TagContainer,
    #[serde(default)]
    pub user_tag_filter: TagQuery,
    #[serde(default)]
    pub user_tags_filtering_policy: UserTagsFilteringPolicy,
    /// Object-level selection preconditions
    #[serde(default)]
    pub preconditions: PreconditionSet,
    /// Used when a slot has no matching behavior of its own
    #[serde(default)]
    pub default_behavior_definitions: Vec<BehaviorDefinition>,
}

impl SmartObjectDefinition {
    pub fn new(name: impl Into<String>, slots: Vec<SlotDefinition>) -> Self {
        Self {
            name: name.into(),
            slots,
            bounds: None,
            activity_tags: TagContainer::new(),
            user_tag_filter: TagQuery::Empty,
            user_tags_filtering_policy: UserTagsFilteringPolicy::default(),
            preconditions: PreconditionSet::default(),
            default_behavior_definitions: Vec::new(),
        }
    }

    /// Checks the definition can be instantiated.
    ///
    /// # Returns
    ///
    /// The first problem found, or `Ok(())`.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.slots.is_empty() {
            return Err(DefinitionError::NoSlots { name: self.name.clone() });
        }

        if let Some(bounds) = &self.bounds {
            if !bounds.is_finite() || !bounds.is_valid() {
                return Err(DefinitionError::NonFiniteBounds);
            }
        }

        for (slot_index, slot) in self.slots.iter().enumerate() {
            if !slot.offset.is_finite() || !slot.rotation.is_finite() {
                return Err(DefinitionError::NonFiniteSlotOffset { slot: slot_index });
            }

            let mut collisions = 0;
            for (annotation_index, annotation) in slot.annotations.iter().enumerate() {
                match annotation {
                    SlotAnnotation::Entrance(entrance) => {
                        if !entrance.is_entry && !entrance.is_exit {
                            return Err(DefinitionError::EntranceWithoutDirection {
                                slot: slot_index,
                                annotation: annotation_index,
                            });
                        }
                        if !entrance.offset.is_finite() || !entrance.rotation.is_finite() {
                            return Err(DefinitionError::NonFiniteSlotOffset { slot: slot_index });
                        }
                    }
                    SlotAnnotation::UserCollision(_) => collisions += 1,
                }
            }
            if collisions > 1 {
                return Err(DefinitionError::DuplicateUserCollision { slot: slot_index });
            }
        }

        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Result<&SlotDefinition, DefinitionError> {
        self.slots.get(index).ok_or(DefinitionError::InvalidSlotIndex {
            index,
            count: self.slots.len(),
        })
    }

    /// Finds the behavior definition for a slot.
    ///
    /// The slot's own list is searched first, then the object defaults.
    ///
    /// # Arguments
    ///
    /// * `slot_index` - Slot to look up
    /// * `class` - Behavior kind to match, or `None` for the first available
    pub fn behavior_definition(&self, slot_index: usize, class: Option<&str>) -> Option<&BehaviorDefinition> {
        let matches = |definition: &&BehaviorDefinition| class.map_or(true, |c| definition.class == c);

        self.slots
            .get(slot_index)
            .and_then(|slot| slot.behavior_definitions.iter().find(matches))
            .or_else(|| self.default_behavior_definitions.iter().find(matches))
    }

    /// Activity tags of a slot merged with the object's.
    pub fn slot_activity_tags(&self, slot_index: usize) -> TagContainer {
        match self.slots.get(slot_index) {
            Some(slot) => slot.activity_tags.union(&self.activity_tags),
            None => self.activity_tags.clone(),
        }
    }

    /// World transform of a slot for an object placed at `object_transform`.
    pub fn slot_world_transform(&self, slot_index: usize, object_transform: &Transform) -> Option<Transform> {
        self.slots
            .get(slot_index)
            .map(|slot| object_transform.compose(&slot.local_transform()))
    }

    /// Local-space bounds of the object.
    pub fn local_bounds(&self) -> Box3 {
        if let Some(bounds) = self.bounds {
            return bounds;
        }
        let mut bounds = Box3::empty();
        for slot in &self.slots {
            bounds = bounds.union(&Box3::from_center_extent(slot.offset, Vec3::splat(DEFAULT_SLOT_EXTENT)));
        }
        if bounds.is_valid() {
            bounds
        } else {
            Box3::from_center_extent(Vec3::ZERO, Vec3::splat(DEFAULT_SLOT_EXTENT))
        }
    }

    /// World-space bounds of an instance placed at `transform`.
    pub fn world_bounds(&self, transform: &Transform) -> Box3 {
        self.local_bounds().transform_by(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tag;

    fn bench() -> SmartObjectDefinition {
        let mut left = SlotDefinition::at(Vec3::new(-50.0, 0.0, 0.0));
        left.behavior_definitions.push(BehaviorDefinition::new("Sit").with_name("left"));
        left.activity_tags.add(Tag::new("Activity.Sit"));
        let right = SlotDefinition::at(Vec3::new(50.0, 0.0, 0.0));

        let mut definition = SmartObjectDefinition::new("Bench", vec![left, right]);
        definition.activity_tags.add(Tag::new("Furniture.Bench"));
        definition
            .default_behavior_definitions
            .extend([BehaviorDefinition::new("Sit").with_name("default"), BehaviorDefinition::new("Lean")]);
        definition
    }

    #[test]
    fn behavior_lookup_prefers_slot_then_defaults() {
        let definition = bench();
        assert_eq!(definition.behavior_definition(0, Some("Sit")).unwrap().name, "left");
        assert_eq!(definition.behavior_definition(0, Some("Lean")).unwrap().class, "Lean");
        assert_eq!(definition.behavior_definition(1, Some("Sit")).unwrap().name, "default");
        assert_eq!(definition.behavior_definition(1, None).unwrap().name, "default");
        assert!(definition.behavior_definition(1, Some("Dance")).is_none());
    }

    #[test]
    fn slot_activity_tags_include_object_tags() {
        let tags = bench().slot_activity_tags(0);
        assert!(tags.has_tag(&Tag::new("Activity")));
        assert!(tags.has_tag(&Tag::new("Furniture.Bench")));
    }

    #[test]
    fn validation_rejects_malformed_definitions() {
        assert!(matches!(
            SmartObjectDefinition::new("Empty", vec![]).validate(),
            Err(DefinitionError::NoSlots { .. })
        ));

        let mut slot = SlotDefinition::default();
        slot.annotations.push(SlotAnnotation::Entrance(EntranceAnnotation {
            is_entry: false,
            is_exit: false,
            ..EntranceAnnotation::default()
        }));
        assert!(matches!(
            SmartObjectDefinition::new("NoWay", vec![slot]).validate(),
            Err(DefinitionError::EntranceWithoutDirection { slot: 0, annotation: 0 })
        ));

        let nan = SlotDefinition::at(Vec3::new(f64::NAN, 0.0, 0.0));
        assert!(SmartObjectDefinition::new("Nan", vec![nan]).validate().is_err());
        assert!(bench().validate().is_ok());
    }

    #[test]
    fn bounds_are_computed_from_slots() {
        let bounds = bench().local_bounds();
        assert_eq!(bounds.min, Vec3::new(-100.0, -50.0, -50.0));
        assert_eq!(bounds.max, Vec3::new(100.0, 50.0, 50.0));
    }

    #[test]
    fn slot_world_transform_applies_object_rotation() {
        let object = Transform::new(Vec3::new(0.0, 0.0, 0.0), Rotator::from_yaw(90.0));
        let slot = bench().slot_world_transform(1, &object).unwrap();
        assert!(slot.location.approx_eq(Vec3::new(0.0, 50.0, 0.0), 1e-9));
    }

    #[test]
    fn user_capsule_starts_above_step_height() {
        let capsule = UserCapsuleParams::default().collider_at(Vec3::ZERO);
        assert_eq!(capsule.radius, 35.0);
        assert!((capsule.center.z - capsule.half_height - 45.0).abs() < 1e-9);
    }

    #[test]
    fn definitions_load_from_json() {
        let json = r#"{
            "name": "Chair",
            "slots": [{
                "offset": {"x": 0.0, "y": 0.0, "z": 0.0},
                "annotations": [{"type": "Entrance", "offset": {"x": 60.0, "y": 0.0, "z": 0.0}}]
            }],
            "default_behavior_definitions": [{"class": "Sit"}]
        }"#;
        let definition: SmartObjectDefinition = serde_json::from_str(json).unwrap();
        assert!(definition.validate().is_ok());
        assert_eq!(definition.slots[0].entrances().count(), 1);
        assert!(definition.slots[0].enabled);
    }
}
