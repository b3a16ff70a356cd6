//! # Core Type Definitions
//!
//! Identifiers and small value types shared by every part of the runtime.
//!
//! ## Key Types
//!
//! - [`ObjectHandle`] - Stable identifier of one smart object
//! - [`SlotHandle`] - Object handle plus slot index
//! - [`UserHandle`] - Token identifying the current claimant of a slot
//! - [`ClaimHandle`] - Proof of a successful claim, presented back to occupy/release
//! - [`ClaimPriority`] - Ordered priority used for claim overrides
//! - [`SlotState`] - Free / Claimed / Occupied
//! - [`OwnerData`] - Opaque payload naming the external owner of an object
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types keep object, slot and user identifiers apart
//! - **Invalid Sentinels**: Every handle has an `INVALID` value that never matches a live entity
//! - **Serialization**: Identifiers serialize so placements can be persisted in collections

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace used to derive deterministic handles for persistent objects.
const HANDLE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_3c2a_9b4e_4d71_a5c8_2e07_b1f9_5d34);

// ============================================================================
// Object and component identity
// ============================================================================

/// Unique, stable identifier for a smart object.
///
/// Persistent (collection-backed) objects derive their handle from the
/// identity of the placed component and its owner, so the same placement
/// always yields the same handle across loads. Dynamically spawned objects
/// get a random handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(pub Uuid);

impl ObjectHandle {
    /// Sentinel that never refers to a live object.
    pub const INVALID: ObjectHandle = ObjectHandle(Uuid::nil());

    /// Derives the deterministic handle for a placed component.
    ///
    /// # Arguments
    ///
    /// * `component` - Identity of the placed component
    /// * `owner` - Identity of the entity owning that component
    pub fn for_component(component: ComponentId, owner: Uuid) -> Self {
        let mut name = [0u8; 32];
        name[..16].copy_from_slice(component.0.as_bytes());
        name[16..].copy_from_slice(owner.as_bytes());
        Self(Uuid::new_v5(&HANDLE_NAMESPACE, &name))
    }

    /// Creates a new random handle for a dynamically spawned object.
    pub fn dynamic() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for ObjectHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0.hyphenated())
        } else {
            f.write_str("Invalid")
        }
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({})", self)
    }
}

/// Identity of an external smart object component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub Uuid);

impl ComponentId {
    /// Creates a new random component id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque payload identifying what external entity owns an object.
///
/// The runtime stores and returns it and hands it to an
/// [`OwnerResolver`](crate::conditions::OwnerResolver) to decide whether the
/// owner is currently loaded; it never interprets the contents itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OwnerData {
    #[default]
    None,
    /// A fully spawned actor.
    Actor(Uuid),
    /// A lightweight instanced proxy, addressed by manager and instance index.
    Instance { manager: Uuid, index: u32 },
}

impl OwnerData {
    pub fn is_set(&self) -> bool {
        !matches!(self, OwnerData::None)
    }
}

// ============================================================================
// Slot and claim handles
// ============================================================================

/// Object handle plus slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SlotHandle {
    pub object: ObjectHandle,
    pub index: usize,
}

impl SlotHandle {
    pub const INVALID: SlotHandle = SlotHandle { object: ObjectHandle::INVALID, index: 0 };

    pub fn new(object: ObjectHandle, index: usize) -> Self {
        Self { object, index }
    }

    /// Only checks that the parent handle is set; liveness is checked by the subsystem.
    pub fn is_valid(&self) -> bool {
        self.object.is_valid()
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object, self.index)
    }
}

/// Token identifying a claimant. Issued from a monotonically increasing counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct UserHandle(pub u64);

impl UserHandle {
    pub const INVALID: UserHandle = UserHandle(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User#{}", self.0)
    }
}

/// Returned by a successful claim and presented back to occupy or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClaimHandle {
    pub object: ObjectHandle,
    pub slot: SlotHandle,
    pub user: UserHandle,
}

impl ClaimHandle {
    pub const INVALID: ClaimHandle = ClaimHandle {
        object: ObjectHandle::INVALID,
        slot: SlotHandle::INVALID,
        user: UserHandle::INVALID,
    };

    pub(crate) fn new(slot: SlotHandle, user: UserHandle) -> Self {
        Self { object: slot.object, slot, user }
    }

    pub fn is_valid(&self) -> bool {
        self.object.is_valid() && self.slot.is_valid() && self.user.is_valid()
    }
}

impl fmt::Display for ClaimHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.slot, self.user)
    }
}

/// A slot found by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RequestResult {
    pub object: ObjectHandle,
    pub slot: SlotHandle,
}

impl RequestResult {
    pub fn new(slot: SlotHandle) -> Self {
        Self { object: slot.object, slot }
    }

    pub fn is_valid(&self) -> bool {
        self.object.is_valid() && self.slot.is_valid()
    }
}

impl fmt::Display for RequestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slot)
    }
}

/// What part of a slot an entrance query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntranceKind {
    #[default]
    Invalid,
    /// Index of an entrance annotation in the slot definition.
    Entrance(usize),
    /// The slot location itself.
    Slot,
}

/// Identifies a specific entrance of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SlotEntranceHandle {
    pub slot: SlotHandle,
    pub kind: EntranceKind,
}

impl SlotEntranceHandle {
    pub fn new(slot: SlotHandle, kind: EntranceKind) -> Self {
        Self { slot, kind }
    }

    pub fn is_valid(&self) -> bool {
        self.slot.is_valid() && self.kind != EntranceKind::Invalid
    }
}

// ============================================================================
// Slot state and claim priority
// ============================================================================

/// Reservation state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SlotState {
    #[default]
    Free,
    Claimed,
    Occupied,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotState::Free => "Free",
            SlotState::Claimed => "Claimed",
            SlotState::Occupied => "Occupied",
        };
        f.write_str(name)
    }
}

/// Claim priority. A claimed slot can be taken over only by a strictly higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ClaimPriority {
    Low,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    High,
}

impl ClaimPriority {
    pub const ALL: [ClaimPriority; 5] = [
        ClaimPriority::Low,
        ClaimPriority::BelowNormal,
        ClaimPriority::Normal,
        ClaimPriority::AboveNormal,
        ClaimPriority::High,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_handles_are_deterministic() {
        let component = ComponentId::new();
        let owner = Uuid::new_v4();
        let a = ObjectHandle::for_component(component, owner);
        let b = ObjectHandle::for_component(component, owner);
        assert_eq!(a, b);
        assert!(a.is_valid());
        assert_ne!(a, ObjectHandle::for_component(component, Uuid::new_v4()));
    }

    #[test]
    fn dynamic_handles_are_unique() {
        assert_ne!(ObjectHandle::dynamic(), ObjectHandle::dynamic());
        assert!(!ObjectHandle::INVALID.is_valid());
        assert_eq!(ObjectHandle::INVALID.to_string(), "Invalid");
    }

    #[test]
    fn claim_handle_requires_all_parts() {
        let slot = SlotHandle::new(ObjectHandle::dynamic(), 1);
        assert!(ClaimHandle::new(slot, UserHandle(3)).is_valid());
        assert!(!ClaimHandle::new(slot, UserHandle::INVALID).is_valid());
        assert!(!ClaimHandle::INVALID.is_valid());
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(ClaimPriority::Low < ClaimPriority::BelowNormal);
        assert!(ClaimPriority::Normal < ClaimPriority::High);
        assert_eq!(ClaimPriority::default(), ClaimPriority::Normal);
    }
}
