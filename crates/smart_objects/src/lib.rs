//! # Smart Objects
//!
//! Runtime registry of interactive world objects ("smart objects") and the
//! slots agents reserve on them. A bench with two seats, a vending machine or
//! a door is one smart object; each seat or use point is a slot that an agent
//! claims, occupies and finally releases.
//!
//! ## Core Features
//!
//! - **Slot Reservation**: Claim / occupy / release state machine with priority overrides
//! - **Spatial Search**: Range queries over a hash grid or R-tree partition
//! - **Selection Conditions**: Object and slot preconditions with fail-closed evaluation
//! - **Enabled Reasons**: Independent disable reasons combined into one state
//! - **Collections**: Baked object lists registered and removed as a unit
//! - **Batched Search**: Request / poll protocol for many agents sharing one query budget
//! - **Entrance Locations**: Validated approach points against host navigation data
//! - **Change Events**: Per-object and global subscribers, delivered after locks are released
//!
//! ## Architecture Overview
//!
//! [`SmartObjectSubsystem`] owns every runtime object behind a registry lock
//! and a per-object mutex. Spatial queries go through a [`SpatialPartition`]
//! built at [`SmartObjectSubsystem::initialize_runtime`]. Notifications are
//! collected while locks are held and dispatched through the [`EventBus`]
//! afterwards, so handlers may call back into the subsystem.
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use smart_objects::*;
//! use std::sync::Arc;
//!
//! let subsystem = SmartObjectSubsystem::new(SubsystemConfig::default());
//! subsystem.initialize_runtime();
//!
//! let definition = Arc::new(SmartObjectDefinition::new(
//!     "Bench",
//!     vec![SlotDefinition::at(Vec3::new(-50.0, 0.0, 0.0)), SlotDefinition::at(Vec3::new(50.0, 0.0, 0.0))],
//! ));
//! let bench = subsystem.create_smart_object(definition, Transform::IDENTITY, OwnerData::None);
//!
//! let request = SmartObjectRequest::new(
//!     Box3::from_center_extent(Vec3::ZERO, Vec3::splat(500.0)),
//!     RequestFilter::default(),
//! );
//! if let Some(found) = subsystem.find_smart_objects(&request, None).first() {
//!     let claim = subsystem.claim(found.slot, ClaimPriority::Normal, None);
//!     subsystem.mark_slot_as_occupied(claim, None);
//!     subsystem.release(claim);
//! }
//! # let _ = bench;
//! ```

pub mod collection;
pub mod component;
pub mod conditions;
pub mod config;
pub mod definition;
pub mod entrance;
pub mod error;
pub mod events;
pub mod math;
pub mod runtime;
pub mod search;
pub mod spatial;
pub mod subsystem;
pub mod tags;
pub mod types;

pub use collection::{
    CollectionEntry, CollectionId, CollectionRegistrationResult, PersistentCollection, SmartObjectContainer,
};
pub use component::{ComponentRegistration, RegistrationType, SmartObjectComponent};
pub use conditions::{
    AlwaysResolvable, ConditionContext, ConditionExpr, OwnerResolver, PreconditionSet, PreconditionState,
    WorldCondition,
};
pub use config::{
    EntranceConfig, SearchConfig, SpatialConfig, SpatialPartitionKind, SubsystemConfig, MAX_CANDIDATE_SLOTS,
};
pub use definition::{
    BehaviorDefinition, EntranceAnnotation, SlotAnnotation, SlotDefinition, SlotUserCollision,
    SmartObjectDefinition, UserCapsuleParams, UserTagsFilteringPolicy,
};
pub use entrance::{
    query_all_validated_entrance_locations, EntranceLocationRequest, EntranceLocationResult,
    EntranceLocationType, EntranceSelectMethod, NavigationValidator,
};
pub use error::{DefinitionError, SmartObjectError};
pub use events::{
    ChangeReason, EventBus, EventHandler, ReleaseInfo, SmartObjectEvent, SubscriptionId, UserPayload,
};
pub use math::{Box3, Capsule, Rotator, Transform, Vec3};
pub use runtime::{RuntimeObject, RuntimeSlot, SlotInvalidationCallback, SlotView, SlotViewMut};
pub use search::{
    CandidateSearchQueue, CandidateSelectMethod, CandidateSlot, CandidateSlots, SearchRequestId, SearchStatus,
    SlotCandidateRequest,
};
pub use spatial::{SpatialEntryToken, SpatialIndexStats, SpatialPartition};
pub use subsystem::{RequestFilter, SlotPredicate, SmartObjectRequest, SmartObjectSubsystem, SubsystemStats};
pub use tags::{Tag, TagContainer, TagQuery, GAMEPLAY_REASON};
pub use types::*;

/// Returns build info string with the crate version
pub fn build_info() -> String {
    format!("Smart Objects runtime v{}", env!("CARGO_PKG_VERSION"))
}
