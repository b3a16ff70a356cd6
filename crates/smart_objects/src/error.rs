//! Error types for configuration and validation seams.
//!
//! Operations on the live registry report failure through return values
//! (`false`, `None`, `INVALID` handles) and logging; these enums are used
//! where a caller needs to know *why* something was refused.

use crate::types::ObjectHandle;

/// Errors raised by the subsystem itself.
#[derive(Debug, thiserror::Error)]
pub enum SmartObjectError {
    /// The handle is unset or does not resolve to a live object
    #[error("Invalid smart object handle: {0}")]
    InvalidHandle(ObjectHandle),
    /// A runtime object already exists for the handle
    #[error("Smart object {0} already exists in the simulation")]
    DuplicateHandle(ObjectHandle),
    /// The runtime has not been initialized yet
    #[error("Smart object runtime is not initialized")]
    RuntimeNotInitialized,
    /// Every bit of the enabled-reason mask is already assigned
    #[error("No enabled-reason bit left for '{reason}'")]
    ReasonTableExhausted { reason: String },
    /// The definition failed validation
    #[error("Invalid definition: {0}")]
    Definition(#[from] DefinitionError),
    /// Configuration values out of range
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Problems found while validating a [`SmartObjectDefinition`](crate::SmartObjectDefinition).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Definition '{name}' has no slots")]
    NoSlots { name: String },
    #[error("Slot index {index} out of range (definition has {count} slots)")]
    InvalidSlotIndex { index: usize, count: usize },
    #[error("Slot {slot} has a non-finite offset or rotation")]
    NonFiniteSlotOffset { slot: usize },
    #[error("Definition bounds are not finite")]
    NonFiniteBounds,
    #[error("Entrance annotation {annotation} on slot {slot} is neither an entry nor an exit")]
    EntranceWithoutDirection { slot: usize, annotation: usize },
    #[error("Slot {slot} declares more than one user collision annotation")]
    DuplicateUserCollision { slot: usize },
}
