//! External smart object components.
//!
//! A component is the placed representation of a smart object owned by some
//! external entity. The subsystem only needs its identity, definition,
//! transform and tags; everything else about it is out of scope.

use crate::definition::SmartObjectDefinition;
use crate::math::Transform;
use crate::tags::TagContainer;
use crate::types::{ComponentId, ObjectHandle, OwnerData};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Description of a smart object component handed to the subsystem.
#[derive(Debug, Clone)]
pub struct SmartObjectComponent {
    pub id: ComponentId,
    /// Identity of the owning entity
    pub owner: Uuid,
    pub definition: Option<Arc<SmartObjectDefinition>>,
    pub transform: Transform,
    /// Instance tags applied when the runtime object is created
    pub tags: TagContainer,
}

impl SmartObjectComponent {
    pub fn new(owner: Uuid, definition: Arc<SmartObjectDefinition>, transform: Transform) -> Self {
        Self {
            id: ComponentId::new(),
            owner,
            definition: Some(definition),
            transform,
            tags: TagContainer::new(),
        }
    }

    /// Deterministic handle derived from the component and owner identity.
    pub fn handle(&self) -> ObjectHandle {
        ObjectHandle::for_component(self.id, self.owner)
    }

    pub fn owner_data(&self) -> OwnerData {
        OwnerData::Actor(self.owner)
    }
}

/// How a registered component relates to its runtime object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationType {
    /// Runtime object created for the component; destroyed on unregister
    Dynamic,
    /// Component bound to an object that already existed (from a collection)
    BindToExistingInstance,
}

/// Subsystem-side record of a registered component.
#[derive(Debug, Clone)]
pub struct ComponentRegistration {
    pub component: SmartObjectComponent,
    pub handle: ObjectHandle,
    pub registration_type: RegistrationType,
    pub bound: bool,
}
