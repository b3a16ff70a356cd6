/// Object creation and destruction, component registration and collections
use super::core::{Notification, Notifications, SmartObjectSubsystem};
use super::stats::StatsCounters;
use crate::collection::{CollectionId, CollectionRegistrationResult, PersistentCollection, SmartObjectContainer};
use crate::component::{ComponentRegistration, RegistrationType, SmartObjectComponent};
use crate::definition::SmartObjectDefinition;
use crate::error::SmartObjectError;
use crate::events::{ChangeReason, ReleaseInfo, SmartObjectEvent};
use crate::math::Transform;
use crate::runtime::RuntimeObject;
use crate::spatial::create_partition;
use crate::tags::TagContainer;
use crate::types::{ClaimHandle, ComponentId, ObjectHandle, OwnerData, SlotHandle, SlotState};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

impl SmartObjectSubsystem {
    // ========================================================================
    // Runtime instances
    // ========================================================================

    /// Inserts a new runtime object into the registry and the spatial index.
    pub(super) fn create_runtime_instance(
        &self,
        handle: ObjectHandle,
        definition: &Arc<SmartObjectDefinition>,
        transform: Transform,
        owner: OwnerData,
        tags: TagContainer,
        component: Option<ComponentId>,
    ) -> Result<(), SmartObjectError> {
        if !handle.is_valid() {
            return Err(SmartObjectError::InvalidHandle(handle));
        }

        {
            let mut objects = self.objects.write();
            if objects.contains_key(&handle) {
                return Err(SmartObjectError::DuplicateHandle(handle));
            }

            let mut object = RuntimeObject::new(handle, definition.clone(), transform, owner);
            object.tags = tags;
            if let Some(component) = component {
                object.bind_component(component);
            }
            object.initialize_preconditions(self.resolver.as_ref());
            object.spatial_entry = Some(self.spatial.lock().add(handle, object.bounds()));
            objects.insert(handle, Arc::new(Mutex::new(object)));
        }

        debug!(
            "Created smart object '{}' using definition '{}'{}",
            handle,
            definition.name,
            component.map(|c| format!(" for component {}", c)).unwrap_or_default()
        );
        StatsCounters::bump(&self.stats.objects_created);

        let mut notifications = Notifications::new();
        notifications.push(Notification::Event(SmartObjectEvent::object(
            handle,
            ChangeReason::OnObjectEnabled,
        )));
        if component.is_some() {
            notifications.push(Notification::Event(SmartObjectEvent::object(
                handle,
                ChangeReason::OnComponentBound,
            )));
        }
        self.flush(notifications);
        Ok(())
    }

    pub(super) fn take_object(&self, handle: ObjectHandle) -> Option<Arc<Mutex<RuntimeObject>>> {
        self.objects.write().remove(&handle)
    }

    /// Tears down an object already removed from the registry.
    ///
    /// Unbinds its component, aborts every claim, fires the final disabled
    /// event, leaves the spatial index and deactivates conditions.
    ///
    /// # Returns
    ///
    /// The component that was bound to the object, if any.
    pub(super) fn destroy_removed(&self, object: Arc<Mutex<RuntimeObject>>) -> Option<ComponentId> {
        let mut notifications = Notifications::new();
        let (handle, component) = {
            let mut object = object.lock();
            let handle = object.handle();

            let component = object.unbind_component();
            if component.is_some() {
                notifications.push(Notification::Event(SmartObjectEvent::object(
                    handle,
                    ChangeReason::OnComponentUnbound,
                )));
            }

            self.abort_all(&mut object, &mut notifications);
            notifications.push(Notification::Event(SmartObjectEvent::object(
                handle,
                ChangeReason::OnObjectDisabled,
            )));

            if let Some(token) = object.spatial_entry.take() {
                self.spatial.lock().remove(handle, token);
            }
            object.deactivate_preconditions();
            (handle, component)
        };

        debug!("Removed smart object '{}' from the simulation", handle);
        StatsCounters::bump(&self.stats.objects_destroyed);
        self.flush(notifications);
        self.events.clear_object(handle);

        if let Some(component) = component {
            self.mark_component_unbound(component);
        }
        component
    }

    /// Force-releases every claimed or occupied slot and resets all slots to free.
    fn abort_all(&self, object: &mut RuntimeObject, notifications: &mut Notifications) {
        let handle = object.handle();
        for (index, slot) in object.slots.iter_mut().enumerate() {
            let slot_handle = SlotHandle::new(handle, index);
            match slot.state() {
                SlotState::Claimed | SlotState::Occupied => {
                    let claim = ClaimHandle::new(slot_handle, slot.user());
                    if let Some(released) = slot.release(&claim) {
                        if let Some(callback) = released.invalidation {
                            notifications.push(Notification::SlotInvalidated {
                                callback,
                                claim,
                                state: released.previous_state,
                            });
                        }
                        notifications.push(Notification::Event(
                            SmartObjectEvent::slot(slot_handle, ChangeReason::OnReleased)
                                .with_payload(released.user_data)
                                .with_release(ReleaseInfo { aborted: true, overridden: false }),
                        ));
                        StatsCounters::bump(&self.stats.aborted_releases);
                        debug!("Slot {} released by an abort", slot_handle);
                    }
                }
                SlotState::Free => {
                    if slot.user().is_valid() {
                        warn!(
                            "Smart object '{}' used by {} while slot {} is neither claimed nor occupied",
                            handle,
                            slot.user(),
                            index
                        );
                    }
                }
            }
            slot.reset();
        }
    }

    fn mark_component_unbound(&self, component: ComponentId) {
        if let Some(registration) = self.components.write().get_mut(&component) {
            registration.bound = false;
        }
    }

    /// Creates a dynamic smart object, not backed by any collection.
    ///
    /// # Returns
    ///
    /// The new object's handle, or [`ObjectHandle::INVALID`] when the runtime
    /// is not initialized or the definition does not validate.
    pub fn create_smart_object(
        &self,
        definition: Arc<SmartObjectDefinition>,
        transform: Transform,
        owner: OwnerData,
    ) -> ObjectHandle {
        if !self.is_runtime_initialized() {
            warn!("create_smart_object: {}", SmartObjectError::RuntimeNotInitialized);
            return ObjectHandle::INVALID;
        }
        if let Err(err) = definition.validate() {
            warn!("Refusing to create smart object from definition '{}': {}", definition.name, err);
            return ObjectHandle::INVALID;
        }

        let handle = ObjectHandle::dynamic();
        match self.create_runtime_instance(handle, &definition, transform, owner, TagContainer::new(), None) {
            Ok(()) => handle,
            Err(err) => {
                error!("Failed to create smart object: {}", err);
                ObjectHandle::INVALID
            }
        }
    }

    /// Removes an object from the simulation.
    ///
    /// Objects bound to a registered component are removed through
    /// [`Self::remove_smart_object`] so the registration goes away too.
    pub fn destroy_smart_object(&self, handle: ObjectHandle) -> bool {
        if !handle.is_valid() {
            debug!("destroy_smart_object called with an unset handle");
            return false;
        }
        let Some(object) = self.object_arc(handle) else {
            debug!("destroy_smart_object failed using handle '{}': not part of the simulation", handle);
            return false;
        };

        let component = object.lock().owner_component();
        if let Some(component) = component {
            if self.components.read().contains_key(&component) {
                return self.remove_smart_object(component);
            }
        }

        match self.take_object(handle) {
            Some(object) => {
                self.destroy_removed(object);
                true
            }
            None => false,
        }
    }

    /// Moves an object and refreshes its spatial index entry.
    pub fn update_smart_object_transform(&self, handle: ObjectHandle, transform: Transform) -> bool {
        self.with_object(handle, "update_smart_object_transform", |object, _| {
            let mut spatial = self.spatial.lock();
            if let Some(token) = object.spatial_entry.take() {
                spatial.remove(handle, token);
            }
            object.set_transform(transform);
            object.spatial_entry = Some(spatial.add(handle, object.bounds()));
        })
        .is_some()
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Registers an external component.
    ///
    /// Before [`Self::initialize_runtime`] the component is only queued. After
    /// it, the component is bound to the runtime object already created for
    /// its handle (from a collection) or a new dynamic object is created.
    ///
    /// # Returns
    ///
    /// False when the component has no valid definition or is already
    /// registered.
    pub fn register_smart_object(&self, component: SmartObjectComponent) -> bool {
        let Some(definition) = component.definition.clone() else {
            info!("Attempting to register component {} without a definition. Bailing out.", component.id);
            return false;
        };
        if let Err(err) = definition.validate() {
            warn!(
                "Attempting to register component {} while its definition '{}' fails validation: {}",
                component.id, definition.name, err
            );
            return false;
        }

        let already_registered = self.components.read().contains_key(&component.id)
            || self.pending_components.lock().iter().any(|pending| pending.id == component.id);
        if already_registered {
            info!("Failed to register component {}. Already registered", component.id);
            return false;
        }

        if !self.is_runtime_initialized() {
            trace!(
                "Component {} not registered since the runtime is not initialized yet; queued",
                component.id
            );
            self.pending_components.lock().push(component);
            return true;
        }

        self.register_with_runtime(component, definition)
    }

    fn register_with_runtime(&self, component: SmartObjectComponent, definition: Arc<SmartObjectDefinition>) -> bool {
        let added = self.main_container.write().add_smart_object(&component);
        let Some((entry, already_present)) = added else {
            return false;
        };

        let handle = entry.handle;
        let (registration_type, bound) = if already_present {
            let bound = self.object_arc(handle).is_some() && self.bind_component(handle, &component);
            (RegistrationType::BindToExistingInstance, bound)
        } else {
            let created = self.create_runtime_instance(
                handle,
                &definition,
                entry.transform,
                component.owner_data(),
                entry.tags.clone(),
                Some(component.id),
            );
            if let Err(err) = &created {
                warn!("Unable to create runtime instance for component {}: {}", component.id, err);
            }
            (RegistrationType::Dynamic, created.is_ok())
        };

        debug!(
            "Registered component {} with handle '{}' ({:?}, bound: {})",
            component.id, handle, registration_type, bound
        );
        self.components.write().insert(
            component.id,
            ComponentRegistration {
                component,
                handle,
                registration_type,
                bound,
            },
        );
        true
    }

    fn bind_component(&self, handle: ObjectHandle, component: &SmartObjectComponent) -> bool {
        self.with_object(handle, "bind_component", |object, notifications| {
            if let Some(current) = object.owner_component() {
                if current != component.id {
                    warn!(
                        "Different owner component (was {}) when binding {} to '{}'. Multiple objects might be using the same handle.",
                        current, component.id, handle
                    );
                }
            }
            object.bind_component(component.id);
            if !object.owner().is_set() {
                object.set_owner(component.owner_data());
            }
            notifications.push(Notification::Event(SmartObjectEvent::object(
                handle,
                ChangeReason::OnComponentBound,
            )));
        })
        .is_some()
    }

    fn unbind_component(&self, handle: ObjectHandle) -> bool {
        self.with_object(handle, "unbind_component", |object, notifications| {
            if object.unbind_component().is_some() {
                notifications.push(Notification::Event(SmartObjectEvent::object(
                    handle,
                    ChangeReason::OnComponentUnbound,
                )));
            }
        })
        .is_some()
    }

    /// Unregisters a component.
    ///
    /// Dynamic registrations destroy their runtime object. Components bound
    /// to a collection entry are only unbound; the object stays in the
    /// simulation until its collection goes away.
    pub fn unregister_smart_object(&self, component: ComponentId) -> bool {
        let registration_type = self.components.read().get(&component).map(|r| r.registration_type);
        match registration_type {
            Some(registration_type) => {
                self.unregister_internal(component, registration_type == RegistrationType::Dynamic)
            }
            None => self.remove_pending(component, "unregister"),
        }
    }

    /// Unregisters a component and always destroys its runtime object.
    pub fn remove_smart_object(&self, component: ComponentId) -> bool {
        if self.components.read().contains_key(&component) {
            self.unregister_internal(component, true)
        } else {
            self.remove_pending(component, "remove")
        }
    }

    fn remove_pending(&self, component: ComponentId, operation: &str) -> bool {
        let mut pending = self.pending_components.lock();
        match pending.iter().position(|p| p.id == component) {
            Some(index) => {
                pending.swap_remove(index);
                true
            }
            None => {
                info!(
                    "Failed to {} component {} since it doesn't seem registered or has already been unregistered",
                    operation, component
                );
                false
            }
        }
    }

    fn unregister_internal(&self, component: ComponentId, destroy: bool) -> bool {
        let Some(registration) = self.components.write().remove(&component) else {
            return false;
        };

        trace!(
            "Unregistering component {} with handle '{}' (destroy: {})",
            component, registration.handle, destroy
        );

        if registration.bound {
            if destroy {
                if let Some(object) = self.take_object(registration.handle) {
                    self.destroy_removed(object);
                }
                self.main_container.write().remove_smart_object(component);
            } else {
                self.unbind_component(registration.handle);
            }
        }
        true
    }

    /// Registration record of a component, pending ones excluded.
    pub fn component_registration(&self, component: ComponentId) -> Option<ComponentRegistration> {
        self.components.read().get(&component).cloned()
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Merges a collection into the main container and, once the runtime is
    /// initialized, creates its runtime objects.
    pub fn register_collection(&self, collection: PersistentCollection) -> CollectionRegistrationResult {
        if !collection.is_valid() {
            warn!("Refusing to register invalid collection '{}'", collection.name);
            return CollectionRegistrationResult::FailedInvalidCollection;
        }
        if self.collections.read().contains_key(&collection.id) {
            error!("Trying to register collection '{}' more than once", collection.name);
            return CollectionRegistrationResult::FailedAlreadyRegistered;
        }

        info!(
            "Adding collection '{}' registered with {} entries",
            collection.name,
            collection.container.len()
        );
        for (index, result) in collection.container.validate_definitions().into_iter().enumerate() {
            if let Err(err) = result {
                warn!("Collection '{}' definition {} is invalid: {}", collection.name, index, err);
            }
        }

        self.main_container.write().append(&collection.container);
        let container = self
            .is_runtime_initialized()
            .then(|| collection.container.clone());
        self.collections.write().insert(collection.id, collection);

        if let Some(container) = container {
            self.add_container_to_simulation(&container);
        }
        CollectionRegistrationResult::Succeeded
    }

    /// Removes a collection and destroys its entries still in the simulation.
    pub fn unregister_collection(&self, id: CollectionId) -> bool {
        let Some(collection) = self.collections.write().remove(&id) else {
            debug!("Ignoring unregistration of collection {:?}: not registered", id);
            return false;
        };

        self.main_container.write().remove(&collection.container);
        for entry in collection.container.entries() {
            // The entry may already be gone if it was destroyed explicitly.
            if let Some(object) = self.take_object(entry.handle) {
                self.destroy_removed(object);
            }
        }
        info!("Unregistered collection '{}'", collection.name);
        true
    }

    /// Creates runtime objects for every entry of `container`.
    ///
    /// Entries whose component is already registered are created with the
    /// component's definition and bound to it. If that definition differs
    /// from the one cached in the collection, the component wins and
    /// [`Self::collection_needs_rebuild`] starts reporting true.
    pub fn add_container_to_simulation(&self, container: &SmartObjectContainer) {
        if !self.is_runtime_initialized() {
            warn!("add_container_to_simulation called before the runtime was initialized");
            return;
        }

        for entry in container.entries() {
            let Some(definition) = container.definition_for_entry(entry) else {
                error!("Skipped runtime data creation for '{}': missing definition", entry.handle);
                continue;
            };
            if let Err(err) = definition.validate() {
                error!("Skipped runtime data creation for '{}': {}", entry.handle, err);
                continue;
            }

            let component = entry
                .component
                .and_then(|id| self.components.read().get(&id).map(|r| r.component.clone()));

            let created = match component.as_ref().and_then(|c| c.definition.clone().map(|d| (c, d))) {
                Some((component, component_definition)) => {
                    if !Arc::ptr_eq(&component_definition, definition) {
                        warn!(
                            "Definition '{}' specified in component {} differs from '{}' specified in the collection entry. Collection should be rebuilt.",
                            component_definition.name, component.id, definition.name
                        );
                        self.collection_needs_rebuild.store(true, Ordering::Release);
                    }
                    let result = self.create_runtime_instance(
                        entry.handle,
                        &component_definition,
                        entry.transform,
                        component.owner_data(),
                        entry.tags.clone(),
                        Some(component.id),
                    );
                    if result.is_ok() {
                        if let Some(registration) = self.components.write().get_mut(&component.id) {
                            registration.handle = entry.handle;
                            registration.registration_type = RegistrationType::BindToExistingInstance;
                            registration.bound = true;
                        }
                    }
                    result
                }
                None => self.create_runtime_instance(
                    entry.handle,
                    definition,
                    entry.transform,
                    OwnerData::None,
                    entry.tags.clone(),
                    None,
                ),
            };

            if let Err(err) = created {
                warn!("Unable to add collection entry '{}' to the simulation: {}", entry.handle, err);
            }
        }
    }

    /// Whether a component definition disagreed with its collection entry.
    pub fn collection_needs_rebuild(&self) -> bool {
        self.collection_needs_rebuild.load(Ordering::Acquire)
    }

    /// Snapshot of the main container.
    pub fn main_container(&self) -> SmartObjectContainer {
        self.main_container.read().clone()
    }

    // ========================================================================
    // Runtime initialization
    // ========================================================================

    /// Builds the spatial index, creates the runtime objects of every
    /// registered collection and processes queued component registrations.
    pub fn initialize_runtime(&self) {
        if self.config.disable_runtime {
            info!("Runtime explicitly disabled by configuration. Initialization skipped.");
            return;
        }
        if self.is_runtime_initialized() {
            debug!("initialize_runtime called while the runtime is already initialized");
            return;
        }

        let bounds = self.main_container.read().bounds();
        {
            let mut spatial = self.spatial.lock();
            if spatial.is_empty() {
                *spatial = create_partition(&self.config.spatial, bounds);
            } else {
                spatial.set_bounds(bounds);
            }
        }

        self.runtime_initialized.store(true, Ordering::Release);

        let container = self.main_container.read().clone();
        self.add_container_to_simulation(&container);

        let pending = std::mem::take(&mut *self.pending_components.lock());
        if !pending.is_empty() {
            debug!("Handling {} pending registrations during runtime initialization", pending.len());
        }
        for component in pending {
            self.register_smart_object(component);
        }

        info!(
            "Smart object runtime initialized with {} objects ({:?} partition)",
            self.object_count(),
            self.config.spatial.kind
        );
    }

    /// Destroys every runtime object and returns to the uninitialized state.
    ///
    /// Registered components are queued again so a later
    /// [`Self::initialize_runtime`] binds them anew. Collections are dropped.
    pub fn cleanup_runtime(&self) {
        // Component-bound objects first so their components are notified
        // before anything else goes away.
        let bound: Vec<ObjectHandle> = self
            .components
            .read()
            .values()
            .filter(|registration| registration.bound)
            .map(|registration| registration.handle)
            .collect();
        for handle in bound {
            if let Some(object) = self.take_object(handle) {
                self.destroy_removed(object);
            }
        }

        let remaining: Vec<_> = self.objects.write().drain().map(|(_, object)| object).collect();
        for object in remaining {
            self.destroy_removed(object);
        }

        self.runtime_initialized.store(false, Ordering::Release);
        self.collections.write().clear();
        self.main_container.write().clear();

        let registrations: Vec<SmartObjectComponent> = self
            .components
            .write()
            .drain()
            .map(|(_, registration)| registration.component)
            .collect();
        self.pending_components.lock().extend(registrations);

        info!("Smart object runtime cleaned up");
    }
}
