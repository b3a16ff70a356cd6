/// Core SmartObjectSubsystem implementation
use super::stats::StatsCounters;
use crate::collection::{CollectionId, PersistentCollection, SmartObjectContainer};
use crate::component::{ComponentRegistration, SmartObjectComponent};
use crate::conditions::{AlwaysResolvable, OwnerResolver};
use crate::config::SubsystemConfig;
use crate::events::{EventBus, EventHandler, SmartObjectEvent, SubscriptionId};
use crate::math::Box3;
use crate::runtime::{RuntimeObject, SlotInvalidationCallback};
use crate::spatial::{create_partition, SpatialPartition};
use crate::tags::ReasonMaskTable;
use crate::types::{ClaimHandle, ComponentId, ObjectHandle, SlotHandle, SlotState, UserHandle};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Side effect produced while an object is locked, delivered once it is released.
pub(super) enum Notification {
    Event(SmartObjectEvent),
    SlotInvalidated {
        callback: SlotInvalidationCallback,
        claim: ClaimHandle,
        state: SlotState,
    },
}

pub(super) type Notifications = Vec<Notification>;

/// The registry of live smart objects and everything that operates on it.
///
/// One instance is created per simulated world and passed explicitly to
/// whatever needs it; there is no global instance.
///
/// # Locking
///
/// The set of live objects sits behind a `RwLock`. Structural changes
/// (create, destroy) take it for writing; every per-object operation takes
/// it for reading just long enough to clone the object's `Arc` and then
/// locks that object's own `Mutex`. Two threads can therefore mutate two
/// different objects at the same time.
///
/// Locks are always taken in the order registry, object, spatial index.
/// Spatial queries release the index before touching the registry.
///
/// Events produced by a call are queued while the object is locked and
/// dispatched, in order, after every lock has been released.
pub struct SmartObjectSubsystem {
    pub(super) config: SubsystemConfig,
    pub(super) objects: RwLock<HashMap<ObjectHandle, Arc<Mutex<RuntimeObject>>>>,
    pub(super) events: EventBus,
    pub(super) reasons: ReasonMaskTable,
    pub(super) next_user_id: AtomicU64,
    pub(super) spatial: Mutex<Box<dyn SpatialPartition>>,
    pub(super) resolver: Arc<dyn OwnerResolver>,
    pub(super) runtime_initialized: AtomicBool,
    /// Union of every registered collection plus dynamically registered components
    pub(super) main_container: RwLock<SmartObjectContainer>,
    pub(super) collections: RwLock<HashMap<CollectionId, PersistentCollection>>,
    pub(super) components: RwLock<HashMap<ComponentId, ComponentRegistration>>,
    /// Components registered before the runtime was initialized
    pub(super) pending_components: Mutex<Vec<SmartObjectComponent>>,
    pub(super) collection_needs_rebuild: AtomicBool,
    pub(super) stats: StatsCounters,
}

impl std::fmt::Debug for SmartObjectSubsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartObjectSubsystem")
            .field("objects", &self.objects.read().len())
            .field("runtime_initialized", &self.is_runtime_initialized())
            .field("collections", &self.collections.read().len())
            .field("components", &self.components.read().len())
            .field("spatial", &"[partition]")
            .finish()
    }
}

impl SmartObjectSubsystem {
    /// Creates a subsystem that treats every owner as resolvable.
    pub fn new(config: SubsystemConfig) -> Self {
        Self::with_resolver(config, Arc::new(AlwaysResolvable))
    }

    /// Creates a subsystem that asks `resolver` whether an object's owner is
    /// loaded before activating its conditions.
    pub fn with_resolver(config: SubsystemConfig, resolver: Arc<dyn OwnerResolver>) -> Self {
        let spatial = create_partition(&config.spatial, Box3::empty());
        Self {
            config,
            objects: RwLock::new(HashMap::new()),
            events: EventBus::new(),
            reasons: ReasonMaskTable::new(),
            next_user_id: AtomicU64::new(1),
            spatial: Mutex::new(spatial),
            resolver,
            runtime_initialized: AtomicBool::new(false),
            main_container: RwLock::new(SmartObjectContainer::new()),
            collections: RwLock::new(HashMap::new()),
            components: RwLock::new(HashMap::new()),
            pending_components: Mutex::new(Vec::new()),
            collection_needs_rebuild: AtomicBool::new(false),
            stats: StatsCounters::default(),
        }
    }

    pub fn config(&self) -> &SubsystemConfig {
        &self.config
    }

    /// Observer lists for every object.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[inline]
    pub fn is_runtime_initialized(&self) -> bool {
        self.runtime_initialized.load(Ordering::Acquire)
    }

    /// Number of live runtime objects.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Handles of every live runtime object, in no particular order.
    pub fn object_handles(&self) -> Vec<ObjectHandle> {
        self.objects.read().keys().copied().collect()
    }

    /// Registers `handler` for the events of one object.
    pub fn subscribe(&self, handle: ObjectHandle, handler: EventHandler) -> SubscriptionId {
        self.events.subscribe(handle, handler)
    }

    /// Registers `handler` for the events of every object.
    pub fn subscribe_all(&self, handler: EventHandler) -> SubscriptionId {
        self.events.subscribe_all(handler)
    }

    pub fn unsubscribe(&self, handle: ObjectHandle, id: SubscriptionId) -> bool {
        self.events.unsubscribe(handle, id)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    pub(super) fn next_user(&self) -> UserHandle {
        UserHandle(self.next_user_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(super) fn object_arc(&self, handle: ObjectHandle) -> Option<Arc<Mutex<RuntimeObject>>> {
        self.objects.read().get(&handle).cloned()
    }

    /// Runs `f` on the locked object, then delivers what it queued.
    ///
    /// Returns `None` (and logs at debug level) when the handle is unset or
    /// does not resolve.
    pub(super) fn with_object<R>(
        &self,
        handle: ObjectHandle,
        operation: &str,
        f: impl FnOnce(&mut RuntimeObject, &mut Notifications) -> R,
    ) -> Option<R> {
        if !handle.is_valid() {
            debug!("{} called with an unset smart object handle", operation);
            return None;
        }
        let Some(object) = self.object_arc(handle) else {
            debug!(
                "{} failed using handle '{}': smart object is not part of the simulation",
                operation, handle
            );
            return None;
        };

        let mut notifications = Notifications::new();
        let result = {
            let mut guard = object.lock();
            f(&mut guard, &mut notifications)
        };
        self.flush(notifications);
        Some(result)
    }

    /// Like [`Self::with_object`] but also checks the slot index.
    pub(super) fn with_slot<R>(
        &self,
        slot: SlotHandle,
        operation: &str,
        f: impl FnOnce(&mut RuntimeObject, usize, &mut Notifications) -> R,
    ) -> Option<R> {
        self.with_object(slot.object, operation, |object, notifications| {
            if slot.index >= object.slot_count() {
                debug!(
                    "{} failed using handle '{}': slot index out of range ({} slots)",
                    operation,
                    slot,
                    object.slot_count()
                );
                return None;
            }
            Some(f(object, slot.index, notifications))
        })
        .flatten()
    }

    /// Delivers queued notifications in production order.
    pub(super) fn flush(&self, notifications: Notifications) {
        for notification in notifications {
            match notification {
                Notification::Event(event) => self.events.dispatch(std::iter::once(event)),
                Notification::SlotInvalidated { callback, claim, state } => callback(claim, state),
            }
        }
    }
}
