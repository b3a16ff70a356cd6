//! # Smart Object Events
//!
//! Change notifications for objects and slots, and the observer list used
//! to deliver them.
//!
//! Subscribers are not stored inside runtime objects. The [`EventBus`] keeps
//! one observer list per [`ObjectHandle`] and looks it up when an event is
//! dispatched. Handlers registered with [`EventBus::subscribe_all`] receive
//! events for every object.
//!
//! ## Delivery Order
//!
//! The subsystem collects the events produced by one call while the object
//! is locked, releases the lock and then dispatches them in production
//! order before the call returns. Handlers may therefore call back into the
//! subsystem, subscribe or unsubscribe.

use crate::tags::Tag;
use crate::types::{ObjectHandle, SlotHandle};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Opaque user payload attached to claims and slot events.
pub type UserPayload = Arc<dyn Any + Send + Sync>;

/// Callback invoked for every event on a subscribed object.
pub type EventHandler = Arc<dyn Fn(&SmartObjectEvent) + Send + Sync>;

// ============================================================================
// Event record
// ============================================================================

/// Why an event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeReason {
    /// Custom event sent to a slot
    OnEvent,
    OnTagAdded,
    OnTagRemoved,
    OnClaimed,
    OnOccupied,
    OnReleased,
    OnSlotEnabled,
    OnSlotDisabled,
    OnObjectEnabled,
    OnObjectDisabled,
    OnComponentBound,
    OnComponentUnbound,
}

/// Extra information carried by [`ChangeReason::OnReleased`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// The claim ended without the user finishing, e.g. on destruction.
    pub aborted: bool,
    /// The claim was taken over by a higher priority claimant.
    pub overridden: bool,
}

/// A change on an object or one of its slots.
#[derive(Clone)]
pub struct SmartObjectEvent {
    pub object: ObjectHandle,
    /// [`SlotHandle::INVALID`] for object-level events.
    pub slot: SlotHandle,
    pub reason: ChangeReason,
    /// Tag that changed, or the event tag for [`ChangeReason::OnEvent`].
    pub tag: Option<Tag>,
    /// Claimant payload for claim events, sender payload for custom events.
    pub payload: Option<UserPayload>,
    /// Present on release events.
    pub release: Option<ReleaseInfo>,
}

impl SmartObjectEvent {
    pub(crate) fn object(object: ObjectHandle, reason: ChangeReason) -> Self {
        Self {
            object,
            slot: SlotHandle::INVALID,
            reason,
            tag: None,
            payload: None,
            release: None,
        }
    }

    pub(crate) fn slot(slot: SlotHandle, reason: ChangeReason) -> Self {
        Self {
            object: slot.object,
            slot,
            reason,
            tag: None,
            payload: None,
            release: None,
        }
    }

    pub(crate) fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub(crate) fn with_payload(mut self, payload: Option<UserPayload>) -> Self {
        self.payload = payload;
        self
    }

    pub(crate) fn with_release(mut self, info: ReleaseInfo) -> Self {
        self.release = Some(info);
        self
    }

    pub fn is_slot_event(&self) -> bool {
        self.slot.is_valid()
    }

    /// Downcasts the payload.
    pub fn payload_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }
}

impl fmt::Debug for SmartObjectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartObjectEvent")
            .field("object", &self.object)
            .field("slot", &self.slot)
            .field("reason", &self.reason)
            .field("tag", &self.tag)
            .field("has_payload", &self.payload.is_some())
            .field("release", &self.release)
            .finish()
    }
}

// ============================================================================
// Observer list
// ============================================================================

/// Identifies one subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Counters for monitoring event traffic.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Number of live subscriptions
    pub subscriptions: usize,
    /// Events dispatched since creation
    pub events_dispatched: u64,
    /// Handler invocations since creation
    pub handler_invocations: u64,
}

/// Observer lists keyed by object handle.
pub struct EventBus {
    observers: DashMap<ObjectHandle, Vec<(SubscriptionId, EventHandler)>>,
    next_id: AtomicU64,
    events_dispatched: AtomicU64,
    handler_invocations: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("objects", &self.observers.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
            events_dispatched: AtomicU64::new(0),
            handler_invocations: AtomicU64::new(0),
        }
    }

    /// Registers `handler` for events of `object`.
    pub fn subscribe(&self, object: ObjectHandle, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.entry(object).or_default().push((id, handler));
        trace!("Subscribed {:?} to {}", id, object);
        id
    }

    /// Registers `handler` for events of every object.
    pub fn subscribe_all(&self, handler: EventHandler) -> SubscriptionId {
        self.subscribe(ObjectHandle::INVALID, handler)
    }

    /// Removes a subscription. Returns false if it was not found.
    pub fn unsubscribe(&self, object: ObjectHandle, id: SubscriptionId) -> bool {
        let mut removed = false;
        if let Some(mut list) = self.observers.get_mut(&object) {
            let before = list.len();
            list.retain(|(sub, _)| *sub != id);
            removed = list.len() != before;
        }
        self.observers.remove_if(&object, |_, list| list.is_empty());
        removed
    }

    /// Drops every per-object subscription of `object`.
    pub fn clear_object(&self, object: ObjectHandle) {
        if object.is_valid() {
            self.observers.remove(&object);
        }
    }

    pub fn has_subscribers(&self, object: ObjectHandle) -> bool {
        self.observers.contains_key(&object)
    }

    /// Delivers events in order to per-object handlers, then global handlers.
    pub fn dispatch<I>(&self, events: I)
    where
        I: IntoIterator<Item = SmartObjectEvent>,
    {
        for event in events {
            self.events_dispatched.fetch_add(1, Ordering::Relaxed);

            let object_handlers = self
                .observers
                .get(&event.object)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();
            let global_handlers = self
                .observers
                .get(&ObjectHandle::INVALID)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();

            for (_, handler) in object_handlers.iter().chain(global_handlers.iter()) {
                self.handler_invocations.fetch_add(1, Ordering::Relaxed);
                handler(&event);
            }
        }
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            subscriptions: self.observers.iter().map(|entry| entry.value().len()).sum(),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            handler_invocations: self.handler_invocations.load(Ordering::Relaxed),
        }
    }
}
