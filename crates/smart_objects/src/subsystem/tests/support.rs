//! Shared fixtures for subsystem scenarios

use crate::config::SubsystemConfig;
use crate::definition::{BehaviorDefinition, SlotDefinition, SmartObjectDefinition};
use crate::events::{ChangeReason, SmartObjectEvent};
use crate::math::{Transform, Vec3};
use crate::subsystem::SmartObjectSubsystem;
use crate::types::{ObjectHandle, OwnerData, SlotHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Two-slot bench offering a "Sit" behavior.
pub fn bench_definition() -> Arc<SmartObjectDefinition> {
    let mut left = SlotDefinition::at(Vec3::new(-50.0, 0.0, 0.0));
    left.behavior_definitions.push(BehaviorDefinition::new("Sit"));
    let right = SlotDefinition::at(Vec3::new(50.0, 0.0, 0.0));

    let mut definition = SmartObjectDefinition::new("Bench", vec![left, right]);
    definition
        .default_behavior_definitions
        .push(BehaviorDefinition::new("Lean"));
    Arc::new(definition)
}

/// Initialized subsystem with nothing in it.
pub fn initialized() -> SmartObjectSubsystem {
    let subsystem = SmartObjectSubsystem::new(SubsystemConfig::default());
    subsystem.initialize_runtime();
    subsystem
}

/// Initialized subsystem holding one bench at `location`.
pub fn with_bench_at(location: Vec3) -> (SmartObjectSubsystem, ObjectHandle) {
    let subsystem = initialized();
    let handle = subsystem.create_smart_object(
        bench_definition(),
        Transform::from_location(location),
        OwnerData::Actor(Uuid::new_v4()),
    );
    assert!(handle.is_valid());
    (subsystem, handle)
}

pub fn slot(handle: ObjectHandle, index: usize) -> SlotHandle {
    SlotHandle::new(handle, index)
}

/// Records every event raised by the subsystem.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SmartObjectEvent>>>,
}

impl EventLog {
    pub fn attach(subsystem: &SmartObjectSubsystem) -> Self {
        let log = Self::default();
        let events = log.events.clone();
        subsystem.subscribe_all(Arc::new(move |event: &SmartObjectEvent| {
            events.lock().push(event.clone());
        }));
        log
    }

    pub fn reasons(&self) -> Vec<ChangeReason> {
        self.events.lock().iter().map(|event| event.reason).collect()
    }

    pub fn events(&self) -> Vec<SmartObjectEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
