//! Worker threads mutating objects while sharing one subsystem

use super::support::{bench_definition, initialized, slot};
use crate::math::{Transform, Vec3};
use crate::tags::Tag;
use crate::types::{ClaimPriority, OwnerData, SlotState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

const CONTENDERS: usize = 8;
const ITERATIONS: usize = 500;

#[test]
fn contended_slot_has_one_claimant_at_a_time() {
    let subsystem = Arc::new(initialized());
    let handle = subsystem.create_smart_object(bench_definition(), Transform::IDENTITY, OwnerData::None);
    let seat = slot(handle, 0);
    let busy = Tag::new("State.Busy");

    let held = AtomicBool::new(false);
    let wins = AtomicU64::new(0);

    thread::scope(|scope| {
        for _ in 0..CONTENDERS {
            scope.spawn(|| {
                for _ in 0..ITERATIONS {
                    let claim = subsystem.claim(seat, ClaimPriority::Normal, None);
                    if claim.is_valid() {
                        assert!(!held.swap(true, Ordering::SeqCst), "two claims held the same slot");
                        assert!(subsystem.mark_slot_as_occupied(claim, Some("Sit")).is_some());
                        wins.fetch_add(1, Ordering::Relaxed);
                        held.store(false, Ordering::SeqCst);
                        assert!(subsystem.release(claim));
                    }

                    subsystem.add_tag_to_instance(handle, busy.clone());
                    subsystem.remove_tag_from_instance(handle, &busy);
                }
            });
        }
    });

    let wins = wins.load(Ordering::Relaxed);
    assert!(wins > 0);
    assert_eq!(subsystem.get_slot_state(seat), Some(SlotState::Free));

    let stats = subsystem.stats();
    assert_eq!(stats.claims_granted, wins);
    assert_eq!(stats.occupations, wins);
    assert_eq!(stats.releases, wins);
    assert_eq!(stats.claims_overridden, 0);
    assert!(!subsystem.instance_tags(handle).unwrap_or_default().has_tag(&busy));
}

#[test]
fn different_objects_are_mutated_in_parallel() {
    let subsystem = Arc::new(initialized());
    let objects: Vec<_> = (0..2)
        .map(|i| {
            subsystem.create_smart_object(
                bench_definition(),
                Transform::from_location(Vec3::new(i as f64 * 500.0, 0.0, 0.0)),
                OwnerData::None,
            )
        })
        .collect();
    let cutscene = Tag::new("Reason.Cutscene");

    thread::scope(|scope| {
        for (i, &handle) in objects.iter().enumerate() {
            let subsystem = &subsystem;
            let cutscene = &cutscene;
            scope.spawn(move || {
                for step in 0..ITERATIONS {
                    let location = Vec3::new(i as f64 * 500.0, step as f64, 0.0);
                    assert!(subsystem.update_smart_object_transform(handle, Transform::from_location(location)));

                    subsystem.set_enabled_for_reason(handle, cutscene, false);
                    assert!(!subsystem.is_enabled(handle));
                    assert!(!subsystem.can_be_claimed(slot(handle, 1), ClaimPriority::High));
                    subsystem.set_enabled_for_reason(handle, cutscene, true);

                    let claim = subsystem.claim(slot(handle, 1), ClaimPriority::Normal, None);
                    assert!(claim.is_valid());
                    assert!(subsystem.release(claim));
                }
            });
        }
    });

    let last = (ITERATIONS - 1) as f64;
    for (i, &handle) in objects.iter().enumerate() {
        assert!(subsystem.is_enabled(handle));
        assert_eq!(subsystem.get_slot_state(slot(handle, 1)), Some(SlotState::Free));
        let transform = subsystem.get_object_transform(handle).expect("object still alive");
        assert!(transform.location.approx_eq(Vec3::new(i as f64 * 500.0, last, 0.0), 1e-9));
    }
    assert_eq!(subsystem.stats().claims_granted, 2 * ITERATIONS as u64);
}
