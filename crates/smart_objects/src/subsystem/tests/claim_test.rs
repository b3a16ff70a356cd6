//! Claim, occupy and release flows

use super::support::{slot, with_bench_at, EventLog};
use crate::events::{ChangeReason, ReleaseInfo, UserPayload};
use crate::math::Vec3;
use crate::types::{ClaimHandle, ClaimPriority, SlotHandle, SlotState};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn claim_occupy_release_cycle() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);

    let claim = subsystem.claim(seat, ClaimPriority::Normal, None);
    assert!(claim.is_valid());
    assert_eq!(subsystem.get_slot_state(seat), Some(SlotState::Claimed));

    let behavior = subsystem
        .mark_slot_as_occupied(claim, Some("Sit"))
        .expect("slot offers Sit");
    assert_eq!(behavior.class, "Sit");
    assert_eq!(subsystem.get_slot_state(seat), Some(SlotState::Occupied));

    assert!(subsystem.release(claim));
    assert_eq!(subsystem.get_slot_state(seat), Some(SlotState::Free));

    // A second release of the same claim is refused.
    assert!(!subsystem.release(claim));

    let stats = subsystem.stats();
    assert_eq!(stats.claims_granted, 1);
    assert_eq!(stats.occupations, 1);
    assert_eq!(stats.releases, 1);
}

#[test]
fn higher_priority_claim_overrides_lower_one() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);
    let log = EventLog::attach(&subsystem);

    let invalidated = Arc::new(Mutex::new(Vec::new()));
    let low: UserPayload = Arc::new("low");
    let first = subsystem.claim(seat, ClaimPriority::Low, Some(low));
    assert!(first.is_valid());
    let sink = invalidated.clone();
    assert!(subsystem.register_slot_invalidation_callback(
        first,
        Arc::new(move |claim: ClaimHandle, state: SlotState| sink.lock().push((claim, state))),
    ));
    log.clear();

    let second = subsystem.claim(seat, ClaimPriority::High, None);
    assert!(second.is_valid());
    assert_ne!(first.user, second.user);

    assert_eq!(log.reasons(), vec![ChangeReason::OnReleased, ChangeReason::OnClaimed]);
    let released = &log.events()[0];
    assert_eq!(released.release, Some(ReleaseInfo { aborted: true, overridden: true }));
    assert_eq!(released.payload_as::<&'static str>(), Some(&"low"));

    assert_eq!(invalidated.lock().as_slice(), &[(first, SlotState::Claimed)]);

    // The overridden claimant can no longer occupy or release.
    assert!(subsystem.mark_slot_as_occupied(first, None).is_none());
    assert!(!subsystem.release(first));
    assert_eq!(subsystem.stats().claims_overridden, 1);
}

#[test]
fn equal_priority_cannot_override() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);

    let first = subsystem.claim(seat, ClaimPriority::Normal, None);
    assert!(first.is_valid());
    assert!(!subsystem.can_be_claimed(seat, ClaimPriority::Normal));
    assert_eq!(subsystem.claim(seat, ClaimPriority::Normal, None), ClaimHandle::INVALID);
    assert_eq!(subsystem.stats().claims_rejected, 1);
}

#[test]
fn occupied_slot_cannot_be_overridden() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);

    let claim = subsystem.claim(seat, ClaimPriority::Low, None);
    assert!(subsystem.mark_slot_as_occupied(claim, None).is_some());
    assert!(!subsystem.can_be_claimed(seat, ClaimPriority::High));
    assert!(!subsystem.claim(seat, ClaimPriority::High, None).is_valid());
}

#[test]
fn occupy_requires_matching_behavior_and_claimant() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 1);

    let claim = subsystem.claim(seat, ClaimPriority::Normal, None);
    // Slot 1 only has the object default behavior.
    assert!(subsystem.mark_slot_as_occupied(claim, Some("Sit")).is_none());
    assert_eq!(subsystem.get_slot_state(seat), Some(SlotState::Claimed));

    let behavior = subsystem.behavior_definition(claim, None).expect("default behavior");
    assert_eq!(behavior.class, "Lean");

    assert!(subsystem.mark_slot_as_occupied(claim, Some("Lean")).is_some());
    // Already occupied: a second call is a state violation.
    assert!(subsystem.mark_slot_as_occupied(claim, Some("Lean")).is_none());
}

#[test]
fn occupy_fails_on_disabled_object() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let claim = subsystem.claim(slot(handle, 0), ClaimPriority::Normal, None);
    assert!(subsystem.set_enabled(handle, false));
    assert!(subsystem.mark_slot_as_occupied(claim, None).is_none());
}

#[test]
fn invalid_handles_fail_quietly() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);

    assert!(!subsystem.claim(SlotHandle::INVALID, ClaimPriority::Normal, None).is_valid());
    assert!(!subsystem.claim(slot(handle, 7), ClaimPriority::Normal, None).is_valid());
    assert!(!subsystem.release(ClaimHandle::INVALID));
    assert!(subsystem.mark_slot_as_occupied(ClaimHandle::INVALID, None).is_none());
    assert_eq!(subsystem.get_slot_state(slot(handle, 7)), None);
}

#[test]
fn normal_release_drops_invalidation_callback_without_calling_it() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);
    let calls = Arc::new(Mutex::new(0));

    let claim = subsystem.claim(seat, ClaimPriority::Normal, None);
    let counter = calls.clone();
    assert!(subsystem.register_slot_invalidation_callback(claim, Arc::new(move |_, _| *counter.lock() += 1)));
    assert!(subsystem.release(claim));
    assert_eq!(*calls.lock(), 0);

    // A new claimant must register its own callback.
    let next = subsystem.claim(seat, ClaimPriority::Normal, None);
    assert!(subsystem.destroy_smart_object(handle));
    assert_eq!(*calls.lock(), 0);
    assert!(!subsystem.unregister_slot_invalidation_callback(next));
}

#[test]
fn callbacks_and_data_require_the_current_claimant() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);

    let stale = subsystem.claim(seat, ClaimPriority::Low, None);
    let current = subsystem.claim(seat, ClaimPriority::High, None);

    assert!(!subsystem.register_slot_invalidation_callback(stale, Arc::new(|_, _| {})));
    assert!(!subsystem.add_slot_data(stale, 5u32));
    assert!(subsystem.add_slot_data(current, 5u32));
    assert!(subsystem.unregister_slot_invalidation_callback(current));
}

#[derive(Debug, PartialEq)]
struct Progress(u32);

#[test]
fn slot_data_lives_until_release() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);

    let claim = subsystem.claim(seat, ClaimPriority::Normal, None);
    assert!(subsystem.add_slot_data(claim, Progress(1)));
    assert!(subsystem.add_slot_data(claim, "label"));
    // Same type replaces.
    assert!(subsystem.add_slot_data(claim, Progress(2)));

    assert!(subsystem.mutate_slot_data(seat, |mut view| {
        if let Some(progress) = view.state_data_mut::<Progress>() {
            progress.0 += 1;
        }
    }));

    let mut seen = None;
    assert!(subsystem.read_slot_data(seat, |view| {
        assert_eq!(view.state(), SlotState::Claimed);
        assert_eq!(view.user(), claim.user);
        seen = view.state_data::<Progress>().map(|p| p.0);
    }));
    assert_eq!(seen, Some(3));

    assert!(subsystem.release(claim));
    let mut after = Some(0);
    assert!(subsystem.read_slot_data(seat, |view| after = view.state_data::<Progress>().map(|p| p.0)));
    assert_eq!(after, None);
}

#[test]
fn claim_events_carry_the_claimant_payload() {
    let (subsystem, handle) = with_bench_at(Vec3::ZERO);
    let seat = slot(handle, 0);
    let log = EventLog::attach(&subsystem);

    let payload: UserPayload = Arc::new(42u32);
    let claim = subsystem.claim(seat, ClaimPriority::Normal, Some(payload));
    subsystem.mark_slot_as_occupied(claim, None);
    subsystem.release(claim);

    let events = log.events();
    assert_eq!(
        log.reasons(),
        vec![ChangeReason::OnClaimed, ChangeReason::OnOccupied, ChangeReason::OnReleased]
    );
    assert!(events.iter().all(|event| event.payload_as::<u32>() == Some(&42)));
    assert!(events.iter().all(|event| event.slot == seat));
    assert_eq!(events[2].release, Some(ReleaseInfo::default()));
}
