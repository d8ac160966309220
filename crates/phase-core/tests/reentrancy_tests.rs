// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use phase_core::{
    BlockEventSource, BlockChange, ChangeKind, NeighborNotification, PhaseError, PhaseKind,
    PhaseTracker,
};
use phase_dry_tests::{block_source, entity_source, pos, state, world_source, TestHost, W0};

fn block_event() -> BlockEventSource {
    BlockEventSource {
        world: W0,
        pos: pos(0, 0, 0),
        state: state(33),
        event_id: 0,
        param: 1,
    }
}

#[test]
fn non_reentrant_kind_is_rejected_with_a_dump() {
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();
    let outer = tracker
        .switch_to(PhaseKind::EntityTick, entity_source(1, None))
        .unwrap();

    let err = tracker
        .switch_to(PhaseKind::EntityTick, entity_source(2, None))
        .unwrap_err();
    assert!(err.is_fatal());
    match err {
        PhaseError::Reentrancy { kind, dump } => {
            assert_eq!(kind, PhaseKind::EntityTick);
            assert_eq!(dump.activations().len(), 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(tracker.len(), 1);
    tracker.complete_phase(outer, &mut host).unwrap();
}

#[test]
fn neighbor_notifications_nest_and_deepen() {
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();
    let mut handles = Vec::new();
    for depth in 1..=4 {
        let handle = tracker
            .switch_to(
                PhaseKind::NeighborNotification,
                block_source(pos(depth, 0, 0), state(1)),
            )
            .unwrap();
        assert_eq!(handle.depth(), u32::try_from(depth).unwrap());
        handles.push(handle);
    }
    while let Some(handle) = handles.pop() {
        tracker.complete_phase(handle, &mut host).unwrap();
    }
    assert!(tracker.is_empty());
}

#[test]
fn block_events_follow_the_enclosing_policy() {
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();

    let weather = tracker
        .switch_to(PhaseKind::WeatherTick, world_source())
        .unwrap();
    let err = tracker
        .switch_to(PhaseKind::BlockEventTick, block_event())
        .unwrap_err();
    assert!(!err.is_fatal());
    assert!(matches!(
        err,
        PhaseError::BlockEventsDisallowed {
            enclosing: PhaseKind::WeatherTick
        }
    ));
    tracker.complete_phase(weather, &mut host).unwrap();

    let world = tracker.switch_to(PhaseKind::WorldTick, world_source()).unwrap();
    let event = tracker
        .switch_to(PhaseKind::BlockEventTick, block_event())
        .unwrap();
    tracker.complete_phase(event, &mut host).unwrap();
    tracker.complete_phase(world, &mut host).unwrap();
}

#[test]
fn unwinding_activations_still_count_as_active() {
    let reentered = std::rc::Rc::new(std::cell::Cell::new(false));
    let seen = reentered.clone();
    let mut host = TestHost::new().with_reaction(move |tracker: &mut PhaseTracker, _n: &NeighborNotification| {
        let result = tracker.switch_to(PhaseKind::EntityTick, entity_source(9, None));
        seen.set(matches!(result, Err(PhaseError::Reentrancy { .. })));
        result.map(|_handle| ())
    });
    let mut tracker = PhaseTracker::default();

    let handle = tracker
        .switch_to(PhaseKind::EntityTick, entity_source(1, None))
        .unwrap();
    let ctx = tracker.current_mut().unwrap();
    let _ = ctx
        .capture_block_change(BlockChange::new(W0, pos(0, 0, 0), state(0), state(1), ChangeKind::Place))
        .unwrap();
    let _ = ctx
        .queue_neighbor_notification(NeighborNotification {
            world: W0,
            notify_pos: pos(1, 0, 0),
            source_block: state(1),
            source_pos: pos(0, 0, 0),
        })
        .unwrap();

    let err = tracker.complete_phase(handle, &mut host).unwrap_err();
    assert!(matches!(err, PhaseError::Reentrancy { .. }));
    assert!(reentered.get());
    assert!(tracker.is_empty(), "failed unwind still releases everything");
    assert_eq!(tracker.stats().contexts_acquired, tracker.stats().contexts_released);
}
