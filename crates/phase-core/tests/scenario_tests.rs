// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use phase_core::{
    ActorRef, BlockEventSource, Cause, CaptureResult, ChangeKind, ContextKey, PhaseKind,
    PhaseTracker,
};
use phase_dry_tests::{pos, state, tile_entity_source, TestHost, W0};

#[test]
fn block_event_inside_tile_entity_tick_commits_with_both_causes() {
    let t_pos = pos(10, 64, 10);
    let e_pos = pos(10, 65, 10);
    let p = pos(11, 64, 10);
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();

    let tile = tracker
        .switch_to(PhaseKind::TileEntityTick, tile_entity_source(t_pos, "piston"))
        .unwrap();
    let event = tracker
        .switch_to(
            PhaseKind::BlockEventTick,
            BlockEventSource {
                world: W0,
                pos: e_pos,
                state: state(29),
                event_id: 0,
                param: 2,
            },
        )
        .unwrap();
    let captured = tracker
        .set_block(&mut host, W0, p, state(29), ChangeKind::Place)
        .unwrap();
    assert_eq!(captured, CaptureResult::Captured);
    assert!(host.state_at(W0, p).is_air());

    let report = tracker.complete_phase(event, &mut host).unwrap();
    assert_eq!(report.committed(), 1);
    assert_eq!(host.state_at(W0, p), state(29));
    let owner = ActorRef::TileEntity(W0, t_pos);
    assert_eq!(host.owner_at(W0, p), Some(owner));

    let cause = &host.fired()[0].cause;
    assert!(cause.contains(&Cause::Actor(owner)));
    assert!(cause.causes().iter().any(|c| matches!(
        c,
        Cause::BlockEvent { pos, .. } if *pos == e_pos
    )));
    assert!(cause.context(ContextKey::BlockEventProcess).is_some());
    assert_eq!(cause.first_actor(), Some(owner));

    let outer = tracker.current().unwrap();
    assert_eq!(outer.kind(), PhaseKind::TileEntityTick);
    assert!(outer.captures().is_empty(), "nothing leaked into the outer context");
    let outer_report = tracker.complete_phase(tile, &mut host).unwrap();
    assert!(outer_report.dispositions().is_empty());
    assert_eq!(host.fired().len(), 1);
    assert!(tracker.is_empty());
}
