// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use phase_core::{
    CaptureResult, ChangeKind, Decision, EntityId, FluidSource, ItemStack, NotifyOutcome,
    PhaseKind, PhaseTracker, SpawnCause, SpawnRequest, Spawnable,
};
use phase_dry_tests::{block_source, pos, state, world_source, TestHost, W0};

fn fluid(liquid: bool) -> FluidSource {
    FluidSource {
        world: W0,
        pos: pos(0, 60, 0),
        state: state(8),
        liquid,
    }
}

#[test]
fn liquid_fluid_ticks_apply_blocks_immediately() {
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();

    let handle = tracker.switch_to(PhaseKind::FluidTick, fluid(true)).unwrap();
    let result = tracker
        .set_block(&mut host, W0, pos(0, 59, 0), state(8), ChangeKind::Grow)
        .unwrap();
    assert_eq!(result, CaptureResult::Bypassed);
    assert_eq!(host.state_at(W0, pos(0, 59, 0)), state(8));
    let report = tracker.complete_phase(handle, &mut host).unwrap();
    assert!(report.dispositions().is_empty());
    assert!(host.fired().is_empty());

    let handle = tracker.switch_to(PhaseKind::FluidTick, fluid(false)).unwrap();
    let result = tracker
        .set_block(&mut host, W0, pos(0, 58, 0), state(8), ChangeKind::Grow)
        .unwrap();
    assert_eq!(result, CaptureResult::Captured);
    tracker.complete_phase(handle, &mut host).unwrap();
    assert_eq!(host.fired().len(), 1);
}

#[test]
fn no_capture_kinds_bypass_everything() {
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();
    let handle = tracker
        .switch_to(PhaseKind::DimensionTick, world_source())
        .unwrap();
    let result = tracker
        .set_block(&mut host, W0, pos(0, 0, 0), state(1), ChangeKind::Place)
        .unwrap();
    assert_eq!(result, CaptureResult::Bypassed);
    let outcome = tracker
        .notify_neighbor(
            &mut host,
            phase_core::NeighborNotification {
                world: W0,
                notify_pos: pos(0, 1, 0),
                source_block: state(1),
                source_pos: pos(0, 0, 0),
            },
        )
        .unwrap();
    assert_eq!(outcome, NotifyOutcome::Delivered);
    assert_eq!(host.delivered()[0].depth, 2);
    tracker.complete_phase(handle, &mut host).unwrap();
}

#[test]
fn without_an_active_phase_changes_apply_directly() {
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();
    let result = tracker
        .set_block(&mut host, W0, pos(5, 5, 5), state(2), ChangeKind::Place)
        .unwrap();
    assert_eq!(result, CaptureResult::Bypassed);
    tracker
        .notify_neighbors(&mut host, W0, pos(5, 5, 5), state(2))
        .unwrap();
    assert_eq!(host.delivered().len(), 6);
    assert!(host.delivered().iter().all(|d| d.depth == 1));
    assert!(tracker.is_empty());
}

#[test]
fn spawns_and_drops_are_decided_at_unwind() {
    let mut host = TestHost::new().with_spawn_decider(|_, requests| {
        requests
            .iter()
            .map(|r| if r.subject.is_item() { Decision::Cancel } else { Decision::Commit })
            .collect()
    });
    let mut tracker = PhaseTracker::default();

    let handle = tracker
        .switch_to(PhaseKind::BlockTick, block_source(pos(0, 0, 0), state(1)))
        .unwrap();
    let ctx = tracker.current_mut().unwrap();
    let spawned = ctx
        .capture_entity_spawn(SpawnRequest {
            subject: Spawnable::Entity {
                id: EntityId(40),
                kind: "zombie".to_owned(),
                world: W0,
                pos: pos(0, 1, 0),
            },
            cause: SpawnCause::Natural,
        })
        .unwrap();
    assert_eq!(spawned, CaptureResult::Captured);
    let dropped = ctx
        .capture_item_drop(
            W0,
            pos(0, 0, 0),
            ItemStack {
                kind: "cobblestone".to_owned(),
                count: 1,
            },
            SpawnCause::BlockBreak,
        )
        .unwrap();
    assert_eq!(dropped, CaptureResult::Captured);
    assert!(host.spawned().is_empty());

    let report = tracker.complete_phase(handle, &mut host).unwrap();
    assert_eq!(report.spawns_committed(), 1);
    assert_eq!(report.spawns_cancelled(), 1);
    assert_eq!(host.spawned().len(), 1);
    assert!(!host.spawned()[0].subject.is_item());
}

#[test]
fn weather_ticks_do_not_batch_drops() {
    let mut tracker = PhaseTracker::default();
    let mut host = TestHost::new();
    let handle = tracker.switch_to(PhaseKind::WeatherTick, world_source()).unwrap();
    let result = tracker
        .current_mut()
        .unwrap()
        .capture_item_drop(
            W0,
            pos(0, 0, 0),
            ItemStack {
                kind: "snowball".to_owned(),
                count: 1,
            },
            SpawnCause::Natural,
        )
        .unwrap();
    assert_eq!(result, CaptureResult::Bypassed);
    tracker.complete_phase(handle, &mut host).unwrap();
}
