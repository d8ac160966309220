// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use phase_core::{
    BlockSource, EntitySource, PhaseError, PhaseKind, PhaseTracker, SourceKind, WorldSource,
};
use phase_dry_tests::{block_source, pos, state, world_source, TestHost, W0};

#[test]
fn typed_source_queries_on_the_current_activation() {
    let mut host = TestHost::new();
    let mut tracker = PhaseTracker::default();
    let world = tracker.switch_to(PhaseKind::WorldTick, world_source()).unwrap();
    let block = tracker
        .switch_to(PhaseKind::BlockTick, block_source(pos(1, 2, 3), state(8)))
        .unwrap();

    let source = tracker.current_source_as::<BlockSource>().unwrap();
    assert_eq!(source.pos, pos(1, 2, 3));
    assert_eq!(source.world, W0);

    let err = tracker.current_source_as::<EntitySource>().unwrap_err();
    assert!(err.is_fatal());
    match &err {
        PhaseError::SourceMismatch {
            kind,
            expected,
            actual,
            dump,
        } => {
            assert_eq!(*kind, PhaseKind::BlockTick);
            assert_eq!(*expected, SourceKind::Entity);
            assert_eq!(*actual, Some(SourceKind::Block));
            assert_eq!(dump.activations().len(), 2, "full stack dump");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("expected entity"), "{message}");

    tracker.complete_phase(block, &mut host).unwrap();
    assert!(tracker.current_source_as::<WorldSource>().is_ok());
    tracker.complete_phase(world, &mut host).unwrap();
    assert!(matches!(
        tracker.current_source_as::<WorldSource>(),
        Err(PhaseError::NoActivePhase)
    ));
}
