// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use phase_core::{
    CancelReason, CaptureResult, ChangeKind, Decision, Disposition, PhaseKind, PhaseTracker,
};
use phase_dry_tests::{block_source, init_test_tracing, pos, state, TestHost, W0};

fn capture_three(tracker: &mut PhaseTracker, host: &mut TestHost) {
    for x in 0..3 {
        let captured = tracker
            .set_block(host, W0, pos(x, 0, 0), state(4), ChangeKind::Place)
            .unwrap();
        assert_eq!(captured, CaptureResult::Captured);
    }
}

#[test]
fn missing_decisions_discard_the_undecided_mutations() {
    init_test_tracing();
    let mut host = TestHost::new().short_decisions(1);
    let mut tracker = PhaseTracker::default();

    let handle = tracker
        .switch_to(PhaseKind::BlockTick, block_source(pos(0, 0, 0), state(4)))
        .unwrap();
    capture_three(&mut tracker, &mut host);
    let report = tracker.complete_phase(handle, &mut host).unwrap();

    assert_eq!(
        report.dispositions(),
        &[
            Disposition::Committed,
            Disposition::Cancelled(CancelReason::Mismatch),
            Disposition::Cancelled(CancelReason::Mismatch),
        ]
    );
    assert_eq!(report.mismatched(), 2);
    assert_eq!(tracker.stats().mismatches, 2);
    assert_eq!(host.state_at(W0, pos(0, 0, 0)), state(4));
    assert!(host.state_at(W0, pos(1, 0, 0)).is_air());
    assert!(host.state_at(W0, pos(2, 0, 0)).is_air());
    assert_eq!(host.writes().len(), 1);
}

#[test]
fn surplus_decisions_are_ignored() {
    let mut host = TestHost::new()
        .with_decider(|_, receipts| vec![Decision::Commit; receipts.len() + 2]);
    let mut tracker = PhaseTracker::default();

    let handle = tracker
        .switch_to(PhaseKind::BlockTick, block_source(pos(0, 0, 0), state(4)))
        .unwrap();
    capture_three(&mut tracker, &mut host);
    let report = tracker.complete_phase(handle, &mut host).unwrap();

    assert_eq!(report.committed(), 3);
    assert_eq!(report.mismatched(), 0);
    assert_eq!(tracker.stats().mismatches, 0);
}
