// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Commit/rollback protocol for transactional activations.
//!
//! Captured mutations are deferred: the world sees none of them until their
//! receipt commits. Unwinding one activation:
//! 1. Builds one receipt per logged block mutation, in capture order.
//! 2. Asks the event collaborator for decisions under the current cause chain.
//! 3. Discards every cancelled receipt, newest first, together with the
//!    notifications queued after it. Nothing is written for them.
//! 4. Replays leading notifications, then commits accepted receipts oldest
//!    first, each followed by the notifications queued after it.
//! 5. Decides and applies captured spawns.
//!
//! Steps 4 and 5 form a plan the tracker drives one step at a time. A replayed
//! notification opens a nested activation whose own [`Unwind`] is pushed above
//! this one, so notification chains nest on the heap rather than the call
//! stack.
use std::collections::VecDeque;

use tracing::{debug, error};

use crate::capture::{NeighborNotification, SpawnRequest};
use crate::cause::CauseChain;
use crate::context::{ContextStatus, PhaseContext};
use crate::error::PhaseError;
use crate::host::PhaseHost;
use crate::ident::ActorRef;
use crate::log::TransactionLog;
use crate::receipt::{
    compute_decision_digest, short_digest, CancelReason, Decision, Disposition, TransactionReceipt,
    UnwindReport,
};
use crate::source::BlockSource;

/// A deferred notification to deliver inside a nested activation.
#[derive(Clone, Debug)]
pub(crate) struct Replay {
    pub(crate) notification: NeighborNotification,
    pub(crate) owner: Option<ActorRef>,
    pub(crate) notifier: Option<ActorRef>,
}

impl Replay {
    pub(crate) fn source(&self) -> BlockSource {
        BlockSource {
            world: self.notification.world,
            pos: self.notification.source_pos,
            state: self.notification.source_block,
            owner: self.owner,
            notifier: self.notifier,
        }
    }
}

#[derive(Debug)]
enum Step {
    Replay(Replay),
    Apply(usize),
    Spawns,
}

/// An activation that left the stack and is committing its captures.
#[derive(Debug)]
pub(crate) struct Unwind {
    context: PhaseContext,
    /// Stack length when the activation was popped.
    base: usize,
    cause: CauseChain,
    receipts: Vec<TransactionReceipt>,
    plan: VecDeque<Step>,
    report: UnwindReport,
    failure: Option<PhaseError>,
    delivery_error: Option<PhaseError>,
}

impl Unwind {
    /// An unwind with nothing left to do.
    pub(crate) fn settled(context: PhaseContext, base: usize) -> Self {
        let report = UnwindReport::empty(context.id(), context.kind());
        Self {
            context,
            base,
            cause: CauseChain::default(),
            receipts: Vec::new(),
            plan: VecDeque::new(),
            report,
            failure: None,
            delivery_error: None,
        }
    }

    /// Decides every captured mutation, discards the cancelled ones and plans
    /// the commit pass.
    pub(crate) fn transactional<H: PhaseHost + ?Sized>(
        mut context: PhaseContext,
        base: usize,
        cause: CauseChain,
        host: &mut H,
    ) -> Self {
        if context.captures().is_empty() {
            return Self::settled(context, base);
        }
        context.set_status(ContextStatus::Reconciling);
        let receipts = build_receipts(context.captures().log());
        let decisions = if receipts.is_empty() {
            Vec::new()
        } else {
            host.fire(&cause, &receipts)
        };
        let dispositions = reconcile(&receipts, &decisions);

        context.set_status(ContextStatus::RollingBack);
        let log = context.captures().log();
        let mut dropped = 0_usize;
        for (receipt, disposition) in receipts.iter().zip(&dispositions).rev() {
            if let Disposition::Cancelled(reason) = disposition {
                let notifications = log.notifications_after(receipt.log_index).count();
                debug!(pos = %receipt.pos(), ?reason, notifications, "discarding cancelled mutation");
                dropped = dropped.saturating_add(notifications);
            }
        }

        let (owner, notifier) = (context.owner(), context.notifier());
        let mut plan: VecDeque<Step> = log
            .leading_notifications()
            .map(|n| {
                Step::Replay(Replay {
                    notification: n.clone(),
                    owner,
                    notifier,
                })
            })
            .collect();
        for (i, (receipt, disposition)) in receipts.iter().zip(&dispositions).enumerate() {
            if *disposition != Disposition::Committed {
                continue;
            }
            plan.push_back(Step::Apply(i));
            let owner = receipt.owner();
            let notifier = receipt.notifier().or(owner);
            plan.extend(log.notifications_after(receipt.log_index).map(|n| {
                Step::Replay(Replay {
                    notification: n.clone(),
                    owner,
                    notifier,
                })
            }));
        }
        if !context.captures().spawns().is_empty() {
            plan.push_back(Step::Spawns);
        }
        context.set_status(ContextStatus::Committing);

        let mut report = UnwindReport::empty(context.id(), context.kind());
        report.notifications_dropped = u32::try_from(dropped).unwrap_or(u32::MAX);
        report.digest = compute_decision_digest(&receipts, &dispositions);
        report.dispositions = dispositions;
        Self {
            context,
            base,
            cause,
            receipts,
            plan,
            report,
            failure: None,
            delivery_error: None,
        }
    }

    pub(crate) fn context(&self) -> &PhaseContext {
        &self.context
    }

    pub(crate) fn base(&self) -> usize {
        self.base
    }

    pub(crate) fn report(&self) -> &UnwindReport {
        &self.report
    }

    /// Runs plan steps that only touch the host and stops at the next
    /// notification to replay. `None` once the plan is exhausted or failed.
    pub(crate) fn advance<H: PhaseHost + ?Sized>(&mut self, host: &mut H) -> Option<Replay> {
        if self.failure.is_some() {
            return None;
        }
        while let Some(step) = self.plan.pop_front() {
            match step {
                Step::Replay(replay) => return Some(replay),
                Step::Apply(i) => {
                    if let Some(receipt) = self.receipts.get(i) {
                        apply(receipt, host);
                    }
                }
                Step::Spawns => {
                    let (committed, cancelled) =
                        settle_spawns(host, &self.cause, self.context.captures().spawns());
                    self.report.spawns_committed = committed;
                    self.report.spawns_cancelled = cancelled;
                }
            }
        }
        None
    }

    /// Records the outcome of a replayed notification's activation.
    pub(crate) fn child_completed(&mut self, result: Result<UnwindReport, PhaseError>) {
        match result {
            Ok(_) => self.report.notifications_replayed += 1,
            Err(err) => self.fail(err),
        }
    }

    /// A replay refused by the depth ceiling.
    pub(crate) fn note_truncated(&mut self) {
        self.report.truncated += 1;
    }

    /// Stops the plan; the first error is the one reported.
    pub(crate) fn fail(&mut self, err: PhaseError) {
        match &self.failure {
            Some(first) => error!(%err, %first, "further unwind error ignored"),
            None => self.failure = Some(err),
        }
    }

    /// Error raised by block logic while this notification activation was
    /// open. Reported in place of the activation's own outcome.
    pub(crate) fn set_delivery_error(&mut self, err: PhaseError) {
        self.delivery_error = Some(err);
    }

    /// Hands back the context and the activation's outcome.
    pub(crate) fn finish(self) -> (PhaseContext, Result<UnwindReport, PhaseError>) {
        let Self {
            context,
            receipts,
            report,
            failure,
            delivery_error,
            ..
        } = self;
        let result = match (delivery_error, failure) {
            (Some(err), Some(completion)) => {
                error!(%completion, "notification activation failed to complete");
                Err(err)
            }
            (Some(err), None) | (None, Some(err)) => Err(err),
            (None, None) => {
                if !receipts.is_empty() {
                    debug!(
                        kind = %report.kind(),
                        receipts = receipts.len(),
                        committed = report.committed(),
                        cancelled = report.cancelled(),
                        replayed = report.notifications_replayed(),
                        digest = %short_digest(&report.digest()),
                        "unwound"
                    );
                }
                Ok(report)
            }
        };
        (context, result)
    }
}

fn apply<H: PhaseHost + ?Sized>(receipt: &TransactionReceipt, host: &mut H) {
    let (world, pos) = (receipt.world(), receipt.pos());
    host.write_state(world, pos, receipt.mutation.new_state);
    if receipt.tile_removed.is_some() {
        let _ = host.remove_tile_entity(world, pos);
    }
    if let Some(added) = &receipt.tile_added {
        host.add_tile_entity(world, pos, added.clone());
    }
    if let Some(owner) = receipt.owner() {
        host.record_owner(world, pos, owner);
    }
    if let Some(notifier) = receipt.notifier() {
        host.record_notifier(world, pos, notifier);
    }
}

fn build_receipts(log: &TransactionLog) -> Vec<TransactionReceipt> {
    log.mutations()
        .map(|(log_index, mutation)| TransactionReceipt {
            log_index,
            mutation: mutation.clone(),
            tile_added: log.tile_added_by(mutation.ordinal).cloned(),
            tile_removed: log.tile_removed_by(mutation.ordinal).cloned(),
        })
        .collect()
}

// Decisions pair with receipts by position. A receipt without one is
// discarded rather than guessed at.
fn reconcile(receipts: &[TransactionReceipt], decisions: &[Decision]) -> Vec<Disposition> {
    if decisions.len() > receipts.len() {
        error!(
            receipts = receipts.len(),
            decisions = decisions.len(),
            "surplus decisions ignored"
        );
    }
    receipts
        .iter()
        .enumerate()
        .map(|(i, receipt)| match decisions.get(i) {
            Some(Decision::Commit) => Disposition::Committed,
            Some(Decision::Cancel) => Disposition::Cancelled(CancelReason::Vetoed),
            None => {
                error!(index = i, pos = %receipt.pos(), "no decision for receipt; discarding");
                Disposition::Cancelled(CancelReason::Mismatch)
            }
        })
        .collect()
}

fn settle_spawns<H: PhaseHost + ?Sized>(
    host: &mut H,
    cause: &CauseChain,
    spawns: &[SpawnRequest],
) -> (u32, u32) {
    let decisions = host.fire_spawns(cause, spawns);
    let (mut committed, mut cancelled) = (0, 0);
    for (i, request) in spawns.iter().enumerate() {
        if decisions.get(i) == Some(&Decision::Commit) {
            host.spawn(request);
            committed += 1;
        } else {
            cancelled += 1;
        }
    }
    (committed, cancelled)
}
