// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Phase contexts: one activation record per nested scope.
//!
//! A context is primed by its [`crate::PhaseState`], receives a source from the
//! tracker, captures mutations while it is the stack top, is unwound exactly
//! once and is then reset and returned to the tracker's pool.
//!
//! # Invariants
//! - Captures are accepted only in [`ContextStatus::Capturing`]. The only way
//!   to obtain `&mut PhaseContext` from outside the crate is
//!   [`crate::PhaseTracker::current_mut`], which always yields the stack top.
//! - `reset()` clears every buffer, the source and the attribution; a reset
//!   context reports [`ContextStatus::Reset`] until primed again.
use std::iter;

use crate::activation::ActivationId;
use crate::capture::{
    BlockChange, CaptureBuffers, CapturePolicy, CaptureResult, ItemStack, NeighborNotification,
    SpawnCause, SpawnRequest, Spawnable,
};
use crate::dump::StackDump;
use crate::error::PhaseError;
use crate::ident::{ActorRef, BlockPos, WorldId};
use crate::source::{FromSource, SourceRef};
use crate::state::PhaseKind;

/// Lifecycle of a context as seen by its transaction log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextStatus {
    /// Open; captures are accepted.
    Capturing,
    /// Unwinding; receipts are being decided by the event collaborator.
    Reconciling,
    /// Unwinding; accepted mutations are being applied.
    Committing,
    /// Unwinding; rejected mutations are being compensated.
    RollingBack,
    /// Cleared and pooled (or never primed).
    Reset,
}

/// One activation record.
#[derive(Debug)]
pub struct PhaseContext {
    id: ActivationId,
    kind: PhaseKind,
    depth: u32,
    source: Option<SourceRef>,
    owner: Option<ActorRef>,
    notifier: Option<ActorRef>,
    captures: CaptureBuffers,
    policy: CapturePolicy,
    status: ContextStatus,
}

impl PhaseContext {
    pub(crate) fn blank() -> Self {
        Self {
            id: ActivationId::from_raw(0),
            kind: PhaseKind::ServerTick,
            depth: 0,
            source: None,
            owner: None,
            notifier: None,
            captures: CaptureBuffers::default(),
            policy: CapturePolicy::NONE,
            status: ContextStatus::Reset,
        }
    }

    pub(crate) fn prime(&mut self, id: ActivationId, kind: PhaseKind, depth: u32, policy: CapturePolicy) {
        debug_assert_eq!(self.status, ContextStatus::Reset, "priming a context that was not reset");
        debug_assert!(self.captures.is_empty(), "priming a context with leftover captures");
        self.id = id;
        self.kind = kind;
        self.depth = depth;
        self.policy = policy;
        self.status = ContextStatus::Capturing;
    }

    pub(crate) fn with_source(&mut self, source: SourceRef) -> &mut Self {
        self.source = Some(source);
        self
    }

    pub(crate) fn policy_mut(&mut self) -> &mut CapturePolicy {
        &mut self.policy
    }

    pub(crate) fn set_status(&mut self, status: ContextStatus) {
        self.status = status;
    }

    pub(crate) fn reset(&mut self) {
        self.id = ActivationId::from_raw(0);
        self.depth = 0;
        self.source = None;
        self.owner = None;
        self.notifier = None;
        self.captures.clear();
        self.policy = CapturePolicy::NONE;
        self.status = ContextStatus::Reset;
    }

    /// Activation id.
    pub fn id(&self) -> ActivationId {
        self.id
    }

    /// Phase kind.
    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// Nesting depth; root activations have depth 1.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Attached source, if any.
    pub fn source(&self) -> Option<&SourceRef> {
        self.source.as_ref()
    }

    /// Responsible actor for mutations captured from now on.
    pub fn owner(&self) -> Option<ActorRef> {
        self.owner
    }

    /// Immediate trigger for mutations captured from now on.
    pub fn notifier(&self) -> Option<ActorRef> {
        self.notifier
    }

    /// Capture permissions.
    pub fn policy(&self) -> CapturePolicy {
        self.policy
    }

    /// Lifecycle status.
    pub fn status(&self) -> ContextStatus {
        self.status
    }

    /// True while captures are accepted.
    pub fn is_capturing(&self) -> bool {
        self.status == ContextStatus::Capturing
    }

    /// Everything captured so far.
    pub fn captures(&self) -> &CaptureBuffers {
        &self.captures
    }

    /// Overrides the owner for mutations captured from now on.
    ///
    /// Mutations already captured keep the owner they were captured with.
    pub fn with_owner(&mut self, owner: ActorRef) -> &mut Self {
        self.owner = Some(owner);
        self
    }

    /// Overrides the notifier for mutations captured from now on.
    pub fn with_notifier(&mut self, notifier: ActorRef) -> &mut Self {
        self.notifier = Some(notifier);
        self
    }

    pub(crate) fn set_attribution(&mut self, owner: Option<ActorRef>, notifier: Option<ActorRef>) {
        self.owner = owner;
        self.notifier = notifier;
    }

    /// Typed view of the source.
    ///
    /// Fails when no source is attached or it is another variant. The error's
    /// dump covers this activation only; use
    /// [`crate::PhaseTracker::current_source_as`] for a full-stack dump.
    pub fn source_as<T: FromSource>(&self) -> Result<&T, PhaseError> {
        self.source
            .as_ref()
            .and_then(T::from_source)
            .ok_or_else(|| self.source_mismatch::<T>(StackDump::capture(iter::once(self), &[], false)))
    }

    pub(crate) fn source_mismatch<T: FromSource>(&self, dump: StackDump) -> PhaseError {
        PhaseError::SourceMismatch {
            kind: self.kind,
            expected: T::KIND,
            actual: self.source.as_ref().map(SourceRef::kind),
            dump,
        }
    }

    fn ensure_capturing(&self) -> Result<(), PhaseError> {
        if self.is_capturing() {
            Ok(())
        } else {
            Err(PhaseError::NotCapturing(self.id))
        }
    }

    /// Records a block mutation with the current owner/notifier, or reports
    /// that the caller must apply it immediately.
    pub fn capture_block_change(&mut self, change: BlockChange) -> Result<CaptureResult, PhaseError> {
        self.ensure_capturing()?;
        if !self.policy.blocks {
            return Ok(CaptureResult::Bypassed);
        }
        self.captures
            .log
            .push_mutation(change, self.owner, self.notifier);
        Ok(CaptureResult::Captured)
    }

    /// Defers a neighbor notification until the mutation before it commits.
    pub fn queue_neighbor_notification(
        &mut self,
        notification: NeighborNotification,
    ) -> Result<CaptureResult, PhaseError> {
        self.ensure_capturing()?;
        if !self.policy.blocks {
            return Ok(CaptureResult::Bypassed);
        }
        self.captures.log.push_notification(notification);
        Ok(CaptureResult::Captured)
    }

    /// Records an entity spawn or item drop.
    ///
    /// Entities and items are gated separately by the policy.
    pub fn capture_entity_spawn(&mut self, request: SpawnRequest) -> Result<CaptureResult, PhaseError> {
        self.ensure_capturing()?;
        let allowed = if request.subject.is_item() {
            self.policy.drops
        } else {
            self.policy.entities
        };
        if !allowed {
            return Ok(CaptureResult::Bypassed);
        }
        self.captures.spawns.push(request);
        Ok(CaptureResult::Captured)
    }

    /// Records an item drop at `pos`.
    pub fn capture_item_drop(
        &mut self,
        world: WorldId,
        pos: BlockPos,
        stack: ItemStack,
        cause: SpawnCause,
    ) -> Result<CaptureResult, PhaseError> {
        self.capture_entity_spawn(SpawnRequest {
            subject: Spawnable::Item { world, pos, stack },
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ChangeKind;
    use crate::ident::BlockState;
    use crate::source::{BlockSource, SourceKind, WorldSource};

    fn primed(policy: CapturePolicy) -> PhaseContext {
        let mut ctx = PhaseContext::blank();
        ctx.prime(ActivationId::from_raw(7), PhaseKind::BlockTick, 1, policy);
        ctx
    }

    fn place(x: i32) -> BlockChange {
        BlockChange::new(
            WorldId(0),
            BlockPos::new(x, 0, 0),
            BlockState::AIR,
            BlockState::from_raw(2),
            ChangeKind::Place,
        )
    }

    #[test]
    fn capture_snapshots_attribution_at_capture_time() {
        let mut ctx = primed(CapturePolicy::ALL);
        ctx.with_owner(ActorRef::Entity(crate::ident::EntityId(1)));
        assert_eq!(ctx.capture_block_change(place(0)).ok(), Some(CaptureResult::Captured));
        ctx.with_owner(ActorRef::Entity(crate::ident::EntityId(2)));
        assert_eq!(ctx.capture_block_change(place(1)).ok(), Some(CaptureResult::Captured));

        let owners: Vec<_> = ctx.captures().log().mutations().map(|(_, m)| m.owner).collect();
        assert_eq!(
            owners,
            vec![
                Some(ActorRef::Entity(crate::ident::EntityId(1))),
                Some(ActorRef::Entity(crate::ident::EntityId(2))),
            ]
        );
    }

    #[test]
    fn non_capturing_policy_bypasses() {
        let mut ctx = primed(CapturePolicy::NONE);
        assert_eq!(ctx.capture_block_change(place(0)).ok(), Some(CaptureResult::Bypassed));
        assert!(ctx.captures().is_empty());
    }

    #[test]
    fn captures_rejected_outside_capturing_state() {
        let mut ctx = primed(CapturePolicy::ALL);
        ctx.set_status(ContextStatus::Reconciling);
        assert!(matches!(
            ctx.capture_block_change(place(0)),
            Err(PhaseError::NotCapturing(id)) if id.value() == 7
        ));
    }

    #[test]
    fn reset_clears_everything() {
        let mut ctx = primed(CapturePolicy::ALL);
        ctx.with_source(SourceRef::World(WorldSource { world: WorldId(1) }));
        ctx.with_notifier(ActorRef::Block(WorldId(1), BlockPos::new(0, 0, 0)));
        let _ = ctx.capture_block_change(place(0));
        ctx.reset();
        assert_eq!(ctx.status(), ContextStatus::Reset);
        assert!(ctx.captures().is_empty());
        assert!(ctx.source().is_none());
        assert!(ctx.notifier().is_none());
    }

    #[test]
    fn source_as_reports_expected_and_actual() {
        let mut ctx = primed(CapturePolicy::ALL);
        ctx.with_source(SourceRef::World(WorldSource { world: WorldId(1) }));
        assert!(ctx.source_as::<WorldSource>().is_ok());
        match ctx.source_as::<BlockSource>() {
            Err(PhaseError::SourceMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, SourceKind::Block);
                assert_eq!(actual, Some(SourceKind::World));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
