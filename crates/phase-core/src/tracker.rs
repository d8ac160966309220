// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The phase tracker: the single authority for "what scope are we in".
//!
//! A tracker is an explicit value owned by the simulation driver. It holds the
//! activation stack, the cause-frame stack and a pool of reusable contexts
//! (one slot per depth). Nothing here is global; tests build one tracker each.
//!
//! # Invariants
//! - Activations complete in strict stack order; completing anything but the
//!   top is a fatal [`PhaseError::StackDiscipline`].
//! - Every activation pushed by [`PhaseTracker::switch_to`] is unwound exactly
//!   once, reset and returned to the pool, even when its unwind fails.
//! - Exactly one cause frame is pushed per activation and it is popped after
//!   the activation's unwind, so commit-time events see the full chain.
//! - A context being unwound is off the stack but still counts as the
//!   enclosing scope of anything its unwind opens (replayed notifications).
//! - Replayed notifications never recurse: each one's activation is unwound
//!   by the same loop that is unwinding its parent, so a chain as deep as the
//!   depth ceiling costs heap, not call stack.
use tracing::{debug, error, instrument, warn};

use crate::activation::{ActivationId, ContextHandle};
use crate::capture::{BlockChange, CaptureResult, ChangeKind, NeighborNotification};
use crate::cause::{CauseChain, CauseStack};
use crate::config::TrackerConfig;
use crate::context::PhaseContext;
use crate::dump::StackDump;
use crate::error::PhaseError;
use crate::host::{PhaseHost, WorldStore};
use crate::ident::{ActorRef, BlockPos, BlockState, WorldId};
use crate::receipt::{short_digest, UnwindReport};
use crate::source::{FromSource, SourceRef};
use crate::state::PhaseKind;
use crate::unwind::{Replay, Unwind};

/// Counters accumulated over the tracker's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Contexts allocated because no pooled slot was free.
    pub contexts_allocated: u64,
    /// Contexts handed out by `switch_to`.
    pub contexts_acquired: u64,
    /// Contexts reset and returned to the pool.
    pub contexts_released: u64,
    /// Activations refused by the depth ceiling.
    pub truncations: u64,
    /// Receipts discarded because the event collaborator left them undecided.
    pub mismatches: u64,
    /// Calls to [`PhaseTracker::abort_tick`].
    pub aborted_ticks: u64,
}

/// Outcome of delivering a neighbor notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Deferred into the current activation's log.
    Queued,
    /// Delivered inside a nested notification activation.
    Delivered,
    /// Refused by the depth ceiling; the chain stops here.
    Truncated,
}

/// Summary of an activation that encloses new ones: the stack top, or a
/// context currently being unwound.
#[derive(Clone, Copy, Debug)]
struct Enclosing {
    kind: PhaseKind,
    depth: u32,
    owner: Option<ActorRef>,
    notifier: Option<ActorRef>,
    block_events: bool,
}

impl Enclosing {
    fn of(context: &PhaseContext) -> Self {
        Self {
            kind: context.kind(),
            depth: context.depth(),
            owner: context.owner(),
            notifier: context.notifier(),
            block_events: context.policy().block_events,
        }
    }
}

/// Stack manager for phase activations.
#[derive(Debug)]
pub struct PhaseTracker {
    config: TrackerConfig,
    stack: Vec<PhaseContext>,
    pool: Vec<Option<PhaseContext>>,
    causes: CauseStack,
    unwinds: Vec<Unwind>,
    activation_counter: u64,
    truncation_reported: bool,
    stats: TrackerStats,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl PhaseTracker {
    /// Creates an empty tracker.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            pool: Vec::new(),
            causes: CauseStack::new(),
            unwinds: Vec::new(),
            activation_counter: 0,
            truncation_reported: false,
            stats: TrackerStats::default(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Lifetime counters.
    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Number of open activations on the stack.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// True when nothing is open and nothing is unwinding.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty() && self.unwinds.is_empty()
    }

    /// The stack top.
    pub fn current(&self) -> Option<&PhaseContext> {
        self.stack.last()
    }

    /// Mutable access to the stack top; the only way to capture.
    pub fn current_mut(&mut self) -> Option<&mut PhaseContext> {
        self.stack.last_mut()
    }

    /// Kind of the stack top.
    pub fn current_kind(&self) -> Option<PhaseKind> {
        self.current().map(PhaseContext::kind)
    }

    /// True when `kind` is open or unwinding.
    pub fn is_active(&self, kind: PhaseKind) -> bool {
        self.stack.iter().any(|c| c.kind() == kind)
            || self.unwinds.iter().any(|u| u.context().kind() == kind)
    }

    /// Flattened cause chain, most specific first.
    pub fn cause(&self) -> CauseChain {
        self.causes.current()
    }

    /// The raw cause-frame stack.
    pub fn cause_stack(&self) -> &CauseStack {
        &self.causes
    }

    /// Printable diagnostic of the open activations and cause frames.
    pub fn dump(&self) -> StackDump {
        StackDump::capture(
            self.stack.iter(),
            self.causes.frames(),
            self.config.verbose_dumps,
        )
    }

    /// Typed view of the stack top's source, with a full-stack dump on failure.
    pub fn current_source_as<T: FromSource>(&self) -> Result<&T, PhaseError> {
        let context = self.current().ok_or(PhaseError::NoActivePhase)?;
        if let Some(source) = context.source().and_then(T::from_source) {
            return Ok(source);
        }
        let dump = self.dump();
        error!(kind = %context.kind(), expected = %T::KIND, "phase source mismatch\n{dump}");
        Err(context.source_mismatch::<T>(dump))
    }

    fn enclosing(&self) -> Option<Enclosing> {
        let top = self.stack.last().map(Enclosing::of);
        let unwinding = self.unwinds.last().map(|u| Enclosing::of(u.context()));
        match (top, unwinding) {
            (Some(top), Some(unwinding)) => Some(if unwinding.depth > top.depth {
                unwinding
            } else {
                top
            }),
            (top, unwinding) => top.or(unwinding),
        }
    }

    /// Opens an activation of `kind` driven by `source`.
    ///
    /// # Errors
    /// - [`PhaseError::DepthExceeded`] (recoverable) when the new depth would
    ///   exceed the configured ceiling.
    /// - [`PhaseError::Reentrancy`] (fatal) when `kind` is not reentrant and is
    ///   already active.
    /// - [`PhaseError::BlockEventsDisallowed`] (recoverable) when opening a
    ///   block-event activation under a scope whose policy forbids it.
    pub fn switch_to(
        &mut self,
        kind: PhaseKind,
        source: impl Into<SourceRef>,
    ) -> Result<ContextHandle, PhaseError> {
        let source = source.into();
        let state = kind.state();
        let enclosing = self.enclosing();
        let depth = enclosing.map_or(0, |e| e.depth).saturating_add(1);
        let max = self.config.effective_max_depth();
        if depth > max {
            self.note_truncation(kind, depth, max);
            return Err(PhaseError::DepthExceeded { kind, depth, max });
        }
        if !state.is_reentrant() && self.is_active(kind) {
            let dump = self.dump();
            error!(%kind, "phase is not reentrant and is already active\n{dump}");
            return Err(PhaseError::Reentrancy { kind, dump });
        }
        if kind == PhaseKind::BlockEventTick {
            if let Some(outer) = enclosing.filter(|e| !e.block_events) {
                debug!(enclosing = %outer.kind, "block-event activation refused");
                return Err(PhaseError::BlockEventsDisallowed {
                    enclosing: outer.kind,
                });
            }
        }

        let id = ActivationId::next_after(&mut self.activation_counter);
        let mut context = self.acquire(depth);
        state.create_context(&mut context, id, depth);
        state.refine_policy(context.policy_mut(), &source);
        let (owner, notifier) = state.attribution(
            &source,
            enclosing.and_then(|e| e.owner),
            enclosing.and_then(|e| e.notifier),
        );
        context.set_attribution(owner, notifier);
        context.with_source(source);
        self.causes.push_frame(state.build_frame(&context));
        debug!(%kind, %id, depth, "phase entered");
        self.stack.push(context);
        Ok(ContextHandle { id, kind, depth })
    }

    /// Completes the top activation: unwinds it (commit/rollback), pops its
    /// cause frame, resets it and returns it to the pool. Notifications
    /// replayed by the unwind, and whatever they trigger, are finished before
    /// this returns.
    ///
    /// # Errors
    /// - [`PhaseError::StackDiscipline`] (fatal) when `handle` is not the top;
    ///   nothing is popped.
    /// - Any fatal error raised while unwinding. The activation is still reset
    ///   and pooled.
    #[instrument(level = "debug", skip_all, fields(kind = %handle.kind, id = %handle.id))]
    pub fn complete_phase<H: PhaseHost + ?Sized>(
        &mut self,
        handle: ContextHandle,
        host: &mut H,
    ) -> Result<UnwindReport, PhaseError> {
        self.begin_unwind(handle, host)?;
        self.drive(host)
    }

    fn begin_unwind<H: PhaseHost + ?Sized>(
        &mut self,
        handle: ContextHandle,
        host: &mut H,
    ) -> Result<(), PhaseError> {
        let top = self.stack.last().map(PhaseContext::id);
        if top != Some(handle.id) {
            let dump = self.dump();
            error!(completing = %handle.id, "phase stack discipline violated\n{dump}");
            return Err(PhaseError::StackDiscipline {
                completing: handle.id,
                top,
                dump,
            });
        }
        let Some(context) = self.stack.pop() else {
            return Err(PhaseError::NoActivePhase);
        };
        let base = self.stack.len();
        // Our cause frame stays pushed until `finish_unwind`.
        let cause = if context.captures().is_empty() {
            CauseChain::default()
        } else {
            self.cause()
        };
        let unwind = handle.kind.state().begin_unwind(context, base, cause, host);
        let mismatched = unwind.report().mismatched();
        if mismatched > 0 {
            self.stats.mismatches += u64::try_from(mismatched).unwrap_or(u64::MAX);
        }
        self.unwinds.push(unwind);
        Ok(())
    }

    /// Runs the top unwind, and every unwind its replays open, to completion.
    fn drive<H: PhaseHost + ?Sized>(&mut self, host: &mut H) -> Result<UnwindReport, PhaseError> {
        let floor = self.unwinds.len();
        loop {
            let next = match self.unwinds.last_mut() {
                Some(unwind) => unwind.advance(host),
                None => return Err(PhaseError::NoActivePhase),
            };
            if let Some(replay) = next {
                self.replay(host, &replay);
                continue;
            }
            let result = self.finish_unwind(host);
            if self.unwinds.len() < floor {
                return result;
            }
            if let Some(parent) = self.unwinds.last_mut() {
                parent.child_completed(result);
            }
        }
    }

    /// Opens a notification activation for `replay` and delivers it. On
    /// success the activation's unwind is left on top for `drive`.
    fn replay<H: PhaseHost + ?Sized>(&mut self, host: &mut H, replay: &Replay) {
        let handle = match self.switch_to(PhaseKind::NeighborNotification, replay.source()) {
            Ok(handle) => handle,
            Err(err) => {
                if let Some(parent) = self.unwinds.last_mut() {
                    if err.is_fatal() {
                        parent.fail(err);
                    } else {
                        parent.note_truncated();
                    }
                }
                return;
            }
        };
        let delivered = host.neighbor_changed(self, &replay.notification);
        match self.begin_unwind(handle, host) {
            Ok(()) => {
                if let (Err(err), Some(child)) = (delivered, self.unwinds.last_mut()) {
                    child.set_delivery_error(err);
                }
            }
            Err(completion) => {
                let err = match delivered {
                    Err(err) => {
                        error!(%completion, "notification activation failed to complete");
                        err
                    }
                    Ok(()) => completion,
                };
                if let Some(parent) = self.unwinds.last_mut() {
                    parent.fail(err);
                }
            }
        }
    }

    fn finish_unwind<H: PhaseHost + ?Sized>(&mut self, host: &mut H) -> Result<UnwindReport, PhaseError> {
        let Some(base) = self.unwinds.last().map(Unwind::base) else {
            return Err(PhaseError::NoActivePhase);
        };
        // Block logic that failed mid-delivery can leave activations above us;
        // finish them so our cause frame is the one popped below.
        let leaked = self.drain_above(base, host);
        if leaked > 0 {
            warn!(leaked, "completed activations left open by an unwind");
        }
        let Some(unwind) = self.unwinds.pop() else {
            return Err(PhaseError::NoActivePhase);
        };
        self.causes.pop_frame();
        let (context, result) = unwind.finish();
        let (kind, id) = (context.kind(), context.id());
        self.release(context);
        if self.is_empty() {
            self.truncation_reported = false;
        }

        match &result {
            Ok(report) => debug!(
                %kind,
                %id,
                committed = report.committed(),
                cancelled = report.cancelled(),
                digest = %short_digest(&report.digest()),
                "phase completed"
            ),
            Err(err) => error!(%kind, %id, %err, "phase unwind failed"),
        }
        result
    }

    /// Runs `body` inside an activation and always completes it, even when
    /// `body` fails.
    ///
    /// Returns the body's value with the unwind report. A body error wins over
    /// a completion error; the latter is logged.
    pub fn run_phase<H, T, F>(
        &mut self,
        kind: PhaseKind,
        source: impl Into<SourceRef>,
        host: &mut H,
        body: F,
    ) -> Result<(T, UnwindReport), PhaseError>
    where
        H: PhaseHost + ?Sized,
        F: FnOnce(&mut Self, &mut H) -> Result<T, PhaseError>,
    {
        let handle = self.switch_to(kind, source)?;
        let outcome = body(self, host);
        let completed = self.complete_phase(handle, host);
        match (outcome, completed) {
            (Ok(value), Ok(report)) => Ok((value, report)),
            (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
            (Err(err), Err(completion)) => {
                error!(%completion, "completion failed after body error");
                Err(err)
            }
        }
    }

    /// Abandons the current tick after a fatal error: every open activation is
    /// unwound top-down, reset and pooled. Returns how many were drained.
    ///
    /// Must be called from the driver, not from inside an unwind.
    pub fn abort_tick<H: PhaseHost + ?Sized>(&mut self, host: &mut H) -> usize {
        if !self.unwinds.is_empty() {
            error!("abort_tick called while an activation is unwinding; ignored");
            return 0;
        }
        let drained = self.drain_above(0, host);
        self.stats.aborted_ticks += 1;
        self.truncation_reported = false;
        warn!(drained, "tick aborted");
        drained
    }

    fn drain_above<H: PhaseHost + ?Sized>(&mut self, base: usize, host: &mut H) -> usize {
        let mut drained = 0;
        while self.stack.len() > base {
            let Some(top) = self.stack.last() else {
                break;
            };
            let handle = ContextHandle {
                id: top.id(),
                kind: top.kind(),
                depth: top.depth(),
            };
            if let Err(err) = self.complete_phase(handle, host) {
                error!(%err, "failed to unwind an abandoned activation");
            }
            drained += 1;
        }
        drained
    }

    /// Offers a block mutation to the stack top.
    pub fn capture_block_change(&mut self, change: BlockChange) -> Result<CaptureResult, PhaseError> {
        self.current_mut()
            .ok_or(PhaseError::NoActivePhase)?
            .capture_block_change(change)
    }

    /// Sets a block through the tracker: the change is captured when the top
    /// activation batches blocks (applied at commit), otherwise it is written
    /// immediately.
    pub fn set_block<W: WorldStore + ?Sized>(
        &mut self,
        store: &mut W,
        world: WorldId,
        pos: BlockPos,
        state: BlockState,
        kind: ChangeKind,
    ) -> Result<CaptureResult, PhaseError> {
        let old_state = store.read_state(world, pos);
        let result = match self.current_mut() {
            Some(context) => {
                context.capture_block_change(BlockChange::new(world, pos, old_state, state, kind))?
            }
            None => CaptureResult::Bypassed,
        };
        if result == CaptureResult::Bypassed {
            store.write_state(world, pos, state);
        }
        Ok(result)
    }

    /// Queues a neighbor notification in the top activation, or delivers it
    /// right away when the top does not batch blocks.
    pub fn notify_neighbor<H: PhaseHost + ?Sized>(
        &mut self,
        host: &mut H,
        notification: NeighborNotification,
    ) -> Result<NotifyOutcome, PhaseError> {
        let captured = match self.current_mut() {
            Some(context) => context.queue_neighbor_notification(notification.clone())?,
            None => CaptureResult::Bypassed,
        };
        if captured == CaptureResult::Captured {
            return Ok(NotifyOutcome::Queued);
        }
        let (owner, notifier) = self
            .current()
            .map_or((None, None), |c| (c.owner(), c.notifier()));
        self.dispatch_notification(host, notification, owner, notifier)
    }

    /// Notifies the six neighbours of `pos` that it changed to `state`.
    pub fn notify_neighbors<H: PhaseHost + ?Sized>(
        &mut self,
        host: &mut H,
        world: WorldId,
        pos: BlockPos,
        state: BlockState,
    ) -> Result<(), PhaseError> {
        for notify_pos in pos.neighbors() {
            self.notify_neighbor(
                host,
                NeighborNotification {
                    world,
                    notify_pos,
                    source_block: state,
                    source_pos: pos,
                },
            )?;
        }
        Ok(())
    }

    /// Delivers one notification right away inside a nested notification
    /// activation attributed to `owner`/`notifier`.
    fn dispatch_notification<H: PhaseHost + ?Sized>(
        &mut self,
        host: &mut H,
        notification: NeighborNotification,
        owner: Option<ActorRef>,
        notifier: Option<ActorRef>,
    ) -> Result<NotifyOutcome, PhaseError> {
        let replay = Replay {
            notification,
            owner,
            notifier,
        };
        let handle = match self.switch_to(PhaseKind::NeighborNotification, replay.source()) {
            Ok(handle) => handle,
            Err(err) if !err.is_fatal() => return Ok(NotifyOutcome::Truncated),
            Err(err) => return Err(err),
        };
        let delivered = host.neighbor_changed(self, &replay.notification);
        let completed = self.complete_phase(handle, host);
        match (delivered, completed) {
            (Ok(()), Ok(_)) => Ok(NotifyOutcome::Delivered),
            (Err(err), Ok(_)) | (Ok(()), Err(err)) => Err(err),
            (Err(err), Err(completion)) => {
                error!(%completion, "notification activation failed to complete");
                Err(err)
            }
        }
    }

    fn note_truncation(&mut self, kind: PhaseKind, depth: u32, max: u32) {
        self.stats.truncations += 1;
        if self.config.warn_on_truncation && !self.truncation_reported {
            self.truncation_reported = true;
            warn!(%kind, depth, max, "phase depth limit reached; truncating nested chain");
        } else {
            debug!(%kind, depth, max, "phase chain truncated");
        }
    }

    fn acquire(&mut self, depth: u32) -> PhaseContext {
        self.stats.contexts_acquired += 1;
        let slot = depth as usize;
        if let Some(context) = self.pool.get_mut(slot).and_then(Option::take) {
            return context;
        }
        self.stats.contexts_allocated += 1;
        PhaseContext::blank()
    }

    fn release(&mut self, mut context: PhaseContext) {
        let slot = context.depth() as usize;
        context.reset();
        if self.pool.len() <= slot {
            self.pool.resize_with(slot + 1, || None);
        }
        self.pool[slot] = Some(context);
        self.stats.contexts_released += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BlockSource, ServerSource, WorldSource};

    #[test]
    fn depth_counts_from_one_and_pool_reuses_slots() {
        let mut tracker = PhaseTracker::default();
        for _ in 0..3 {
            let handle = tracker.switch_to(PhaseKind::ServerTick, ServerSource);
            let Ok(handle) = handle else {
                panic!("server tick refused: {handle:?}");
            };
            assert_eq!(handle.depth(), 1);
            // Server ticks never capture; release directly.
            let Some(context) = tracker.stack.pop() else {
                panic!("missing context");
            };
            tracker.causes.pop_frame();
            tracker.release(context);
        }
        let stats = tracker.stats();
        assert_eq!(stats.contexts_allocated, 1);
        assert_eq!(stats.contexts_acquired, 3);
        assert_eq!(stats.contexts_released, 3);
    }

    #[test]
    fn enclosing_prefers_the_deeper_of_top_and_unwinding() {
        let mut tracker = PhaseTracker::default();
        let outer = tracker.switch_to(PhaseKind::WorldTick, WorldSource { world: WorldId(0) });
        assert!(outer.is_ok());
        let block = BlockSource {
            world: WorldId(0),
            pos: BlockPos::new(0, 0, 0),
            state: BlockState::AIR,
            owner: None,
            notifier: None,
        };
        let inner = tracker.switch_to(PhaseKind::BlockTick, block.clone());
        assert!(inner.is_ok());
        // Park the block tick as if it were committing.
        let Some(context) = tracker.stack.pop() else {
            panic!("missing context");
        };
        tracker.unwinds.push(Unwind::settled(context, 1));
        assert_eq!(tracker.enclosing().map(|e| e.depth), Some(2));
        assert!(tracker.is_active(PhaseKind::BlockTick));
        let nested = tracker.switch_to(PhaseKind::NeighborNotification, block);
        assert_eq!(nested.map(|h| h.depth()).ok(), Some(3));
    }
}
