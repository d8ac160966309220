// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collaborator ports the tracker consumes.
//!
//! The tracker never touches world storage, dispatches events or tracks
//! positions itself. A host (the simulation driver) implements these traits;
//! anything implementing all four is a [`PhaseHost`].
use crate::capture::{NeighborNotification, SpawnRequest};
use crate::cause::CauseChain;
use crate::error::PhaseError;
use crate::ident::{ActorRef, BlockPos, BlockState, TileEntitySnapshot, WorldId};
use crate::receipt::{Decision, TransactionReceipt};
use crate::tracker::PhaseTracker;

/// World storage primitives.
pub trait WorldStore {
    /// Current state at `pos`.
    fn read_state(&self, world: WorldId, pos: BlockPos) -> BlockState;
    /// Overwrites the state at `pos`.
    fn write_state(&mut self, world: WorldId, pos: BlockPos, state: BlockState);
    /// Inserts (or replaces) the tile entity at `pos`.
    fn add_tile_entity(&mut self, world: WorldId, pos: BlockPos, snapshot: TileEntitySnapshot);
    /// Removes the tile entity at `pos`, returning its last contents.
    fn remove_tile_entity(&mut self, world: WorldId, pos: BlockPos) -> Option<TileEntitySnapshot>;
    /// Adds an accepted entity or item drop to the world.
    fn spawn(&mut self, request: &SpawnRequest);
}

/// Cancellable-event dispatch.
pub trait EventDispatcher {
    /// Decides every receipt; must return one decision per receipt, in order.
    fn fire(&mut self, cause: &CauseChain, receipts: &[TransactionReceipt]) -> Vec<Decision>;

    /// Decides captured spawns and drops; one decision per request, in order.
    ///
    /// Defaults to accepting everything.
    fn fire_spawns(&mut self, cause: &CauseChain, requests: &[SpawnRequest]) -> Vec<Decision> {
        let _ = cause;
        vec![Decision::Commit; requests.len()]
    }
}

/// Per-position attribution storage.
pub trait PositionTracker {
    /// Records the responsible actor for `pos`.
    fn record_owner(&mut self, world: WorldId, pos: BlockPos, actor: ActorRef);
    /// Records the immediate trigger for `pos`.
    fn record_notifier(&mut self, world: WorldId, pos: BlockPos, actor: ActorRef);
}

/// Delivery of neighbor-changed notifications to block logic.
pub trait NeighborNotifier {
    /// Called inside a [`crate::PhaseKind::NeighborNotification`] activation
    /// that is the top of `tracker`; the block at `notification.notify_pos`
    /// reacts, typically capturing further mutations through
    /// [`PhaseTracker::current_mut`].
    fn neighbor_changed(
        &mut self,
        tracker: &mut PhaseTracker,
        notification: &NeighborNotification,
    ) -> Result<(), PhaseError>;
}

/// Everything the tracker needs from its host.
pub trait PhaseHost: WorldStore + EventDispatcher + PositionTracker + NeighborNotifier {}

impl<T> PhaseHost for T where T: WorldStore + EventDispatcher + PositionTracker + NeighborNotifier + ?Sized {}
