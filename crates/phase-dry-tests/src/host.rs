// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory [`PhaseHost`] with scripted decisions and neighbor reactions.
//!
//! Every call the tracker makes is recorded so tests can assert on write
//! order, fired receipts, delivered notifications and attribution.

use phase_core::{
    ActorRef, BlockChange, BlockPos, BlockState, CauseChain, ChangeKind, Decision, EventDispatcher,
    NeighborNotification, NeighborNotifier, PhaseError, PhaseKind, PhaseTracker, PositionTracker,
    SpawnRequest, TileEntitySnapshot, TransactionReceipt, WorldId, WorldStore,
};
use rustc_hash::FxHashMap;

type Key = (WorldId, BlockPos);
type Decider = Box<dyn FnMut(&CauseChain, &[TransactionReceipt]) -> Vec<Decision>>;
type SpawnDecider = Box<dyn FnMut(&CauseChain, &[SpawnRequest]) -> Vec<Decision>>;

/// Block logic run when a notification is delivered. The notification
/// activation is the tracker's top while it runs.
pub type Reaction = Box<dyn FnMut(&mut PhaseTracker, &NeighborNotification) -> Result<(), PhaseError>>;

/// One call to [`EventDispatcher::fire`].
#[derive(Clone, Debug)]
pub struct FiredEvent {
    /// Cause chain the receipts were fired under.
    pub cause: CauseChain,
    /// Receipts in capture order.
    pub receipts: Vec<TransactionReceipt>,
    /// Decisions returned.
    pub decisions: Vec<Decision>,
}

/// One call to [`NeighborNotifier::neighbor_changed`].
#[derive(Clone, Debug)]
pub struct DeliveredNotification {
    /// The notification.
    pub notification: NeighborNotification,
    /// Kind of the activation it was delivered in.
    pub kind: Option<PhaseKind>,
    /// Depth of that activation.
    pub depth: u32,
    /// Owner of that activation.
    pub owner: Option<ActorRef>,
    /// Notifier of that activation.
    pub notifier: Option<ActorRef>,
    /// Cause chain at delivery.
    pub cause: CauseChain,
    /// Number of state writes the host had seen when this was delivered.
    pub writes_seen: usize,
}

/// In-memory world plus scripted collaborators.
pub struct TestHost {
    states: FxHashMap<Key, BlockState>,
    tiles: FxHashMap<Key, TileEntitySnapshot>,
    owners: FxHashMap<Key, ActorRef>,
    notifiers: FxHashMap<Key, ActorRef>,
    writes: Vec<(WorldId, BlockPos, BlockState)>,
    spawned: Vec<SpawnRequest>,
    fired: Vec<FiredEvent>,
    delivered: Vec<DeliveredNotification>,
    decider: Decider,
    spawn_decider: Option<SpawnDecider>,
    reaction: Option<Reaction>,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    /// Empty world; every receipt and spawn is committed; notifications do
    /// nothing.
    pub fn new() -> Self {
        Self {
            states: FxHashMap::default(),
            tiles: FxHashMap::default(),
            owners: FxHashMap::default(),
            notifiers: FxHashMap::default(),
            writes: Vec::new(),
            spawned: Vec::new(),
            fired: Vec::new(),
            delivered: Vec::new(),
            decider: Box::new(|_: &CauseChain, receipts: &[TransactionReceipt]| {
                vec![Decision::Commit; receipts.len()]
            }),
            spawn_decider: None,
            reaction: None,
        }
    }

    /// Seeds a block without recording a write.
    pub fn with_block(mut self, world: WorldId, pos: BlockPos, state: BlockState) -> Self {
        self.states.insert((world, pos), state);
        self
    }

    /// Seeds a tile entity.
    pub fn with_tile(mut self, world: WorldId, pos: BlockPos, snapshot: TileEntitySnapshot) -> Self {
        self.tiles.insert((world, pos), snapshot);
        self
    }

    /// Replaces the receipt decider.
    pub fn with_decider<F>(mut self, decider: F) -> Self
    where
        F: FnMut(&CauseChain, &[TransactionReceipt]) -> Vec<Decision> + 'static,
    {
        self.decider = Box::new(decider);
        self
    }

    /// Cancels every receipt.
    pub fn cancel_all(self) -> Self {
        self.with_decider(|_, receipts| vec![Decision::Cancel; receipts.len()])
    }

    /// Cancels receipts whose position is in `positions`; commits the rest.
    pub fn cancel_at(self, positions: &[BlockPos]) -> Self {
        let positions = positions.to_vec();
        self.with_decider(move |_, receipts| {
            receipts
                .iter()
                .map(|r| {
                    if positions.contains(&r.pos()) {
                        Decision::Cancel
                    } else {
                        Decision::Commit
                    }
                })
                .collect()
        })
    }

    /// Commits every receipt but answers with at most `count` decisions.
    pub fn short_decisions(self, count: usize) -> Self {
        self.with_decider(move |_, receipts| vec![Decision::Commit; receipts.len().min(count)])
    }

    /// Replaces the spawn decider.
    pub fn with_spawn_decider<F>(mut self, decider: F) -> Self
    where
        F: FnMut(&CauseChain, &[SpawnRequest]) -> Vec<Decision> + 'static,
    {
        self.spawn_decider = Some(Box::new(decider));
        self
    }

    /// Installs block logic run on every delivered notification.
    pub fn with_reaction<F>(mut self, reaction: F) -> Self
    where
        F: FnMut(&mut PhaseTracker, &NeighborNotification) -> Result<(), PhaseError> + 'static,
    {
        self.reaction = Some(Box::new(reaction));
        self
    }

    /// State at `pos` (air when never written).
    pub fn state_at(&self, world: WorldId, pos: BlockPos) -> BlockState {
        self.states.get(&(world, pos)).copied().unwrap_or(BlockState::AIR)
    }

    /// Tile entity at `pos`.
    pub fn tile_at(&self, world: WorldId, pos: BlockPos) -> Option<&TileEntitySnapshot> {
        self.tiles.get(&(world, pos))
    }

    /// Recorded owner of `pos`.
    pub fn owner_at(&self, world: WorldId, pos: BlockPos) -> Option<ActorRef> {
        self.owners.get(&(world, pos)).copied()
    }

    /// Recorded notifier of `pos`.
    pub fn notifier_at(&self, world: WorldId, pos: BlockPos) -> Option<ActorRef> {
        self.notifiers.get(&(world, pos)).copied()
    }

    /// Every state write, in order.
    pub fn writes(&self) -> &[(WorldId, BlockPos, BlockState)] {
        &self.writes
    }

    /// Spawns that entered the world, in order.
    pub fn spawned(&self) -> &[SpawnRequest] {
        &self.spawned
    }

    /// Every receipt batch fired, in order.
    pub fn fired(&self) -> &[FiredEvent] {
        &self.fired
    }

    /// Every delivered notification, in order.
    pub fn delivered(&self) -> &[DeliveredNotification] {
        &self.delivered
    }
}

/// Block logic that turns a notification at `p` into a placement of `block`
/// at `p` followed by a notification of `p + (1, 0, 0)`, for every `p.x` up to
/// `last_x`.
pub fn chain_reaction(last_x: i32, block: BlockState) -> Reaction {
    Box::new(move |tracker: &mut PhaseTracker, notification: &NeighborNotification| {
        if notification.notify_pos.x > last_x {
            return Ok(());
        }
        let context = tracker.current_mut().ok_or(PhaseError::NoActivePhase)?;
        let at = notification.notify_pos;
        let _ = context.capture_block_change(BlockChange::new(
            notification.world,
            at,
            BlockState::AIR,
            block,
            ChangeKind::Place,
        ))?;
        let _ = context.queue_neighbor_notification(NeighborNotification {
            world: notification.world,
            notify_pos: at.offset(1, 0, 0),
            source_block: block,
            source_pos: at,
        })?;
        Ok(())
    })
}

impl WorldStore for TestHost {
    fn read_state(&self, world: WorldId, pos: BlockPos) -> BlockState {
        self.state_at(world, pos)
    }

    fn write_state(&mut self, world: WorldId, pos: BlockPos, state: BlockState) {
        if state.is_air() {
            self.states.remove(&(world, pos));
        } else {
            self.states.insert((world, pos), state);
        }
        self.writes.push((world, pos, state));
    }

    fn add_tile_entity(&mut self, world: WorldId, pos: BlockPos, snapshot: TileEntitySnapshot) {
        self.tiles.insert((world, pos), snapshot);
    }

    fn remove_tile_entity(&mut self, world: WorldId, pos: BlockPos) -> Option<TileEntitySnapshot> {
        self.tiles.remove(&(world, pos))
    }

    fn spawn(&mut self, request: &SpawnRequest) {
        self.spawned.push(request.clone());
    }
}

impl EventDispatcher for TestHost {
    fn fire(&mut self, cause: &CauseChain, receipts: &[TransactionReceipt]) -> Vec<Decision> {
        let decisions = (self.decider)(cause, receipts);
        self.fired.push(FiredEvent {
            cause: cause.clone(),
            receipts: receipts.to_vec(),
            decisions: decisions.clone(),
        });
        decisions
    }

    fn fire_spawns(&mut self, cause: &CauseChain, requests: &[SpawnRequest]) -> Vec<Decision> {
        match self.spawn_decider.as_mut() {
            Some(decider) => decider(cause, requests),
            None => vec![Decision::Commit; requests.len()],
        }
    }
}

impl PositionTracker for TestHost {
    fn record_owner(&mut self, world: WorldId, pos: BlockPos, actor: ActorRef) {
        self.owners.insert((world, pos), actor);
    }

    fn record_notifier(&mut self, world: WorldId, pos: BlockPos, actor: ActorRef) {
        self.notifiers.insert((world, pos), actor);
    }
}

impl NeighborNotifier for TestHost {
    fn neighbor_changed(
        &mut self,
        tracker: &mut PhaseTracker,
        notification: &NeighborNotification,
    ) -> Result<(), PhaseError> {
        let top = tracker.current();
        self.delivered.push(DeliveredNotification {
            notification: notification.clone(),
            kind: top.map(|c| c.kind()),
            depth: top.map_or(0, |c| c.depth()),
            owner: top.and_then(|c| c.owner()),
            notifier: top.and_then(|c| c.notifier()),
            cause: tracker.cause(),
            writes_seen: self.writes.len(),
        });
        match self.reaction.as_mut() {
            Some(reaction) => reaction(tracker, notification),
            None => Ok(()),
        }
    }
}
