// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Capture buffers: per-activation accumulators of would-be mutations.
use core::fmt;

use crate::ident::{BlockPos, BlockState, EntityId, TileEntitySnapshot, WorldId};
use crate::log::TransactionLog;

/// What a block mutation does to its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeKind {
    /// A block is placed.
    Place,
    /// A block is broken.
    Break,
    /// A block changes state in place.
    Modify,
    /// A block decays (leaves, ice...).
    Decay,
    /// A block grows (crops, saplings...).
    Grow,
}

impl ChangeKind {
    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Place => 1,
            Self::Break => 2,
            Self::Modify => 3,
            Self::Decay => 4,
            Self::Grow => 5,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Place => "place",
            Self::Break => "break",
            Self::Modify => "modify",
            Self::Decay => "decay",
            Self::Grow => "grow",
        };
        f.write_str(name)
    }
}

/// A block mutation as requested by simulated logic.
///
/// `tile_added` / `tile_removed` describe structural tile-entity changes that
/// accompany the state change; they are applied only if the change commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockChange {
    /// World of the mutated position.
    pub world: WorldId,
    /// Mutated position.
    pub pos: BlockPos,
    /// State before the mutation.
    pub old_state: BlockState,
    /// State after the mutation.
    pub new_state: BlockState,
    /// Kind of mutation.
    pub kind: ChangeKind,
    /// Tile entity created by this mutation.
    pub tile_added: Option<TileEntitySnapshot>,
    /// Tile entity destroyed by this mutation (its last known contents).
    pub tile_removed: Option<TileEntitySnapshot>,
}

impl BlockChange {
    /// A plain state change without tile-entity side effects.
    pub fn new(
        world: WorldId,
        pos: BlockPos,
        old_state: BlockState,
        new_state: BlockState,
        kind: ChangeKind,
    ) -> Self {
        Self {
            world,
            pos,
            old_state,
            new_state,
            kind,
            tile_added: None,
            tile_removed: None,
        }
    }

    /// Records that the mutation creates a tile entity.
    pub fn with_tile_added(mut self, snapshot: TileEntitySnapshot) -> Self {
        self.tile_added = Some(snapshot);
        self
    }

    /// Records that the mutation destroys a tile entity.
    pub fn with_tile_removed(mut self, snapshot: TileEntitySnapshot) -> Self {
        self.tile_removed = Some(snapshot);
        self
    }
}

/// A neighbor notification deferred until the mutation that caused it commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborNotification {
    /// World of both positions.
    pub world: WorldId,
    /// Position being told that its neighbour changed.
    pub notify_pos: BlockPos,
    /// Block that changed.
    pub source_block: BlockState,
    /// Position that changed.
    pub source_pos: BlockPos,
}

/// Why an entity or item is entering the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnCause {
    /// Natural or scheduled spawning.
    Natural,
    /// Placed by an actor (spawn egg, armor stand...).
    Placement,
    /// Produced by breaking a block.
    BlockBreak,
    /// Dropped from an inventory.
    Dropped,
    /// Launched as a projectile.
    Projectile,
    /// Emitted by a dispenser-like block.
    Dispense,
}

/// An item stack being dropped into the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemStack {
    /// Registry name of the item.
    pub kind: String,
    /// Stack size.
    pub count: u32,
}

/// The subject of a spawn request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Spawnable {
    /// A fully constructed entity waiting to be added.
    Entity {
        /// Pre-assigned entity id.
        id: EntityId,
        /// Registry name of the entity type.
        kind: String,
        /// Target world.
        world: WorldId,
        /// Spawn position.
        pos: BlockPos,
    },
    /// An item stack to drop as an item entity.
    Item {
        /// Target world.
        world: WorldId,
        /// Drop position.
        pos: BlockPos,
        /// Dropped stack.
        stack: ItemStack,
    },
}

impl Spawnable {
    /// True for item drops.
    pub fn is_item(&self) -> bool {
        matches!(self, Self::Item { .. })
    }
}

/// A captured entity spawn or item drop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnRequest {
    /// What enters the world.
    pub subject: Spawnable,
    /// Why it enters the world.
    pub cause: SpawnCause,
}

/// Capture permissions of one activation.
///
/// Resolved at creation from the kind's defaults and refined by the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CapturePolicy {
    /// Block changes (and their neighbor notifications) are batched.
    pub blocks: bool,
    /// Entity spawns are batched.
    pub entities: bool,
    /// Item drops are batched.
    pub drops: bool,
    /// Block-event sub-activations may be opened from this activation.
    pub block_events: bool,
}

impl CapturePolicy {
    /// Policy that captures nothing and forbids block events.
    pub const NONE: Self = Self {
        blocks: false,
        entities: false,
        drops: false,
        block_events: false,
    };

    /// Policy that captures everything and allows block events.
    pub const ALL: Self = Self {
        blocks: true,
        entities: true,
        drops: true,
        block_events: true,
    };

    /// True when nothing at all is batched.
    pub fn captures_nothing(&self) -> bool {
        !(self.blocks || self.entities || self.drops)
    }
}

/// Result of offering a mutation to the current activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a bypassed mutation must be applied immediately by the caller"]
pub enum CaptureResult {
    /// The mutation was recorded and will be decided at unwind.
    Captured,
    /// The activation does not batch this kind of mutation; the caller applies
    /// it immediately.
    Bypassed,
}

/// All captures of one activation.
#[derive(Debug, Default)]
pub struct CaptureBuffers {
    pub(crate) log: TransactionLog,
    pub(crate) spawns: Vec<SpawnRequest>,
}

impl CaptureBuffers {
    /// The ordered transaction log (block mutations, tile entities,
    /// notifications).
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Captured spawn and drop requests in capture order.
    pub fn spawns(&self) -> &[SpawnRequest] {
        &self.spawns
    }

    /// True when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty() && self.spawns.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.log.clear();
        self.spawns.clear();
    }
}
