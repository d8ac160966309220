// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Terse constructors for sources, positions and block changes.

use phase_core::{
    ActorRef, BlockChange, BlockPos, BlockSource, BlockState, ChangeKind, EntityId, EntitySource,
    TileEntitySource, WorldId, WorldSource,
};

/// The world most tests run in.
pub const W0: WorldId = WorldId(0);

/// Shorthand for [`BlockPos::new`].
pub const fn pos(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

/// Shorthand for [`BlockState::from_raw`].
pub const fn state(raw: u32) -> BlockState {
    BlockState::from_raw(raw)
}

/// A placement of `new` over air at `at` in [`W0`].
pub fn place(at: BlockPos, new: BlockState) -> BlockChange {
    BlockChange::new(W0, at, BlockState::AIR, new, ChangeKind::Place)
}

/// An untracked block source in [`W0`].
pub fn block_source(at: BlockPos, block: BlockState) -> BlockSource {
    BlockSource {
        world: W0,
        pos: at,
        state: block,
        owner: None,
        notifier: None,
    }
}

/// An entity source in [`W0`] with an optional tracked owner.
pub fn entity_source(id: u64, owner: Option<ActorRef>) -> EntitySource {
    EntitySource {
        id: EntityId(id),
        world: W0,
        pos: pos(0, 64, 0),
        carried_block: None,
        owner,
    }
}

/// A tile entity source of kind `kind` at `at` in [`W0`].
pub fn tile_entity_source(at: BlockPos, kind: &str) -> TileEntitySource {
    TileEntitySource {
        world: W0,
        pos: at,
        kind: kind.to_owned(),
        owner: None,
    }
}

/// Source for ticking [`W0`].
pub const fn world_source() -> WorldSource {
    WorldSource { world: W0 }
}
