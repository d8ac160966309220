// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and world-value types shared by every phase component.
use core::fmt;

use bytes::Bytes;

/// Canonical 256-bit digest used for receipt outcome digests.
pub type Hash = [u8; 32];

/// Identifier for one simulated world (dimension).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// Integer block coordinate inside a world.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockPos {
    /// East/west axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// North/south axis.
    pub z: i32,
}

impl BlockPos {
    /// Constructs a position from its three coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position shifted by the given deltas (wrapping at the
    /// integer boundary).
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }

    /// The six face-adjacent neighbours in canonical order
    /// (down, up, north, south, west, east).
    #[must_use]
    pub const fn neighbors(self) -> [Self; 6] {
        [
            self.offset(0, -1, 0),
            self.offset(0, 1, 0),
            self.offset(0, 0, -1),
            self.offset(0, 0, 1),
            self.offset(-1, 0, 0),
            self.offset(1, 0, 0),
        ]
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Opaque block state value as stored by the world.
///
/// The core never interprets the raw id beyond equality; it only moves values
/// between the capture buffers and world storage, so a receipt carries the
/// exact prior value.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockState(u32);

impl BlockState {
    /// The empty (air) state. Raw id zero.
    pub const AIR: Self = Self(0);

    /// Wraps a raw state id.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw state id.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for the empty state.
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state:{}", self.0)
    }
}

/// Identifier for a simulated entity.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(pub u64);

/// Identifier for a connected player (account-level, stable across sessions).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlayerId(pub u128);

/// An actor that can be held responsible for (owner) or be the immediate
/// trigger of (notifier) a world mutation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActorRef {
    /// A player account.
    Player(PlayerId),
    /// A live entity.
    Entity(EntityId),
    /// A tile/block entity, addressed by its location.
    TileEntity(WorldId, BlockPos),
    /// A plain block, addressed by its location.
    Block(WorldId, BlockPos),
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player:{:032x}", id.0),
            Self::Entity(id) => write!(f, "entity:{}", id.0),
            Self::TileEntity(world, pos) => write!(f, "tile-entity:{world}@{pos}"),
            Self::Block(world, pos) => write!(f, "block:{world}@{pos}"),
        }
    }
}

/// Last known contents of a tile/block entity.
///
/// Carried on receipts so event handlers can inspect what a mutation adds or
/// removes. The payload bytes are opaque to the core.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileEntitySnapshot {
    /// Registry name of the tile entity type (e.g. `furnace`).
    pub kind: String,
    /// Serialized tile entity data.
    pub data: Bytes,
}

impl TileEntitySnapshot {
    /// Builds a snapshot from a type name and serialized payload.
    pub fn new(kind: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
        }
    }
}
