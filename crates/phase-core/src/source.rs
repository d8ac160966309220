// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Phase sources: the object driving an activation.
//!
//! A source is a closed tagged union over the finite set of driver kinds. The
//! typed query [`crate::PhaseContext::source_as`] goes through [`FromSource`]
//! so a caller asking for the wrong variant gets a descriptive error rather
//! than a silent default.
use core::fmt;

use crate::ident::{ActorRef, BlockPos, BlockState, EntityId, PlayerId, WorldId};

/// Discriminant of a [`SourceRef`], used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A ticking block.
    Block,
    /// A ticking fluid.
    Fluid,
    /// An updating entity.
    Entity,
    /// A ticking tile/block entity.
    TileEntity,
    /// A block event being processed.
    BlockEvent,
    /// A ticking player.
    Player,
    /// A world (world tick, dimension tick, weather tick).
    World,
    /// The server itself.
    Server,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Block => "block",
            Self::Fluid => "fluid",
            Self::Entity => "entity",
            Self::TileEntity => "tile-entity",
            Self::BlockEvent => "block-event",
            Self::Player => "player",
            Self::World => "world",
            Self::Server => "server",
        };
        f.write_str(name)
    }
}

/// A block being ticked, or the block emitting a neighbor notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSource {
    /// World the block lives in.
    pub world: WorldId,
    /// Block position.
    pub pos: BlockPos,
    /// Block state at activation time.
    pub state: BlockState,
    /// Owner tracked for this position, if any.
    pub owner: Option<ActorRef>,
    /// Notifier tracked for this position, if any.
    pub notifier: Option<ActorRef>,
}

/// A fluid being ticked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FluidSource {
    /// World the fluid lives in.
    pub world: WorldId,
    /// Fluid position.
    pub pos: BlockPos,
    /// Block state holding the fluid.
    pub state: BlockState,
    /// Whether the holding block is itself a liquid block. Liquid flow applies
    /// immediately and is never batched.
    pub liquid: bool,
}

/// An entity being updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySource {
    /// Entity id.
    pub id: EntityId,
    /// World the entity is in.
    pub world: WorldId,
    /// Block position the entity occupies.
    pub pos: BlockPos,
    /// Block carried by falling-block-like entities.
    pub carried_block: Option<BlockState>,
    /// Actor that created or controls the entity, if tracked.
    pub owner: Option<ActorRef>,
}

/// A tile/block entity being ticked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileEntitySource {
    /// World the tile entity is in.
    pub world: WorldId,
    /// Position of the tile entity.
    pub pos: BlockPos,
    /// Registry name of the tile entity type.
    pub kind: String,
    /// Owner tracked for the tile entity's position, if any.
    pub owner: Option<ActorRef>,
}

/// A queued block event being processed (pistons, note blocks, chests...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEventSource {
    /// World of the block receiving the event.
    pub world: WorldId,
    /// Position of the block receiving the event.
    pub pos: BlockPos,
    /// State of the block receiving the event.
    pub state: BlockState,
    /// Event id as passed to the block.
    pub event_id: i32,
    /// Event parameter as passed to the block.
    pub param: i32,
}

/// A player being ticked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerSource {
    /// Player account id.
    pub id: PlayerId,
    /// Entity embodying the player.
    pub entity: EntityId,
    /// World the player is in.
    pub world: WorldId,
}

/// A world acting as its own source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldSource {
    /// The world.
    pub world: WorldId,
}

/// The server acting as source (server tick).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ServerSource;

/// Handle to the object driving an activation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceRef {
    /// See [`BlockSource`].
    Block(BlockSource),
    /// See [`FluidSource`].
    Fluid(FluidSource),
    /// See [`EntitySource`].
    Entity(EntitySource),
    /// See [`TileEntitySource`].
    TileEntity(TileEntitySource),
    /// See [`BlockEventSource`].
    BlockEvent(BlockEventSource),
    /// See [`PlayerSource`].
    Player(PlayerSource),
    /// See [`WorldSource`].
    World(WorldSource),
    /// See [`ServerSource`].
    Server(ServerSource),
}

impl SourceRef {
    /// Discriminant of this source.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Block(_) => SourceKind::Block,
            Self::Fluid(_) => SourceKind::Fluid,
            Self::Entity(_) => SourceKind::Entity,
            Self::TileEntity(_) => SourceKind::TileEntity,
            Self::BlockEvent(_) => SourceKind::BlockEvent,
            Self::Player(_) => SourceKind::Player,
            Self::World(_) => SourceKind::World,
            Self::Server(_) => SourceKind::Server,
        }
    }

    /// World this source lives in, if it has one.
    pub fn world(&self) -> Option<WorldId> {
        match self {
            Self::Block(s) => Some(s.world),
            Self::Fluid(s) => Some(s.world),
            Self::Entity(s) => Some(s.world),
            Self::TileEntity(s) => Some(s.world),
            Self::BlockEvent(s) => Some(s.world),
            Self::Player(s) => Some(s.world),
            Self::World(s) => Some(s.world),
            Self::Server(_) => None,
        }
    }

    /// Block position of this source, if it has one.
    pub fn position(&self) -> Option<BlockPos> {
        match self {
            Self::Block(s) => Some(s.pos),
            Self::Fluid(s) => Some(s.pos),
            Self::Entity(s) => Some(s.pos),
            Self::TileEntity(s) => Some(s.pos),
            Self::BlockEvent(s) => Some(s.pos),
            Self::Player(_) | Self::World(_) | Self::Server(_) => None,
        }
    }

    /// The source itself viewed as an actor, for kinds that can act.
    pub fn as_actor(&self) -> Option<ActorRef> {
        match self {
            Self::Block(s) => Some(ActorRef::Block(s.world, s.pos)),
            Self::Entity(s) => Some(ActorRef::Entity(s.id)),
            Self::TileEntity(s) => Some(ActorRef::TileEntity(s.world, s.pos)),
            Self::Player(s) => Some(ActorRef::Player(s.id)),
            Self::Fluid(_) | Self::BlockEvent(_) | Self::World(_) | Self::Server(_) => None,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block(s) => write!(f, "block {} at {}@{}", s.state, s.world, s.pos),
            Self::Fluid(s) => write!(
                f,
                "fluid {} at {}@{}{}",
                s.state,
                s.world,
                s.pos,
                if s.liquid { " (liquid)" } else { "" }
            ),
            Self::Entity(s) => write!(f, "entity {} at {}@{}", s.id.0, s.world, s.pos),
            Self::TileEntity(s) => write!(f, "tile-entity {} at {}@{}", s.kind, s.world, s.pos),
            Self::BlockEvent(s) => write!(
                f,
                "block-event {}/{} on {} at {}@{}",
                s.event_id, s.param, s.state, s.world, s.pos
            ),
            Self::Player(s) => write!(f, "player {:032x} in {}", s.id.0, s.world),
            Self::World(s) => write!(f, "{}", s.world),
            Self::Server(_) => f.write_str("server"),
        }
    }
}

/// Typed view into a [`SourceRef`] variant.
pub trait FromSource: Sized {
    /// Variant this type corresponds to.
    const KIND: SourceKind;

    /// Borrows the payload when `source` is the matching variant.
    fn from_source(source: &SourceRef) -> Option<&Self>;
}

macro_rules! impl_from_source {
    ($ty:ty, $variant:ident) => {
        impl FromSource for $ty {
            const KIND: SourceKind = SourceKind::$variant;

            fn from_source(source: &SourceRef) -> Option<&Self> {
                match source {
                    SourceRef::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for SourceRef {
            fn from(value: $ty) -> Self {
                SourceRef::$variant(value)
            }
        }
    };
}

impl_from_source!(BlockSource, Block);
impl_from_source!(FluidSource, Fluid);
impl_from_source!(EntitySource, Entity);
impl_from_source!(TileEntitySource, TileEntity);
impl_from_source!(BlockEventSource, BlockEvent);
impl_from_source!(PlayerSource, Player);
impl_from_source!(WorldSource, World);
impl_from_source!(ServerSource, Server);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_view_matches_only_its_variant() {
        let source: SourceRef = WorldSource { world: WorldId(3) }.into();
        assert_eq!(
            WorldSource::from_source(&source).map(|s| s.world),
            Some(WorldId(3))
        );
        assert!(BlockSource::from_source(&source).is_none());
        assert_eq!(source.kind(), WorldSource::KIND);
    }

    #[test]
    fn tile_entity_source_acts_as_itself() {
        let pos = BlockPos::new(1, 2, 3);
        let source: SourceRef = TileEntitySource {
            world: WorldId(0),
            pos,
            kind: "hopper".into(),
            owner: None,
        }
        .into();
        assert_eq!(source.as_actor(), Some(ActorRef::TileEntity(WorldId(0), pos)));
        assert_eq!(source.position(), Some(pos));
    }
}
