// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Phase kinds and their behaviour table.
//!
//! [`PhaseKind`] is closed. Each kind maps to one static [`PhaseState`]
//! descriptor that supplies capture-policy defaults, source refinement,
//! attribution rules, the ordered cause-frame modifiers and the unwind
//! strategy.
use core::fmt;

use crate::activation::ActivationId;
use crate::capture::CapturePolicy;
use crate::cause::{Cause, CauseChain, CauseFrame, ContextKey, ContextValue};
use crate::context::PhaseContext;
use crate::host::PhaseHost;
use crate::ident::ActorRef;
use crate::source::SourceRef;
use crate::unwind::Unwind;

/// Kinds of simulation scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseKind {
    /// A world ticking its scheduled and random updates.
    WorldTick,
    /// A single block tick.
    BlockTick,
    /// A single fluid tick.
    FluidTick,
    /// An entity update.
    EntityTick,
    /// A tile/block entity tick.
    TileEntityTick,
    /// Processing one queued block event.
    BlockEventTick,
    /// Delivering a neighbor-changed notification.
    NeighborNotification,
    /// Dimension bookkeeping (never captures).
    DimensionTick,
    /// A player update.
    PlayerTick,
    /// Weather and lightning for a world.
    WeatherTick,
    /// The server's outer tick (never captures).
    ServerTick,
}

impl PhaseKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::WorldTick,
        Self::BlockTick,
        Self::FluidTick,
        Self::EntityTick,
        Self::TileEntityTick,
        Self::BlockEventTick,
        Self::NeighborNotification,
        Self::DimensionTick,
        Self::PlayerTick,
        Self::WeatherTick,
        Self::ServerTick,
    ];

    /// The behaviour descriptor of this kind.
    pub fn state(self) -> &'static PhaseState {
        match self {
            Self::WorldTick => &WORLD_TICK,
            Self::BlockTick => &BLOCK_TICK,
            Self::FluidTick => &FLUID_TICK,
            Self::EntityTick => &ENTITY_TICK,
            Self::TileEntityTick => &TILE_ENTITY_TICK,
            Self::BlockEventTick => &BLOCK_EVENT_TICK,
            Self::NeighborNotification => &NEIGHBOR_NOTIFICATION,
            Self::DimensionTick => &DIMENSION_TICK,
            Self::PlayerTick => &PLAYER_TICK,
            Self::WeatherTick => &WEATHER_TICK,
            Self::ServerTick => &SERVER_TICK,
        }
    }

    /// Stable lowercase name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::WorldTick => "world-tick",
            Self::BlockTick => "block-tick",
            Self::FluidTick => "fluid-tick",
            Self::EntityTick => "entity-tick",
            Self::TileEntityTick => "tile-entity-tick",
            Self::BlockEventTick => "block-event-tick",
            Self::NeighborNotification => "neighbor-notification",
            Self::DimensionTick => "dimension-tick",
            Self::PlayerTick => "player-tick",
            Self::WeatherTick => "weather-tick",
            Self::ServerTick => "server-tick",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Adds one layer of annotations to an activation's cause frame.
pub type FrameModifier = fn(&mut CauseFrame, &PhaseContext);

/// Narrows a kind's default policy for a particular source.
pub type PolicyRefiner = fn(&mut CapturePolicy, &SourceRef);

/// How an activation is finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnwindStrategy {
    /// Run the commit/rollback protocol over the captures.
    Transactional,
    /// Nothing is ever captured; unwinding is a no-op.
    NoCapture,
}

/// Behaviour descriptor for one [`PhaseKind`].
#[derive(Debug)]
pub struct PhaseState {
    kind: PhaseKind,
    defaults: CapturePolicy,
    reentrant: bool,
    modifiers: &'static [FrameModifier],
    refine: PolicyRefiner,
    strategy: UnwindStrategy,
}

impl PhaseState {
    /// Kind this descriptor belongs to.
    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// Capture policy before source refinement.
    pub fn default_policy(&self) -> CapturePolicy {
        self.defaults
    }

    /// Whether entering this kind while it is already active is legal.
    pub fn is_reentrant(&self) -> bool {
        self.reentrant
    }

    /// Unwind strategy.
    pub fn strategy(&self) -> UnwindStrategy {
        self.strategy
    }

    /// Frame modifiers in application order (parent first, most specific last).
    pub fn modifiers(&self) -> &'static [FrameModifier] {
        self.modifiers
    }

    /// Primes a pooled or fresh context with this kind's defaults.
    pub(crate) fn create_context(&self, context: &mut PhaseContext, id: ActivationId, depth: u32) {
        context.prime(id, self.kind, depth, self.defaults);
    }

    /// Narrows `policy` for `source`.
    pub fn refine_policy(&self, policy: &mut CapturePolicy, source: &SourceRef) {
        (self.refine)(policy, source);
    }

    /// Owner and notifier for a new activation.
    ///
    /// An owner tracked on the source wins; players, entities and tile entities
    /// otherwise act as their own owner; everything else inherits the enclosing
    /// activation's attribution.
    pub fn attribution(
        &self,
        source: &SourceRef,
        inherited_owner: Option<ActorRef>,
        inherited_notifier: Option<ActorRef>,
    ) -> (Option<ActorRef>, Option<ActorRef>) {
        let (tracked_owner, tracked_notifier) = match source {
            SourceRef::Block(s) => (s.owner, s.notifier),
            SourceRef::Entity(s) => (s.owner, None),
            SourceRef::TileEntity(s) => (s.owner, None),
            _ => (None, None),
        };
        let self_owner = match source {
            SourceRef::Player(_) | SourceRef::Entity(_) | SourceRef::TileEntity(_) => source.as_actor(),
            _ => None,
        };
        (
            tracked_owner.or(self_owner).or(inherited_owner),
            tracked_notifier.or(inherited_notifier),
        )
    }

    /// Builds the activation's cause frame by applying every modifier in order.
    pub fn build_frame(&self, context: &PhaseContext) -> CauseFrame {
        let mut frame = CauseFrame::new();
        for modifier in self.modifiers {
            modifier(&mut frame, context);
        }
        frame
    }

    /// Starts finalizing `context`, which has just left the stack: decides its
    /// captures and plans the commit pass.
    pub(crate) fn begin_unwind<H: PhaseHost + ?Sized>(
        &self,
        context: PhaseContext,
        base: usize,
        cause: CauseChain,
        host: &mut H,
    ) -> Unwind {
        match self.strategy {
            UnwindStrategy::NoCapture => {
                debug_assert!(
                    context.captures().is_empty(),
                    "{} captured despite a no-capture policy",
                    self.kind
                );
                Unwind::settled(context, base)
            }
            UnwindStrategy::Transactional => Unwind::transactional(context, base, cause, host),
        }
    }
}

// ── Frame modifiers ─────────────────────────────────────────────────────

fn annotate_activation(frame: &mut CauseFrame, ctx: &PhaseContext) {
    frame.add_context(ContextKey::Depth, ContextValue::Depth(ctx.depth()));
    if let Some(owner) = ctx.owner() {
        frame.add_context(ContextKey::Owner, ContextValue::Actor(owner));
    }
    if let Some(notifier) = ctx.notifier() {
        frame.add_context(ContextKey::Notifier, ContextValue::Actor(notifier));
    }
}

fn annotate_world(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(world) = ctx.source().and_then(SourceRef::world) {
        frame.add_context(ContextKey::World, ContextValue::World(world));
    }
}

fn push_source_actor(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(actor) = ctx.source().and_then(SourceRef::as_actor) {
        frame.push_cause(Cause::Actor(actor));
    }
}

fn push_world(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(world) = ctx.source().and_then(SourceRef::world) {
        frame.push_cause(Cause::World(world));
    }
}

fn push_block(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(SourceRef::Block(s)) = ctx.source() {
        frame.push_cause(Cause::Block {
            world: s.world,
            pos: s.pos,
            state: s.state,
        });
    }
}

fn push_fluid(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(SourceRef::Fluid(s)) = ctx.source() {
        frame.push_cause(Cause::Fluid {
            world: s.world,
            pos: s.pos,
        });
    }
}

// Falling-block-like entities also act as the block they carry.
fn push_carried_block(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(SourceRef::Entity(s)) = ctx.source() {
        if let Some(state) = s.carried_block {
            frame.push_cause(Cause::CarriedBlock(state));
        }
    }
}

fn push_block_event(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(SourceRef::BlockEvent(s)) = ctx.source() {
        frame.push_cause(Cause::Block {
            world: s.world,
            pos: s.pos,
            state: s.state,
        });
        frame.push_cause(Cause::BlockEvent {
            world: s.world,
            pos: s.pos,
            event_id: s.event_id,
            param: s.param,
        });
        frame.add_context(ContextKey::BlockEventProcess, ContextValue::Flag);
    }
}

fn push_notifying_block(frame: &mut CauseFrame, ctx: &PhaseContext) {
    if let Some(SourceRef::Block(s)) = ctx.source() {
        frame.push_cause(Cause::Block {
            world: s.world,
            pos: s.pos,
            state: s.state,
        });
        frame.add_context(
            ContextKey::NeighborNotifySource,
            ContextValue::Location(s.world, s.pos),
        );
    }
}

fn mark_weather(frame: &mut CauseFrame, _ctx: &PhaseContext) {
    frame.add_context(ContextKey::Weather, ContextValue::Flag);
}

fn push_server(frame: &mut CauseFrame, _ctx: &PhaseContext) {
    frame.push_cause(Cause::Server);
}

// ── Policy refiners ─────────────────────────────────────────────────────

fn keep_defaults(_policy: &mut CapturePolicy, _source: &SourceRef) {}

fn liquid_flows_immediately(policy: &mut CapturePolicy, source: &SourceRef) {
    if let SourceRef::Fluid(fluid) = source {
        if fluid.liquid {
            policy.blocks = false;
        }
    }
}

// ── Behaviour table ─────────────────────────────────────────────────────

const TICKING: CapturePolicy = CapturePolicy::ALL;

static WORLD_TICK: PhaseState = PhaseState {
    kind: PhaseKind::WorldTick,
    defaults: TICKING,
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_world],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static BLOCK_TICK: PhaseState = PhaseState {
    kind: PhaseKind::BlockTick,
    defaults: TICKING,
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_block],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static FLUID_TICK: PhaseState = PhaseState {
    kind: PhaseKind::FluidTick,
    defaults: TICKING,
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_fluid],
    refine: liquid_flows_immediately,
    strategy: UnwindStrategy::Transactional,
};

static ENTITY_TICK: PhaseState = PhaseState {
    kind: PhaseKind::EntityTick,
    defaults: TICKING,
    reentrant: false,
    modifiers: &[
        annotate_activation,
        annotate_world,
        push_source_actor,
        push_carried_block,
    ],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static TILE_ENTITY_TICK: PhaseState = PhaseState {
    kind: PhaseKind::TileEntityTick,
    defaults: TICKING,
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_source_actor],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static BLOCK_EVENT_TICK: PhaseState = PhaseState {
    kind: PhaseKind::BlockEventTick,
    defaults: TICKING,
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_block_event],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static NEIGHBOR_NOTIFICATION: PhaseState = PhaseState {
    kind: PhaseKind::NeighborNotification,
    defaults: TICKING,
    reentrant: true,
    modifiers: &[annotate_activation, annotate_world, push_notifying_block],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static DIMENSION_TICK: PhaseState = PhaseState {
    kind: PhaseKind::DimensionTick,
    defaults: CapturePolicy::NONE,
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_world],
    refine: keep_defaults,
    strategy: UnwindStrategy::NoCapture,
};

static PLAYER_TICK: PhaseState = PhaseState {
    kind: PhaseKind::PlayerTick,
    defaults: TICKING,
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_source_actor],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static WEATHER_TICK: PhaseState = PhaseState {
    kind: PhaseKind::WeatherTick,
    defaults: CapturePolicy {
        blocks: true,
        entities: true,
        drops: false,
        block_events: false,
    },
    reentrant: false,
    modifiers: &[annotate_activation, annotate_world, push_world, mark_weather],
    refine: keep_defaults,
    strategy: UnwindStrategy::Transactional,
};

static SERVER_TICK: PhaseState = PhaseState {
    kind: PhaseKind::ServerTick,
    defaults: CapturePolicy::NONE,
    reentrant: false,
    modifiers: &[annotate_activation, push_server],
    refine: keep_defaults,
    strategy: UnwindStrategy::NoCapture,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{BlockPos, BlockState, EntityId, WorldId};
    use crate::source::{EntitySource, FluidSource};

    #[test]
    fn table_is_consistent_with_kinds() {
        for kind in PhaseKind::ALL {
            assert_eq!(kind.state().kind(), kind);
            let no_capture = kind.state().strategy() == UnwindStrategy::NoCapture;
            assert_eq!(no_capture, kind.state().default_policy().captures_nothing(), "{kind}");
        }
    }

    #[test]
    fn only_neighbor_notifications_are_reentrant() {
        for kind in PhaseKind::ALL {
            assert_eq!(
                kind.state().is_reentrant(),
                kind == PhaseKind::NeighborNotification,
                "{kind}"
            );
        }
    }

    #[test]
    fn liquid_fluid_ticks_do_not_batch_blocks() {
        let state = PhaseKind::FluidTick.state();
        let fluid = |liquid| {
            SourceRef::Fluid(FluidSource {
                world: WorldId(0),
                pos: BlockPos::new(0, 0, 0),
                state: BlockState::from_raw(8),
                liquid,
            })
        };
        let mut policy = state.default_policy();
        state.refine_policy(&mut policy, &fluid(true));
        assert!(!policy.blocks);

        let mut policy = state.default_policy();
        state.refine_policy(&mut policy, &fluid(false));
        assert!(policy.blocks);
    }

    #[test]
    fn falling_block_frame_pushes_entity_then_carried_block() {
        let state = PhaseKind::EntityTick.state();
        let mut ctx = PhaseContext::blank();
        state.create_context(&mut ctx, ActivationId::from_raw(1), 1);
        ctx.with_source(SourceRef::Entity(EntitySource {
            id: EntityId(5),
            world: WorldId(0),
            pos: BlockPos::new(0, 70, 0),
            carried_block: Some(BlockState::from_raw(12)),
            owner: None,
        }));
        let frame = state.build_frame(&ctx);
        assert_eq!(
            frame.causes(),
            &[
                Cause::Actor(ActorRef::Entity(EntityId(5))),
                Cause::CarriedBlock(BlockState::from_raw(12)),
            ]
        );
        assert_eq!(
            frame.context_value(ContextKey::World),
            Some(&ContextValue::World(WorldId(0)))
        );
    }

    #[test]
    fn tracked_owner_beats_self_and_inherited() {
        let state = PhaseKind::EntityTick.state();
        let player = ActorRef::Player(crate::ident::PlayerId(9));
        let inherited = ActorRef::Block(WorldId(0), BlockPos::default());
        let mut source = EntitySource {
            id: EntityId(5),
            world: WorldId(0),
            pos: BlockPos::default(),
            carried_block: None,
            owner: Some(player),
        };
        let (owner, _) = state.attribution(&SourceRef::Entity(source.clone()), Some(inherited), None);
        assert_eq!(owner, Some(player));

        source.owner = None;
        let (owner, _) = state.attribution(&SourceRef::Entity(source), Some(inherited), None);
        assert_eq!(owner, Some(ActorRef::Entity(EntityId(5))));
    }
}
