// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cause frames: who is acting, pushed and popped with phase activations.
//!
//! Each activation contributes exactly one [`CauseFrame`] to the tracker's
//! [`CauseStack`]. A frame holds ordered cause entries plus `(key, value)`
//! context annotations. Flattening the stack yields a [`CauseChain`] with the
//! most specific cause first, which is what the event collaborator receives.
use core::fmt;

use crate::ident::{ActorRef, BlockPos, BlockState, WorldId};

/// One entry in a cause frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cause {
    /// A player, entity, tile entity or block acting directly.
    Actor(ActorRef),
    /// A block identified together with its state at the time it acted.
    Block {
        /// World of the block.
        world: WorldId,
        /// Position of the block.
        pos: BlockPos,
        /// State of the block when the frame was built.
        state: BlockState,
    },
    /// The block carried by a falling-block-like entity.
    CarriedBlock(BlockState),
    /// A block event being processed.
    BlockEvent {
        /// World of the receiving block.
        world: WorldId,
        /// Position of the receiving block.
        pos: BlockPos,
        /// Event id.
        event_id: i32,
        /// Event parameter.
        param: i32,
    },
    /// A ticking fluid.
    Fluid {
        /// World of the fluid.
        world: WorldId,
        /// Position of the fluid.
        pos: BlockPos,
    },
    /// A world acting on itself.
    World(WorldId),
    /// The server.
    Server,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actor(actor) => write!(f, "{actor}"),
            Self::Block { world, pos, state } => write!(f, "block {state} at {world}@{pos}"),
            Self::CarriedBlock(state) => write!(f, "carried {state}"),
            Self::BlockEvent {
                world,
                pos,
                event_id,
                param,
            } => write!(f, "block-event {event_id}/{param} at {world}@{pos}"),
            Self::Fluid { world, pos } => write!(f, "fluid at {world}@{pos}"),
            Self::World(world) => write!(f, "{world}"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Keys of the context annotations a frame may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Responsible actor for mutations in this frame.
    Owner,
    /// Immediate trigger for mutations in this frame.
    Notifier,
    /// World being ticked.
    World,
    /// Marks a frame processing a block event.
    BlockEventProcess,
    /// Position whose change triggered a neighbor notification.
    NeighborNotifySource,
    /// Marks a weather tick frame.
    Weather,
    /// Nesting depth of the activation that built the frame.
    Depth,
}

/// Values attached to a [`ContextKey`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextValue {
    /// An actor.
    Actor(ActorRef),
    /// A world.
    World(WorldId),
    /// A location.
    Location(WorldId, BlockPos),
    /// A presence marker.
    Flag,
    /// A depth counter.
    Depth(u32),
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actor(actor) => write!(f, "{actor}"),
            Self::World(world) => write!(f, "{world}"),
            Self::Location(world, pos) => write!(f, "{world}@{pos}"),
            Self::Flag => f.write_str("set"),
            Self::Depth(depth) => write!(f, "{depth}"),
        }
    }
}

/// The cause contribution of one phase activation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CauseFrame {
    causes: Vec<Cause>,
    context: Vec<(ContextKey, ContextValue)>,
}

impl CauseFrame {
    /// Creates an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a cause; later pushes are more specific.
    pub fn push_cause(&mut self, cause: Cause) {
        self.causes.push(cause);
    }

    /// Sets a context annotation, replacing an earlier value for the same key
    /// in this frame.
    pub fn add_context(&mut self, key: ContextKey, value: ContextValue) {
        if let Some(slot) = self.context.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.context.push((key, value));
        }
    }

    /// Causes in push order (least specific first).
    pub fn causes(&self) -> &[Cause] {
        &self.causes
    }

    /// Context annotations in insertion order.
    pub fn context(&self) -> &[(ContextKey, ContextValue)] {
        &self.context
    }

    /// Looks up a context annotation of this frame only.
    pub fn context_value(&self, key: ContextKey) -> Option<&ContextValue> {
        self.context
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(v))
    }
}

/// Stack of cause frames, one per active (or unwinding) activation.
#[derive(Debug, Default)]
pub struct CauseStack {
    frames: Vec<CauseFrame>,
}

impl CauseStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames currently pushed.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frame is pushed.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Pushes a frame.
    pub fn push_frame(&mut self, frame: CauseFrame) {
        self.frames.push(frame);
    }

    /// Pops the innermost frame.
    pub fn pop_frame(&mut self) -> Option<CauseFrame> {
        self.frames.pop()
    }

    /// Frames from outermost to innermost.
    pub fn frames(&self) -> &[CauseFrame] {
        &self.frames
    }

    /// Flattens the stack into a chain with the most specific cause first.
    ///
    /// Context annotations from inner frames shadow outer ones for the same key.
    pub fn current(&self) -> CauseChain {
        let mut causes = Vec::new();
        let mut context: Vec<(ContextKey, ContextValue)> = Vec::new();
        for frame in self.frames.iter().rev() {
            causes.extend(frame.causes.iter().rev().cloned());
            for (key, value) in &frame.context {
                if !context.iter().any(|(k, _)| k == key) {
                    context.push((*key, value.clone()));
                }
            }
        }
        CauseChain { causes, context }
    }
}

/// Flattened, owned view of the cause stack at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CauseChain {
    causes: Vec<Cause>,
    context: Vec<(ContextKey, ContextValue)>,
}

impl CauseChain {
    /// Causes, most specific first.
    pub fn causes(&self) -> &[Cause] {
        &self.causes
    }

    /// The most specific cause.
    pub fn root(&self) -> Option<&Cause> {
        self.causes.first()
    }

    /// True when `cause` appears anywhere in the chain.
    pub fn contains(&self, cause: &Cause) -> bool {
        self.causes.contains(cause)
    }

    /// The innermost actor cause.
    pub fn first_actor(&self) -> Option<ActorRef> {
        self.causes.iter().find_map(|c| match c {
            Cause::Actor(actor) => Some(*actor),
            _ => None,
        })
    }

    /// Innermost value annotated for `key`.
    pub fn context(&self, key: ContextKey) -> Option<&ContextValue> {
        self.context
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(v))
    }
}

impl fmt::Display for CauseChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, cause) in self.causes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{cause}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::EntityId;

    #[test]
    fn chain_is_most_specific_first_and_inner_context_wins() {
        let mut outer = CauseFrame::new();
        outer.push_cause(Cause::World(WorldId(0)));
        outer.push_cause(Cause::Actor(ActorRef::Entity(EntityId(1))));
        outer.add_context(ContextKey::Depth, ContextValue::Depth(1));

        let mut inner = CauseFrame::new();
        inner.push_cause(Cause::Server);
        inner.add_context(ContextKey::Depth, ContextValue::Depth(2));

        let mut stack = CauseStack::new();
        stack.push_frame(outer);
        stack.push_frame(inner);

        let chain = stack.current();
        assert_eq!(
            chain.causes(),
            &[
                Cause::Server,
                Cause::Actor(ActorRef::Entity(EntityId(1))),
                Cause::World(WorldId(0)),
            ]
        );
        assert_eq!(chain.context(ContextKey::Depth), Some(&ContextValue::Depth(2)));
        assert_eq!(chain.first_actor(), Some(ActorRef::Entity(EntityId(1))));
    }

    #[test]
    fn add_context_replaces_within_frame() {
        let mut frame = CauseFrame::new();
        frame.add_context(ContextKey::World, ContextValue::World(WorldId(1)));
        frame.add_context(ContextKey::World, ContextValue::World(WorldId(2)));
        assert_eq!(frame.context().len(), 1);
        assert_eq!(
            frame.context_value(ContextKey::World),
            Some(&ContextValue::World(WorldId(2)))
        );
    }
}
