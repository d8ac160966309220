// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! phase-core: scoped, transactional phase tracking for a block-world
//! simulation tick.
//!
//! A [`PhaseTracker`] keeps a stack of typed activations ([`PhaseKind`]). While
//! an activation is on top it captures block mutations, neighbor notifications
//! and spawns into an ordered [`TransactionLog`]. Completing the activation
//! asks the host's [`EventDispatcher`] to decide every captured mutation under
//! the current [`CauseChain`], discards the rejected ones (they never reached
//! the world) and commits the rest in capture order, replaying each mutation's deferred
//! notifications as nested activations.
//!
//! The tracker owns no world state; everything it touches goes through the
//! [`PhaseHost`] ports.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod activation;
mod capture;
mod cause;
mod config;
mod constants;
mod context;
mod dump;
mod error;
mod host;
mod ident;
mod log;
mod receipt;
mod source;
mod state;
mod tracker;
mod unwind;

/// Activation identifiers and completion handles.
pub use activation::{ActivationId, ContextHandle};
/// Capture inputs, policies and buffers.
pub use capture::{
    BlockChange, CaptureBuffers, CapturePolicy, CaptureResult, ChangeKind, ItemStack,
    NeighborNotification, SpawnCause, SpawnRequest, Spawnable,
};
/// Causes, cause frames and flattened chains.
pub use cause::{Cause, CauseChain, CauseFrame, CauseStack, ContextKey, ContextValue};
/// Tracker configuration.
pub use config::TrackerConfig;
/// Defaults and canonical digests.
pub use constants::{digest_len0_u64, DEFAULT_MAX_DEPTH, RECEIPT_DIGEST_VERSION};
/// Activation records.
pub use context::{ContextStatus, PhaseContext};
/// Stack diagnostics.
pub use dump::{DumpedActivation, StackDump};
/// Tracker errors.
pub use error::PhaseError;
/// Host collaborator ports.
pub use host::{EventDispatcher, NeighborNotifier, PhaseHost, PositionTracker, WorldStore};
/// World identifiers and values.
pub use ident::{
    ActorRef, BlockPos, BlockState, EntityId, Hash, PlayerId, TileEntitySnapshot, WorldId,
};
/// Transaction log.
pub use log::{CapturedMutation, LogEntry, MutationOrdinal, TransactionLog};
/// Receipts, decisions and unwind reports.
pub use receipt::{CancelReason, Decision, Disposition, TransactionReceipt, UnwindReport};
/// Typed activation sources.
pub use source::{
    BlockEventSource, BlockSource, EntitySource, FluidSource, FromSource, PlayerSource,
    ServerSource, SourceKind, SourceRef, TileEntitySource, WorldSource,
};
/// Phase kinds and their behaviour table.
pub use state::{FrameModifier, PhaseKind, PhaseState, PolicyRefiner, UnwindStrategy};
/// The tracker.
pub use tracker::{NotifyOutcome, PhaseTracker, TrackerStats};
