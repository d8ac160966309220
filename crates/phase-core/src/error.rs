// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors emitted by the phase tracker.
use thiserror::Error;

use crate::activation::ActivationId;
use crate::dump::StackDump;
use crate::source::SourceKind;
use crate::state::PhaseKind;

/// Errors emitted by the tracker and its contexts.
///
/// Variants for which [`PhaseError::is_fatal`] returns true indicate a
/// programming defect in a caller: the in-progress tick must be abandoned
/// (see [`crate::PhaseTracker::abort_tick`]). The others are recoverable: the
/// offending nested activation is refused and the tick continues.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// `complete_phase` was called with a handle that is not the stack top.
    #[error(
        "stack discipline violated: completing activation {completing} but the top is {}\n{dump}",
        .top.map_or_else(|| "empty".to_owned(), |id| id.to_string())
    )]
    StackDiscipline {
        /// Activation the caller tried to complete.
        completing: ActivationId,
        /// Activation actually on top, if any.
        top: Option<ActivationId>,
        /// Stack at the time of the violation.
        dump: StackDump,
    },
    /// A non-reentrant kind was entered while already active.
    #[error("phase {kind} is not reentrant and is already active\n{dump}")]
    Reentrancy {
        /// Kind that was entered.
        kind: PhaseKind,
        /// Stack at the time of the violation.
        dump: StackDump,
    },
    /// `source_as` asked for a variant the activation does not have.
    #[error(
        "phase {kind} source mismatch: expected {expected}, found {}\n{dump}",
        .actual.map_or_else(|| "no source".to_owned(), |k| k.to_string())
    )]
    SourceMismatch {
        /// Kind of the queried activation.
        kind: PhaseKind,
        /// Requested source variant.
        expected: SourceKind,
        /// Actual source variant, if a source is attached.
        actual: Option<SourceKind>,
        /// Stack at the time of the query.
        dump: StackDump,
    },
    /// Entering `kind` would exceed the configured depth ceiling.
    #[error("phase depth {depth} for {kind} exceeds the maximum of {max}")]
    DepthExceeded {
        /// Kind that was refused.
        kind: PhaseKind,
        /// Depth it would have had.
        depth: u32,
        /// Configured ceiling.
        max: u32,
    },
    /// The enclosing activation does not allow block-event sub-activations.
    #[error("{enclosing} does not allow block-event activations")]
    BlockEventsDisallowed {
        /// Kind of the enclosing activation.
        enclosing: PhaseKind,
    },
    /// A capture was attempted on an activation that is no longer capturing.
    #[error("activation {0} is no longer capturing")]
    NotCapturing(ActivationId),
    /// An operation needed an active phase and the stack was empty.
    #[error("no phase is active")]
    NoActivePhase,
}

impl PhaseError {
    /// True when the error must abandon the current tick.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DepthExceeded { .. } | Self::BlockEventsDisallowed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_refusals_are_recoverable() {
        let depth = PhaseError::DepthExceeded {
            kind: PhaseKind::NeighborNotification,
            depth: 5,
            max: 4,
        };
        assert!(!depth.is_fatal());
        assert!(!PhaseError::BlockEventsDisallowed {
            enclosing: PhaseKind::DimensionTick
        }
        .is_fatal());
        assert!(PhaseError::NoActivePhase.is_fatal());
        assert!(PhaseError::Reentrancy {
            kind: PhaseKind::EntityTick,
            dump: StackDump::default(),
        }
        .is_fatal());
    }

    #[test]
    fn source_mismatch_names_both_kinds() {
        let err = PhaseError::SourceMismatch {
            kind: PhaseKind::BlockTick,
            expected: SourceKind::Entity,
            actual: Some(SourceKind::Block),
            dump: StackDump::default(),
        };
        let text = err.to_string();
        assert!(text.contains("expected entity"), "{text}");
        assert!(text.contains("found block"), "{text}");
    }
}
