// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Activation identifiers and the handle drivers hold for an open phase.

use crate::state::PhaseKind;

/// Thin wrapper around a phase activation identifier.
///
/// The tracker issues monotonically increasing identifiers from
/// [`crate::PhaseTracker::switch_to`].
///
/// # Invariants
/// - The underlying `u64` may wrap at `u64::MAX`; when it does the tracker
///   resumes at `1` (skipping zero).
/// - Zero is reserved as invalid and is never issued.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ActivationId(u64);

impl ActivationId {
    /// Constructs an `ActivationId` from a raw value.
    ///
    /// `ActivationId(0)` can be constructed but never matches a live activation.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn next_after(counter: &mut u64) -> Self {
        *counter = counter.wrapping_add(1);
        if *counter == 0 {
            *counter = 1;
        }
        Self(*counter)
    }
}

impl core::fmt::Display for ActivationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proof of an open activation, returned by `switch_to` and consumed by
/// `complete_phase`.
///
/// Deliberately not `Clone`: an activation is completed at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an open phase must be completed with PhaseTracker::complete_phase"]
pub struct ContextHandle {
    pub(crate) id: ActivationId,
    pub(crate) kind: PhaseKind,
    pub(crate) depth: u32,
}

impl ContextHandle {
    /// Identifier of the activation this handle refers to.
    pub fn id(&self) -> ActivationId {
        self.id
    }

    /// Kind of the activation.
    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// Nesting depth of the activation (root activations have depth 1).
    pub fn depth(&self) -> u32 {
        self.depth
    }
}
