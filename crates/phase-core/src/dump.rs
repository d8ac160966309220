// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Printable diagnostic of the phase stack and its cause frames.
//!
//! Fatal errors carry a [`StackDump`] so an operator can see exactly which
//! activations were open, what drove them and who was acting.
use core::fmt;

use crate::activation::ActivationId;
use crate::cause::CauseFrame;
use crate::context::{ContextStatus, PhaseContext};
use crate::ident::ActorRef;
use crate::state::PhaseKind;

/// One activation as it appeared in a dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpedActivation {
    /// Activation id.
    pub id: ActivationId,
    /// Phase kind.
    pub kind: PhaseKind,
    /// Nesting depth.
    pub depth: u32,
    /// Rendered source, if attached.
    pub source: Option<String>,
    /// Owner at dump time.
    pub owner: Option<ActorRef>,
    /// Notifier at dump time.
    pub notifier: Option<ActorRef>,
    /// Lifecycle status.
    pub status: ContextStatus,
    /// Number of transaction-log entries captured so far.
    pub logged: usize,
    /// Number of spawn/drop requests captured so far.
    pub spawns: usize,
}

impl DumpedActivation {
    pub(crate) fn of(context: &PhaseContext) -> Self {
        Self {
            id: context.id(),
            kind: context.kind(),
            depth: context.depth(),
            source: context.source().map(ToString::to_string),
            owner: context.owner(),
            notifier: context.notifier(),
            status: context.status(),
            logged: context.captures().log().len(),
            spawns: context.captures().spawns().len(),
        }
    }
}

/// Snapshot of the tracker's stacks, outermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackDump {
    activations: Vec<DumpedActivation>,
    frames: Vec<Vec<String>>,
    verbose: bool,
}

impl StackDump {
    pub(crate) fn capture<'a>(
        contexts: impl Iterator<Item = &'a PhaseContext>,
        frames: &[CauseFrame],
        verbose: bool,
    ) -> Self {
        let activations = contexts.map(DumpedActivation::of).collect();
        let frames = frames
            .iter()
            .map(|frame| {
                let mut lines: Vec<String> = frame.causes().iter().map(ToString::to_string).collect();
                if verbose {
                    lines.extend(
                        frame
                            .context()
                            .iter()
                            .map(|(key, value)| format!("{key:?} = {value}")),
                    );
                }
                lines
            })
            .collect();
        Self {
            activations,
            frames,
            verbose,
        }
    }

    /// Activations, outermost first.
    pub fn activations(&self) -> &[DumpedActivation] {
        &self.activations
    }

    /// Rendered cause frames, outermost first.
    pub fn frames(&self) -> &[Vec<String>] {
        &self.frames
    }

    /// True when no activation was open.
    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }
}

impl fmt::Display for StackDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "phase stack ({} open):", self.activations.len())?;
        for a in self.activations.iter().rev() {
            write!(f, "  #{} [{}] {} {:?}", a.depth, a.id, a.kind, a.status)?;
            if let Some(source) = &a.source {
                write!(f, " source={source}")?;
            }
            if let Some(owner) = a.owner {
                write!(f, " owner={owner}")?;
            }
            if let Some(notifier) = a.notifier {
                write!(f, " notifier={notifier}")?;
            }
            writeln!(f, " logged={} spawns={}", a.logged, a.spawns)?;
        }
        writeln!(
            f,
            "cause frames ({}{}):",
            self.frames.len(),
            if self.verbose { ", verbose" } else { "" }
        )?;
        for (i, frame) in self.frames.iter().enumerate().rev() {
            writeln!(f, "  frame {i}: {}", frame.join(" | "))?;
        }
        Ok(())
    }
}
