// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tracker configuration.
use crate::constants::DEFAULT_MAX_DEPTH;

/// Tunables for a [`crate::PhaseTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TrackerConfig {
    /// Maximum activation nesting depth. Entering a phase deeper than this is
    /// refused and the nested chain is truncated. Values below 1 are treated
    /// as 1.
    pub max_depth: u32,
    /// Include context annotations in stack dumps.
    pub verbose_dumps: bool,
    /// Emit a warning the first time a chain is truncated in a tick.
    pub warn_on_truncation: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            verbose_dumps: true,
            warn_on_truncation: true,
        }
    }
}

impl TrackerConfig {
    /// Returns a copy with `max_depth` replaced.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Effective depth ceiling.
    pub fn effective_max_depth(&self) -> u32 {
        self.max_depth.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_depth_is_clamped() {
        assert_eq!(TrackerConfig::default().with_max_depth(0).effective_max_depth(), 1);
        assert_eq!(TrackerConfig::default().effective_max_depth(), DEFAULT_MAX_DEPTH);
    }
}
