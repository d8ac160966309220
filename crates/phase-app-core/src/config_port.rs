// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tracker-config port shared by simulation hosts.

use phase_core::TrackerConfig;
use tracing::{debug, warn};

use crate::config::{decode_tracker_config, encode_tracker_config, ConfigError, ConfigStore};

/// Store key holding the tracker configuration.
pub const TRACKER_CONFIG_KEY: &str = "phase-tracker";

/// Config-facing port for loading/saving the tracker configuration.
pub trait TrackerConfigPort {
    /// Load the tracker configuration (None if missing or unreadable).
    fn load_tracker_config(&self) -> Option<TrackerConfig>;
    /// Persist the tracker configuration (best-effort; failures are logged).
    fn save_tracker_config(&self, config: &TrackerConfig);

    /// Stored configuration, or the defaults when none is usable.
    fn tracker_config_or_default(&self) -> TrackerConfig {
        self.load_tracker_config().unwrap_or_default()
    }
}

/// Tracker settings persisted as one document in a [`ConfigStore`].
#[derive(Debug)]
pub struct TrackerSettings<S> {
    store: S,
    key: String,
}

impl<S> TrackerSettings<S> {
    /// Settings stored under [`TRACKER_CONFIG_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, TRACKER_CONFIG_KEY)
    }

    /// Settings stored under `key`, for hosts running several trackers.
    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Store key in use.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Borrow the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> TrackerSettings<S> {
    /// Loads and validates the stored document. `Ok(None)` when nothing is
    /// stored.
    pub fn try_load(&self) -> Result<Option<TrackerConfig>, ConfigError> {
        match self.store.load_raw(&self.key) {
            Ok(bytes) => decode_tracker_config(&bytes),
            Err(ConfigError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Writes `config` as a current-version document.
    pub fn try_save(&self, config: &TrackerConfig) -> Result<(), ConfigError> {
        let bytes = encode_tracker_config(config)?;
        self.store.save_raw(&self.key, &bytes)
    }
}

impl<S: ConfigStore> TrackerConfigPort for TrackerSettings<S> {
    fn load_tracker_config(&self) -> Option<TrackerConfig> {
        match self.try_load() {
            Ok(Some(config)) => Some(config),
            Ok(None) => {
                debug!(key = %self.key, "no stored tracker config");
                None
            }
            Err(err) => {
                warn!(key = %self.key, %err, "ignoring unreadable tracker config");
                None
            }
        }
    }

    fn save_tracker_config(&self, config: &TrackerConfig) {
        if let Err(err) = self.try_save(config) {
            warn!(key = %self.key, %err, "failed to persist tracker config");
        }
    }
}
