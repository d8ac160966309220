// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use phase_app_core::config::{ConfigError, ConfigStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory implementation of [`ConfigStore`] for testing.
///
/// Clones share state, so a test can keep a handle while a
/// [`phase_app_core::config_port::TrackerSettings`] owns another.
///
/// # Example
///
/// ```
/// use phase_app_core::config_port::{TrackerConfigPort, TrackerSettings};
/// use phase_dry_tests::InMemoryConfigStore;
///
/// let store = InMemoryConfigStore::new();
/// let settings = TrackerSettings::new(store.clone());
/// let config = settings.tracker_config_or_default();
/// settings.save_tracker_config(&config);
/// assert_eq!(store.load_count(), 1);
/// assert_eq!(store.save_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `data` under `key`.
    pub fn with_entry(key: &str, data: &[u8]) -> Self {
        let store = Self::new();
        store.lock().data.insert(key.to_owned(), data.to_vec());
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make subsequent loads fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make subsequent saves fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Attempted loads, including failed ones.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Attempted saves, including failed ones.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Raw bytes stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().data.get(key).cloned()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(ConfigError::Unavailable("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(ConfigError::Unavailable("simulated save failure".into()));
        }
        inner.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use phase_app_core::config_port::{TrackerConfigPort, TrackerSettings, TRACKER_CONFIG_KEY};
    use phase_core::TrackerConfig;

    #[test]
    fn clones_share_state() {
        let a = InMemoryConfigStore::new();
        let b = a.clone();
        a.save_raw("k", b"v").unwrap();
        assert_eq!(b.load_raw("k").unwrap(), b"v");
        assert_eq!(b.save_count(), 1);
    }

    #[test]
    fn failed_load_falls_back_to_default_config() {
        let store = InMemoryConfigStore::with_entry(
            TRACKER_CONFIG_KEY,
            br#"{ "version": 1, "tracker": { "max_depth": 5 } }"#,
        );
        store.set_fail_on_load(true);
        let settings = TrackerSettings::new(store.clone());
        assert!(matches!(settings.try_load(), Err(ConfigError::Unavailable(_))));
        assert_eq!(settings.tracker_config_or_default(), TrackerConfig::default());
        store.set_fail_on_load(false);
        assert_eq!(settings.tracker_config_or_default().max_depth, 5);
        assert_eq!(store.load_count(), 3);
    }

    #[test]
    fn failed_save_stores_nothing() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_save(true);
        TrackerSettings::new(store.clone()).save_tracker_config(&TrackerConfig::default());
        assert!(store.raw(TRACKER_CONFIG_KEY).is_none());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn saved_config_is_a_versioned_document() {
        let store = InMemoryConfigStore::new();
        TrackerSettings::new(store.clone())
            .save_tracker_config(&TrackerConfig::default().with_max_depth(12));
        let raw = store.raw(TRACKER_CONFIG_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["tracker"]["max_depth"], 12);
        assert_eq!(value["tracker"]["verbose_dumps"], true);
    }
}
