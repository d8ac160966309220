// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed [`ConfigStore`] for phase tracking hosts.
//!
//! Each key is one `<key>.json` file under a base directory (the platform
//! config dir by default). Saves go through a temporary file in the same
//! directory and are renamed into place, so a crash mid-save leaves the
//! previous document intact.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use phase_app_core::config::{ConfigError, ConfigStore};
use phase_app_core::config_port::TrackerSettings;
use tempfile::NamedTempFile;

/// Config documents stored as JSON files under one directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store rooted at the user config directory (e.g. `~/.config/phase`).
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("dev", "flyingrobots", "phase").ok_or_else(|| {
            ConfigError::Unavailable("no home directory to resolve a config dir from".into())
        })?;
        Self::with_base(dirs.config_dir())
    }

    /// Store rooted at `base`, created if missing.
    pub fn with_base(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory the store writes into.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// File backing `key`. Keys are plain names; anything that could escape
    /// the base directory is refused.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, ConfigError> {
        let plain = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !plain {
            return Err(ConfigError::InvalidKey(key.to_owned()));
        }
        Ok(self.base.join(format!("{key}.json")))
    }
}

/// Tracker settings kept in the platform config directory.
pub fn platform_tracker_settings() -> Result<TrackerSettings<FsConfigStore>, ConfigError> {
    Ok(TrackerSettings::new(FsConfigStore::new()?))
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key)?;
        fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::Io(err),
        })
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.base)?;
        let mut staged = NamedTempFile::new_in(&self.base)?;
        staged.write_all(data)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|err| ConfigError::Io(err.error))?;
        Ok(())
    }
}
