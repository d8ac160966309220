// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tracker configuration documents and the storage port they persist through.
//!
//! A stored tracker config is a versioned JSON envelope:
//!
//! ```json
//! { "version": 1, "tracker": { "max_depth": 1000, "verbose_dumps": true } }
//! ```
//!
//! Missing tracker fields take their defaults. Values outside the supported
//! range are clamped on the way in and on the way out, so a store never hands
//! the tracker a ceiling it cannot honour.

use phase_core::TrackerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Current document format version.
pub const DOCUMENT_VERSION: u32 = 1;

/// Largest depth ceiling a stored config may request.
pub const MAX_CONFIGURABLE_DEPTH: u32 = 1 << 16;

/// Storage port for raw config blobs, keyed by logical name.
pub trait ConfigStore {
    /// Load a raw blob. Returns [`ConfigError::NotFound`] when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw blob, replacing any previous one.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// The key cannot name a stored blob.
    #[error("invalid config key {0:?}")]
    InvalidKey(String),
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid JSON for this format.
    #[error("malformed config document: {0}")]
    Serde(#[from] serde_json::Error),
    /// The document was written by a newer (or unknown) format.
    #[error("config document version {found} is not supported (expected {supported})")]
    UnsupportedVersion {
        /// Version found in the document.
        found: u32,
        /// Newest version this build reads.
        supported: u32,
    },
    /// The store itself cannot be reached.
    #[error("config store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Serialize, Deserialize)]
struct TrackerDocument {
    version: u32,
    #[serde(default)]
    tracker: TrackerConfig,
}

/// Clamps `config` into the supported range, logging every adjustment.
pub fn normalize_tracker_config(mut config: TrackerConfig) -> TrackerConfig {
    if config.max_depth == 0 {
        warn!("max_depth of 0 raised to 1");
        config.max_depth = 1;
    } else if config.max_depth > MAX_CONFIGURABLE_DEPTH {
        warn!(
            requested = config.max_depth,
            limit = MAX_CONFIGURABLE_DEPTH,
            "max_depth lowered to the supported limit"
        );
        config.max_depth = MAX_CONFIGURABLE_DEPTH;
    }
    config
}

/// Parses a stored document. Empty input means "nothing stored".
pub fn decode_tracker_config(bytes: &[u8]) -> Result<Option<TrackerConfig>, ConfigError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let document: TrackerDocument = serde_json::from_slice(bytes)?;
    if document.version == 0 || document.version > DOCUMENT_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: document.version,
            supported: DOCUMENT_VERSION,
        });
    }
    Ok(Some(normalize_tracker_config(document.tracker)))
}

/// Renders `config` as a current-version document.
pub fn encode_tracker_config(config: &TrackerConfig) -> Result<Vec<u8>, ConfigError> {
    let document = TrackerDocument {
        version: DOCUMENT_VERSION,
        tracker: normalize_tracker_config(*config),
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}
