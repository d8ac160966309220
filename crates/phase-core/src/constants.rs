// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Defaults and canonical digests used across the tracker.
use crate::ident::Hash;

/// Default ceiling on activation nesting depth.
///
/// A notification chain reaching this depth is truncated; the rest of the tick
/// continues.
pub const DEFAULT_MAX_DEPTH: u32 = 1000;

/// Receipt digest format version committed into every non-empty digest.
pub const RECEIPT_DIGEST_VERSION: u16 = 1;

/// Canonical digest representing an empty length-prefix list: BLAKE3 of
/// `0u64.to_le_bytes()`.
///
/// Used as the decision digest of an unwind that had nothing to decide.
#[must_use]
pub fn digest_len0_u64() -> Hash {
    let mut h = blake3::Hasher::new();
    h.update(&0u64.to_le_bytes());
    h.finalize().into()
}
