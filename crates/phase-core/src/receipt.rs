// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transaction receipts: one per captured block mutation, decided at unwind.
//!
//! Receipts are built in capture order and handed to the event collaborator,
//! which answers with one [`Decision`] per receipt. The per-activation
//! [`UnwindReport`] records the resulting dispositions in the same order,
//! together with a canonical digest of those outcomes.

use blake3::Hasher;

use crate::activation::ActivationId;
use crate::constants::{digest_len0_u64, RECEIPT_DIGEST_VERSION};
use crate::ident::{ActorRef, BlockPos, Hash, TileEntitySnapshot, WorldId};
use crate::log::CapturedMutation;
use crate::state::PhaseKind;

/// The reviewable record of one captured block mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Index of the mutation's entry in the activation's transaction log.
    pub log_index: usize,
    /// The mutation with its capture-time owner and notifier.
    pub mutation: CapturedMutation,
    /// Tile entity created by the mutation.
    pub tile_added: Option<TileEntitySnapshot>,
    /// Tile entity destroyed by the mutation.
    pub tile_removed: Option<TileEntitySnapshot>,
}

impl TransactionReceipt {
    /// World of the mutated position.
    pub fn world(&self) -> WorldId {
        self.mutation.world
    }

    /// Mutated position.
    pub fn pos(&self) -> BlockPos {
        self.mutation.pos
    }

    /// Owner at capture time.
    pub fn owner(&self) -> Option<ActorRef> {
        self.mutation.owner
    }

    /// Notifier at capture time.
    pub fn notifier(&self) -> Option<ActorRef> {
        self.mutation.notifier
    }
}

/// Verdict of the event collaborator for one receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Keep the mutation.
    Commit,
    /// Undo the mutation.
    Cancel,
}

/// Why a mutation was discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The event collaborator cancelled it.
    Vetoed,
    /// The event collaborator returned no decision for the receipt; the
    /// mutation is discarded rather than applied undecided.
    Mismatch,
}

/// Final outcome of a receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Mutation applied and attributed.
    Committed,
    /// Mutation discarded.
    Cancelled(CancelReason),
}

impl Disposition {
    const fn code(self) -> u8 {
        match self {
            Self::Committed => 1,
            Self::Cancelled(CancelReason::Vetoed) => 2,
            Self::Cancelled(CancelReason::Mismatch) => 3,
        }
    }
}

/// Summary of one activation's unwind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnwindReport {
    pub(crate) activation: ActivationId,
    pub(crate) kind: PhaseKind,
    pub(crate) dispositions: Vec<Disposition>,
    pub(crate) notifications_replayed: u32,
    pub(crate) notifications_dropped: u32,
    pub(crate) spawns_committed: u32,
    pub(crate) spawns_cancelled: u32,
    pub(crate) truncated: u32,
    pub(crate) digest: Hash,
}

impl UnwindReport {
    pub(crate) fn empty(activation: ActivationId, kind: PhaseKind) -> Self {
        Self {
            activation,
            kind,
            dispositions: Vec::new(),
            notifications_replayed: 0,
            notifications_dropped: 0,
            spawns_committed: 0,
            spawns_cancelled: 0,
            truncated: 0,
            digest: digest_len0_u64(),
        }
    }

    /// Activation the report belongs to.
    pub fn activation(&self) -> ActivationId {
        self.activation
    }

    /// Kind of the activation.
    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// Per-receipt dispositions in capture order.
    pub fn dispositions(&self) -> &[Disposition] {
        &self.dispositions
    }

    /// Number of committed mutations.
    pub fn committed(&self) -> usize {
        self.dispositions
            .iter()
            .filter(|d| **d == Disposition::Committed)
            .count()
    }

    /// Number of discarded mutations (vetoed or mismatched).
    pub fn cancelled(&self) -> usize {
        self.dispositions.len() - self.committed()
    }

    /// Number of mutations discarded because of a log/receipt mismatch.
    pub fn mismatched(&self) -> usize {
        self.dispositions
            .iter()
            .filter(|d| **d == Disposition::Cancelled(CancelReason::Mismatch))
            .count()
    }

    /// Neighbor notifications replayed after their mutation committed.
    pub fn notifications_replayed(&self) -> u32 {
        self.notifications_replayed
    }

    /// Neighbor notifications dropped with their cancelled mutation.
    pub fn notifications_dropped(&self) -> u32 {
        self.notifications_dropped
    }

    /// Spawns and drops that entered the world.
    pub fn spawns_committed(&self) -> u32 {
        self.spawns_committed
    }

    /// Spawns and drops that were cancelled.
    pub fn spawns_cancelled(&self) -> u32 {
        self.spawns_cancelled
    }

    /// Nested notification activations refused for exceeding the depth ceiling.
    pub fn truncated(&self) -> u32 {
        self.truncated
    }

    /// Canonical digest of the ordered receipt outcomes.
    ///
    /// Depends only on the digest format version, the number of receipts and,
    /// per receipt, the mutation (world, position, kind, old and new state)
    /// and its disposition. It does **not** include the activation id, so
    /// identical ticks in different runs produce identical digests.
    pub fn digest(&self) -> Hash {
        self.digest
    }
}

pub(crate) fn compute_decision_digest(
    receipts: &[TransactionReceipt],
    dispositions: &[Disposition],
) -> Hash {
    debug_assert_eq!(receipts.len(), dispositions.len());
    if receipts.is_empty() {
        return digest_len0_u64();
    }
    let mut hasher = Hasher::new();
    hasher.update(&RECEIPT_DIGEST_VERSION.to_le_bytes());
    hasher.update(&(receipts.len() as u64).to_le_bytes());
    for (receipt, disposition) in receipts.iter().zip(dispositions) {
        let m = &receipt.mutation;
        hasher.update(&m.world.0.to_le_bytes());
        hasher.update(&m.pos.x.to_le_bytes());
        hasher.update(&m.pos.y.to_le_bytes());
        hasher.update(&m.pos.z.to_le_bytes());
        hasher.update(&[m.kind.code()]);
        hasher.update(&m.old_state.raw().to_le_bytes());
        hasher.update(&m.new_state.raw().to_le_bytes());
        hasher.update(&[disposition.code()]);
    }
    hasher.finalize().into()
}

/// Short hex prefix of a digest for log lines.
pub(crate) fn short_digest(h: &Hash) -> String {
    hex::encode(&h[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ChangeKind;
    use crate::ident::BlockState;

    fn receipt(x: i32) -> TransactionReceipt {
        TransactionReceipt {
            log_index: 0,
            mutation: CapturedMutation {
                ordinal: 0,
                world: WorldId(0),
                pos: BlockPos::new(x, 0, 0),
                old_state: BlockState::AIR,
                new_state: BlockState::from_raw(9),
                kind: ChangeKind::Place,
                owner: None,
                notifier: None,
            },
            tile_added: None,
            tile_removed: None,
        }
    }

    #[test]
    fn digest_is_stable_and_sensitive_to_dispositions() {
        let receipts = vec![receipt(0), receipt(1)];
        let a = compute_decision_digest(
            &receipts,
            &[Disposition::Committed, Disposition::Committed],
        );
        let b = compute_decision_digest(
            &receipts,
            &[Disposition::Committed, Disposition::Committed],
        );
        let c = compute_decision_digest(
            &receipts,
            &[
                Disposition::Committed,
                Disposition::Cancelled(CancelReason::Vetoed),
            ],
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, digest_len0_u64());
        assert_eq!(compute_decision_digest(&[], &[]), digest_len0_u64());
    }

    #[test]
    fn short_digest_is_sixteen_hex_chars() {
        assert_eq!(short_digest(&[0xab; 32]), "abababababababab");
    }
}
