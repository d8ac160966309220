// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transaction log: the ordered record of one activation's captures.
//!
//! Entries are appended in the exact order operations occurred and are never
//! reordered. Commit walks the log forward; rollback walks it in reverse.
//! Every tile-entity entry points back at the ordinal of the block mutation it
//! belongs to, and every queued notification belongs to the closest block
//! mutation before it (notifications queued before any mutation belong to
//! none and are always replayed).
use crate::capture::{BlockChange, ChangeKind, NeighborNotification};
use crate::ident::{ActorRef, BlockPos, BlockState, TileEntitySnapshot, WorldId};

/// Ordinal of a block mutation within its log (0-based, capture order).
pub type MutationOrdinal = u32;

/// A block mutation as captured, including the causal snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedMutation {
    /// Position in capture order among block mutations.
    pub ordinal: MutationOrdinal,
    /// World of the mutated position.
    pub world: WorldId,
    /// Mutated position.
    pub pos: BlockPos,
    /// State before the mutation.
    pub old_state: BlockState,
    /// State after the mutation.
    pub new_state: BlockState,
    /// Kind of mutation.
    pub kind: ChangeKind,
    /// Owner of the capturing activation at capture time.
    pub owner: Option<ActorRef>,
    /// Notifier of the capturing activation at capture time.
    pub notifier: Option<ActorRef>,
}

/// One log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEntry {
    /// A block state change.
    BlockMutation(CapturedMutation),
    /// A tile entity created by mutation `mutation`.
    TileEntityAdded {
        /// Owning block mutation.
        mutation: MutationOrdinal,
        /// World of the tile entity.
        world: WorldId,
        /// Position of the tile entity.
        pos: BlockPos,
        /// Contents of the new tile entity.
        snapshot: TileEntitySnapshot,
    },
    /// A tile entity destroyed by mutation `mutation`.
    TileEntityRemoved {
        /// Owning block mutation.
        mutation: MutationOrdinal,
        /// World of the tile entity.
        world: WorldId,
        /// Position of the tile entity.
        pos: BlockPos,
        /// Last known contents.
        snapshot: TileEntitySnapshot,
    },
    /// A neighbor notification deferred to commit time.
    NeighborNotificationQueued(NeighborNotification),
}

/// Append-only ordered log of captures.
#[derive(Clone, Debug, Default)]
pub struct TransactionLog {
    entries: Vec<LogEntry>,
    mutations: u32,
}

impl TransactionLog {
    /// Number of entries of any type.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of block mutations logged.
    pub fn mutation_count(&self) -> u32 {
        self.mutations
    }

    /// All entries in capture order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entry at `index`, if any.
    pub fn entry(&self, index: usize) -> Option<&LogEntry> {
        self.entries.get(index)
    }

    /// Block mutations in capture order, with their log index.
    pub fn mutations(&self) -> impl Iterator<Item = (usize, &CapturedMutation)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| match e {
            LogEntry::BlockMutation(m) => Some((i, m)),
            _ => None,
        })
    }

    /// Notifications queued before the first block mutation.
    pub fn leading_notifications(&self) -> impl Iterator<Item = &NeighborNotification> {
        self.entries
            .iter()
            .take_while(|e| !matches!(e, LogEntry::BlockMutation(_)))
            .filter_map(|e| match e {
                LogEntry::NeighborNotificationQueued(n) => Some(n),
                _ => None,
            })
    }

    /// Notifications queued after the mutation at log index `mutation_index`
    /// and before the next block mutation, in queued order.
    pub fn notifications_after(
        &self,
        mutation_index: usize,
    ) -> impl Iterator<Item = &NeighborNotification> {
        self.entries
            .iter()
            .skip(mutation_index.saturating_add(1))
            .take_while(|e| !matches!(e, LogEntry::BlockMutation(_)))
            .filter_map(|e| match e {
                LogEntry::NeighborNotificationQueued(n) => Some(n),
                _ => None,
            })
    }

    /// Tile entity added by mutation `ordinal`, if any.
    pub fn tile_added_by(&self, ordinal: MutationOrdinal) -> Option<&TileEntitySnapshot> {
        self.entries.iter().find_map(|e| match e {
            LogEntry::TileEntityAdded {
                mutation, snapshot, ..
            } if *mutation == ordinal => Some(snapshot),
            _ => None,
        })
    }

    /// Tile entity removed by mutation `ordinal`, if any.
    pub fn tile_removed_by(&self, ordinal: MutationOrdinal) -> Option<&TileEntitySnapshot> {
        self.entries.iter().find_map(|e| match e {
            LogEntry::TileEntityRemoved {
                mutation, snapshot, ..
            } if *mutation == ordinal => Some(snapshot),
            _ => None,
        })
    }

    /// Appends a block mutation (and its tile-entity entries) with the given
    /// causal snapshot; returns the mutation ordinal.
    pub(crate) fn push_mutation(
        &mut self,
        change: BlockChange,
        owner: Option<ActorRef>,
        notifier: Option<ActorRef>,
    ) -> MutationOrdinal {
        let ordinal = self.mutations;
        self.mutations = self.mutations.wrapping_add(1);
        let BlockChange {
            world,
            pos,
            old_state,
            new_state,
            kind,
            tile_added,
            tile_removed,
        } = change;
        self.entries.push(LogEntry::BlockMutation(CapturedMutation {
            ordinal,
            world,
            pos,
            old_state,
            new_state,
            kind,
            owner,
            notifier,
        }));
        // Removal precedes addition so a reverse walk re-inserts the old tile
        // entity only after dropping the new one.
        if let Some(snapshot) = tile_removed {
            self.entries.push(LogEntry::TileEntityRemoved {
                mutation: ordinal,
                world,
                pos,
                snapshot,
            });
        }
        if let Some(snapshot) = tile_added {
            self.entries.push(LogEntry::TileEntityAdded {
                mutation: ordinal,
                world,
                pos,
                snapshot,
            });
        }
        ordinal
    }

    pub(crate) fn push_notification(&mut self, notification: NeighborNotification) {
        self.entries
            .push(LogEntry::NeighborNotificationQueued(notification));
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.mutations = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(x: i32) -> BlockChange {
        BlockChange::new(
            WorldId(0),
            BlockPos::new(x, 0, 0),
            BlockState::AIR,
            BlockState::from_raw(1),
            ChangeKind::Place,
        )
    }

    fn note(x: i32) -> NeighborNotification {
        NeighborNotification {
            world: WorldId(0),
            notify_pos: BlockPos::new(x, 1, 0),
            source_block: BlockState::from_raw(1),
            source_pos: BlockPos::new(x, 0, 0),
        }
    }

    #[test]
    fn notifications_group_under_the_preceding_mutation() {
        let mut log = TransactionLog::default();
        log.push_notification(note(-1));
        log.push_mutation(change(0), None, None);
        log.push_notification(note(0));
        log.push_notification(note(10));
        log.push_mutation(change(1), None, None);
        log.push_mutation(change(2), None, None);
        log.push_notification(note(2));

        let leading: Vec<_> = log.leading_notifications().map(|n| n.notify_pos.x).collect();
        assert_eq!(leading, vec![-1]);

        let groups: Vec<Vec<i32>> = log
            .mutations()
            .map(|(idx, _)| log.notifications_after(idx).map(|n| n.notify_pos.x).collect())
            .collect();
        assert_eq!(groups, vec![vec![0, 10], vec![], vec![2]]);
    }

    #[test]
    fn tile_entities_link_to_their_mutation() {
        let mut log = TransactionLog::default();
        log.push_mutation(change(0), None, None);
        let ordinal = log.push_mutation(
            change(1)
                .with_tile_removed(TileEntitySnapshot::new("chest", &b"old"[..]))
                .with_tile_added(TileEntitySnapshot::new("furnace", &b"new"[..])),
            None,
            None,
        );
        assert_eq!(ordinal, 1);
        assert_eq!(log.mutation_count(), 2);
        assert!(log.tile_added_by(0).is_none());
        assert_eq!(log.tile_added_by(1).map(|s| s.kind.as_str()), Some("furnace"));
        assert_eq!(log.tile_removed_by(1).map(|s| s.kind.as_str()), Some("chest"));
        assert_eq!(log.len(), 4);
    }
}
