//! Client-side replication table: one snapshot buffer per remote player.

use crate::snapshot_buffer::SnapshotBuffer;
use drone_shared::{PlayerId, Snapshot, SNAPSHOT_BUFFER_CAPACITY, UNASSIGNED_PLAYER};
use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    buffer: SnapshotBuffer,
    last_seen: Instant,
}

/// Owns the per-player buffers. Buffers are created lazily on the first
/// snapshot for an id and only removed when the session layer asks.
pub struct ReplicationTable {
    entries: HashMap<PlayerId, Entry>,
    buffer_capacity: usize,
}

impl Default for ReplicationTable {
    fn default() -> Self {
        Self::new(SNAPSHOT_BUFFER_CAPACITY)
    }
}

impl ReplicationTable {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            buffer_capacity,
        }
    }

    /// Routes a snapshot to its player's buffer, creating the buffer if needed.
    ///
    /// Returns whether the buffer accepted it. Snapshots for the unassigned id
    /// are ignored. Only accepted snapshots refresh the last-seen time; the
    /// server keeps rebroadcasting a departed player's final snapshot.
    pub fn ingest(&mut self, snapshot: Snapshot) -> bool {
        if snapshot.player_id == UNASSIGNED_PLAYER {
            return false;
        }

        let capacity = self.buffer_capacity;
        let entry = self.entries.entry(snapshot.player_id).or_insert_with(|| {
            debug!("Tracking player {}", snapshot.player_id);
            Entry {
                buffer: SnapshotBuffer::new(capacity),
                last_seen: Instant::now(),
            }
        });

        let accepted = entry.buffer.push(snapshot);
        if accepted {
            entry.last_seen = Instant::now();
        }
        accepted
    }

    pub fn get(&self, id: PlayerId) -> Option<&SnapshotBuffer> {
        self.entries.get(&id).map(|entry| &entry.buffer)
    }

    /// Time since a new snapshot for `id` was last accepted.
    pub fn since_last_seen(&self, id: PlayerId) -> Option<Duration> {
        self.entries.get(&id).map(|entry| entry.last_seen.elapsed())
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<SnapshotBuffer> {
        self.entries.remove(&id).map(|entry| entry.buffer)
    }

    /// Drops every player not heard from within `timeout`, returning their ids.
    pub fn evict_stale(&mut self, timeout: Duration) -> Vec<PlayerId> {
        let stale: Vec<PlayerId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_seen.elapsed() > timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            self.entries.remove(id);
        }
        stale
    }

    /// Tracked ids in ascending order.
    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
