//! Per-player snapshot history.
//!
//! The server stamps every snapshot with its own clock. Datagrams may still
//! arrive late, twice or not at all, so the buffer only accepts snapshots
//! newer than the newest it holds and answers "which two snapshots surround
//! render time T?".

use drone_shared::{Pose, Snapshot, SNAPSHOT_BUFFER_CAPACITY};
use std::collections::VecDeque;

/// Bounded, strictly time-ordered snapshot history for one remote player.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    history: VecDeque<Snapshot>,
    max: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(SNAPSHOT_BUFFER_CAPACITY)
    }
}

impl SnapshotBuffer {
    /// Creates an empty buffer retaining at most `max` snapshots (at least two,
    /// since a bracket needs a pair).
    pub fn new(max: usize) -> Self {
        let max = max.max(2);
        Self {
            history: VecDeque::with_capacity(max),
            max,
        }
    }

    /// Appends `snap` if it is strictly newer than the newest entry.
    ///
    /// Stale and duplicate snapshots are dropped and `false` is returned.
    /// Once over capacity the oldest entries are evicted first.
    pub fn push(&mut self, snap: Snapshot) -> bool {
        if let Some(newest) = self.history.back() {
            if snap.server_time <= newest.server_time {
                return false;
            }
        }

        self.history.push_back(snap);
        while self.history.len() > self.max {
            self.history.pop_front();
        }
        true
    }

    /// Finds the interpolation bracket for render time `t`.
    ///
    /// Returns the first pair `(a, b)` of neighbouring entries, oldest first,
    /// with `b.server_time >= t`. When `t` precedes the whole history that is
    /// the two oldest entries. Returns `None` with fewer than two entries or
    /// when `t` is past the newest entry; callers should then hold the last
    /// pose they rendered rather than extrapolate.
    pub fn sample(&self, t: f64) -> Option<(&Snapshot, &Snapshot)> {
        if self.history.len() < 2 {
            return None;
        }

        (1..self.history.len())
            .find(|&i| self.history[i].server_time >= t)
            .map(|i| (&self.history[i - 1], &self.history[i]))
    }

    /// Blends the bracket around `t` into a single pose.
    pub fn interpolate(&self, t: f64) -> Option<Pose> {
        let (a, b) = self.sample(t)?;
        let span = b.server_time - a.server_time;
        let alpha = ((t - a.server_time) / span).clamp(0.0, 1.0) as f32;
        Some(Pose::lerp(&a.pose(), &b.pose(), alpha))
    }

    /// Returns the number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if no snapshots are buffered.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    pub fn newest(&self) -> Option<&Snapshot> {
        self.history.back()
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.history.front()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.history.iter()
    }
}
