//! Address-learned player sessions for the replication server
//!
//! The registry turns an unauthenticated source address into a stable player
//! identity. It handles:
//! - Sequential identity assignment on first contact (ids start at 1)
//! - Address <-> identity lookup in both directions
//! - Latest-only storage of each player's snapshot
//! - Optional idle eviction
//!
//! The source address is the only credential. A client whose address changes
//! (NAT rebinding, new port) is seen as a brand new player and gets a fresh id;
//! there is no reconnection token to tie the two together.

use drone_shared::{PlayerId, Snapshot};
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Server-side state for one learned address
#[derive(Debug)]
pub struct Session {
    /// Identity assigned on first contact
    pub id: PlayerId,
    /// Address the identity is bound to
    pub addr: SocketAddr,
    /// Last time any datagram arrived from this address
    pub last_seen: Instant,
    /// Latest stored snapshot; no history is kept server-side
    pub last_snapshot: Option<Snapshot>,
}

impl Session {
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_snapshot: None,
        }
    }

    /// Returns true if nothing arrived from this session within `timeout`
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Maps addresses to player identities and tracks per-player state
///
/// Sessions are kept in id order so broadcasts iterate players in a stable
/// order regardless of hash seeds.
pub struct SessionRegistry {
    /// Sessions indexed by player id
    sessions: BTreeMap<PlayerId, Session>,
    /// Reverse index used on every received datagram
    addr_to_id: HashMap<SocketAddr, PlayerId>,
    /// Next identity to hand out; ids are never reused
    next_id: PlayerId,
    /// Maximum number of concurrent sessions
    max_players: usize,
}

impl SessionRegistry {
    /// Creates an empty registry that accepts at most `max_players` sessions
    pub fn new(max_players: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            addr_to_id: HashMap::new(),
            next_id: 1,
            max_players,
        }
    }

    /// Resolves the identity for a datagram source, learning new addresses
    ///
    /// Returns the player id and whether it was assigned by this call.
    /// Known addresses always resolve to the same id and have their
    /// last-seen time refreshed. Returns None only when the registry is full.
    pub fn resolve(&mut self, addr: SocketAddr) -> Option<(PlayerId, bool)> {
        if let Some(&id) = self.addr_to_id.get(&addr) {
            if let Some(session) = self.sessions.get_mut(&id) {
                session.last_seen = Instant::now();
            }
            return Some((id, false));
        }

        if self.sessions.len() >= self.max_players {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        info!("Player {} joined from {}", id, addr);
        self.sessions.insert(id, Session::new(id, addr));
        self.addr_to_id.insert(addr, id);

        Some((id, true))
    }

    /// Looks up the identity bound to an address without learning it
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.addr_to_id.get(&addr).copied()
    }

    /// Last known address of a player
    pub fn addr_of(&self, id: PlayerId) -> Option<SocketAddr> {
        self.sessions.get(&id).map(|session| session.addr)
    }

    /// Replaces the stored snapshot of a player
    ///
    /// Returns false if the player is unknown.
    pub fn store_snapshot(&mut self, id: PlayerId, snapshot: Snapshot) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.last_snapshot = Some(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn snapshot_of(&self, id: PlayerId) -> Option<&Snapshot> {
        self.sessions
            .get(&id)
            .and_then(|session| session.last_snapshot.as_ref())
    }

    /// Every stored snapshot in player id order
    ///
    /// Players that have only sent chat or events so far have no snapshot
    /// and are skipped.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.sessions
            .values()
            .filter_map(|session| session.last_snapshot)
            .collect()
    }

    /// Every known address, in player id order
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.sessions.values().map(|session| session.addr).collect()
    }

    /// Removes sessions idle for longer than `timeout`
    ///
    /// Returns the evicted ids. A client that comes back afterwards is
    /// assigned a new id.
    pub fn evict_idle(&mut self, timeout: Duration) -> Vec<PlayerId> {
        let idle: Vec<PlayerId> = self
            .sessions
            .values()
            .filter(|session| session.is_idle(timeout))
            .map(|session| session.id)
            .collect();

        for id in &idle {
            if let Some(session) = self.sessions.remove(id) {
                self.addr_to_id.remove(&session.addr);
                info!("Player {} at {} timed out", id, session.addr);
            }
        }

        idle
    }

    /// Returns the number of learned sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no address has been learned yet
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
