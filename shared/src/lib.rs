//! Data model and wire protocol shared by the replication server and clients.
//!
//! Every datagram carries exactly one [`Packet`]. Packets are encoded with
//! bincode, so each record starts with its variant tag followed by
//! fixed-width little-endian fields. There are no sequence numbers, checksums
//! or fragmentation: UDP may drop, duplicate or reorder datagrams and the
//! consuming layers (snapshot buffers, latest-wins storage) absorb that.

pub mod transport;

use serde::{Deserialize, Serialize};

/// Default UDP port for the replication server.
pub const DEFAULT_PORT: u16 = 7777;
/// Receive buffer size; larger datagrams are truncated by the OS and rejected.
pub const MAX_DATAGRAM_SIZE: usize = 2048;
/// Number of snapshots retained per remote player on the client.
pub const SNAPSHOT_BUFFER_CAPACITY: usize = 64;
/// Maximum encoded length of a chat sender name, in bytes.
pub const CHAT_NAME_LEN: usize = 24;
/// Maximum encoded length of a chat message body, in bytes.
pub const CHAT_TEXT_LEN: usize = 96;

/// Server-assigned player identity.
pub type PlayerId = u32;

/// Identity a client uses before the server has taught it its real one.
/// Never a valid player.
pub const UNASSIGNED_PLAYER: PlayerId = 0;

/// Position and orientation of a drone.
///
/// Angles are carried in whatever unit the sender uses; the protocol never
/// converts them.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, z: f32, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self {
            x,
            y,
            z,
            yaw,
            pitch,
            roll,
        }
    }

    /// Component-wise linear blend, `alpha = 0` yields `a` and `alpha = 1` yields `b`.
    pub fn lerp(a: &Pose, b: &Pose, alpha: f32) -> Pose {
        let mix = |from: f32, to: f32| from + (to - from) * alpha;
        Pose {
            x: mix(a.x, b.x),
            y: mix(a.y, b.y),
            z: mix(a.z, b.z),
            yaw: mix(a.yaw, b.yaw),
            pitch: mix(a.pitch, b.pitch),
            roll: mix(a.roll, b.roll),
        }
    }
}

/// One player's authoritative pose at a server-assigned time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub player_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    /// Seconds since server start, stamped on ingestion. Whatever the sender
    /// puts here is overwritten.
    pub server_time: f64,
}

impl Snapshot {
    pub fn new(player_id: PlayerId, pose: Pose, server_time: f64) -> Self {
        Self {
            player_id,
            x: pose.x,
            y: pose.y,
            z: pose.z,
            yaw: pose.yaw,
            pitch: pose.pitch,
            roll: pose.roll,
            server_time,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.z, self.yaw, self.pitch, self.roll)
    }
}

/// Chat line relayed by the server to every known address.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub player_id: PlayerId,
    pub name: String,
    pub text: String,
}

impl ChatMessage {
    /// Builds a chat message, truncating both fields to their wire limits.
    pub fn new(player_id: PlayerId, name: &str, text: &str) -> Self {
        Self {
            player_id,
            name: truncate_utf8(name, CHAT_NAME_LEN),
            text: truncate_utf8(text, CHAT_TEXT_LEN),
        }
    }

    fn within_limits(&self) -> bool {
        self.name.len() <= CHAT_NAME_LEN && self.text.len() <= CHAT_TEXT_LEN
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Fire,
    Explode,
}

/// Gameplay event (a shot fired, an explosion) relayed to every player.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GameEvent {
    pub owner_id: PlayerId,
    pub kind: EventKind,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub server_time: f64,
    /// Lets every client reproduce the same visual effect.
    pub seed: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    /// Client -> server: own pose. Server -> client: a stored player's pose.
    Snapshot(Snapshot),
    /// Server -> client: the identity the server assigned to this address.
    Welcome {
        player_id: PlayerId,
        server_time: f64,
    },
    Chat(ChatMessage),
    Event(GameEvent),
}

/// Encodes a packet into a single datagram payload.
pub fn encode(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(packet)
}

/// Decodes one datagram.
///
/// Returns `None` unless the bytes decode to a packet whose encoded size is
/// exactly the datagram length, so truncated, padded or corrupted datagrams
/// are all discarded the same way.
pub fn decode(bytes: &[u8]) -> Option<Packet> {
    let packet: Packet = bincode::deserialize(bytes).ok()?;
    let expected = bincode::serialized_size(&packet).ok()?;
    if expected != bytes.len() as u64 {
        return None;
    }

    if let Packet::Chat(chat) = &packet {
        if !chat.within_limits() {
            return None;
        }
    }

    Some(packet)
}

/// Cuts `s` to at most `max` bytes without splitting a character.
pub fn truncate_utf8(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
