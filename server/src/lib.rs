//! # Replication Server Library
//!
//! This library provides the authoritative side of the drone state
//! replication core. It assigns player identities, stamps incoming pose
//! snapshots with server time and rebroadcasts the full world state to every
//! connected client.
//!
//! ## Core Responsibilities
//!
//! ### Identity Assignment
//! There is no connection handshake. The first datagram from an unseen
//! address allocates the next sequential player id (starting at 1; 0 means
//! "unassigned"). The client learns its id from a `Welcome` record and echoes
//! it on every later snapshot.
//!
//! ### Snapshot Ingestion
//! Clients send their own pose. The server overwrites the identity with the
//! one bound to the source address and the timestamp with its own monotonic
//! clock, so client clock skew never reaches the interpolation buffers.
//! Only the latest snapshot per player is kept.
//!
//! ### State Broadcasting
//! Every accepted snapshot triggers a broadcast of all stored snapshots to
//! all known addresses. Chat lines and gameplay events are stamped and
//! relayed to everyone as-is.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns the [`network::Server`], its socket and its
//! [`registry::SessionRegistry`]. Receives are non-blocking and drained in
//! bounded batches, so no locking is needed anywhere.
//!
//! ### Unreliable Transport
//! UDP only. Lost, duplicated or reordered datagrams are tolerated by the
//! latest-wins storage here and by the clients' snapshot buffers.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! - Address learning and sequential id assignment
//! - Latest snapshot per player
//! - Optional idle eviction
//!
//! ### Network Module (`network`)
//! - Datagram decoding and dispatch
//! - Server clock stamping
//! - World broadcast and chat/event relay
//!
//! ## Scalability
//!
//! Broadcasting is O(players²) datagrams per received snapshot. That is fine
//! for tens of players; larger sessions would batch broadcasts on a fixed
//! tick instead.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use drone_server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind("0.0.0.0:7777", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! The source address is the only credential and is trivially spoofable.
//! Clients that change address (NAT rebinding) are treated as new players.

pub mod network;
pub mod registry;
