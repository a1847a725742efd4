//! # Replication Client Library
//!
//! This library provides the client side of the drone state replication
//! core. It sends the local drone's pose upstream and turns the server's
//! lossy, unordered stream of timestamped snapshots into one smooth pose per
//! remote player per frame.
//!
//! ## Architecture Overview
//!
//! ### Identity
//! The client sends snapshots with player id 0 until the server's `Welcome`
//! teaches it the id bound to its address, then echoes that id on every
//! snapshot.
//!
//! ### Snapshot Buffering
//! Each remote player gets a bounded [`snapshot_buffer::SnapshotBuffer`].
//! Only snapshots strictly newer than the newest buffered one are kept, so
//! duplicates and late arrivals cannot break the time ordering that sampling
//! relies on.
//!
//! ### Interpolation
//! Remote players are drawn slightly in the past (100 ms by default) on an
//! estimate of the server clock. For that render time the buffer returns the
//! pair of snapshots around it and the pose is blended linearly. When no pair
//! exists the last rendered pose is held; remote motion is never
//! extrapolated.
//!
//! The local drone is not predicted or reconciled: its pose comes straight
//! from the flight controller (here, [`input::FlightPath`]).
//!
//! ## Module Organization
//!
//! ### Snapshot Buffer Module (`snapshot_buffer`)
//! - Strictly increasing, bounded history per player
//! - Bracket lookup and pose blending for a render time
//!
//! ### Replication Module (`replication`)
//! - One buffer per player id, created on first snapshot
//! - Last-seen tracking for the session layer's staleness policy
//!
//! ### Game Module (`game`)
//! - Server clock estimate and render time
//! - Per-frame remote pose resolution with hold-last-pose fallback
//!
//! ### Input Module (`input`)
//! - Headless flight path producing the local pose
//!
//! ### Network Module (`network`)
//! - Socket ownership, non-blocking drain, packet dispatch
//! - Outbound pose, chat and event records
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use drone_client::network::{Client, ClientConfig};
//! use drone_shared::Pose;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:7777", ClientConfig::default()).await?;
//!
//!     client.send_pose(Pose::new(0.0, 10.0, 0.0, 0.0, 0.0, 0.0))?;
//!     client.poll();
//!
//!     for (id, pose) in client.remote_poses() {
//!         println!("player {} at ({}, {}, {})", id, pose.x, pose.y, pose.z);
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod replication;
pub mod snapshot_buffer;
