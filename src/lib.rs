//! Umbrella crate for the drone replication workspace.
//!
//! Re-exports the member crates so integration tests and embedders can pull
//! the whole replication core from one place.

pub use drone_client as client;
pub use drone_server as server;
pub use drone_shared as shared;
