//! Peer-to-peer networking
//!
//! Nodes form a mesh of persistent TCP connections carrying JSON messages.
//! A new connection is greeted with the full chain; after that peers relay
//! transactions, raw signed transactions, mining requests and chains.

pub mod message;
pub mod peers;
pub mod server;

pub use message::PeerMessage;
pub use peers::{PeerHandle, PeerSet};
pub use server::{PeerNetwork, DEFAULT_MAX_PEERS};
