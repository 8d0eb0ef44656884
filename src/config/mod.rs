//! Configuration management
//!
//! Node settings: the P2P and RPC addresses, bootstrap peers, where state is
//! stored, and the chain parameters the node runs with.

pub mod settings;

pub use settings::{Config, DEFAULT_DATA_DIR, DEFAULT_NODE_ADDR};
