//! Data storage and persistence
//!
//! The ledgers only ever see the opaque [`LedgerStore`] interface; the chain
//! itself is persisted by [`BlockStore`]. Both live in the node's sled
//! database under `<data_dir>/node_<port>/`.

pub mod block_store;
pub mod ledger_store;

pub use block_store::BlockStore;
pub use ledger_store::{LedgerStore, MemoryStore, SledStore};

use crate::error::Result;
use std::path::Path;

/// Open (or create) the sled database of the node listening on `port`
pub fn open_node_db(data_dir: &Path, port: u16) -> Result<sled::Db> {
    let path = data_dir.join(format!("node_{port}"));
    Ok(sled::open(path)?)
}
