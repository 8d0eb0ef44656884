use crate::core::monetary::{DEFAULT_FAUCET_AMOUNT, DEFAULT_MINING_REWARD};
use crate::core::proof_of_work::MAX_DIFFICULTY;
use crate::core::{Amount, ChainParams, DEFAULT_CHAIN_ID, DEFAULT_DIFFICULTY};
use crate::error::{BlockchainError, Result};
use crate::network::DEFAULT_MAX_PEERS;
use crate::utils::amount_string;
use log::info;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_NODE_ADDR: &str = "127.0.0.1:5001";
pub const DEFAULT_DATA_DIR: &str = "./data";

// The RPC port sits this far above the P2P port unless configured
const RPC_PORT_OFFSET: u16 = 1000;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const RPC_ADDRESS_KEY: &str = "RPC_ADDRESS";
const PEERS_KEY: &str = "PEERS";
const DATA_DIR_KEY: &str = "DATA_DIR";
const DIFFICULTY_KEY: &str = "DIFFICULTY";
const CHAIN_ID_KEY: &str = "CHAIN_ID";

/// Node configuration.
///
/// Built from defaults, then an optional TOML file, then environment
/// variables; the CLI overwrites individual fields last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub node_address: String,
    pub rpc_address: Option<String>,
    pub peers: Vec<String>,
    pub data_dir: PathBuf,
    pub difficulty: u32,
    #[serde(with = "amount_string")]
    pub mining_reward: Amount,
    #[serde(with = "amount_string")]
    pub faucet_amount: Amount,
    pub chain_id: u64,
    pub max_peers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_address: DEFAULT_NODE_ADDR.to_string(),
            rpc_address: None,
            peers: Vec::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: BigUint::from(DEFAULT_MINING_REWARD),
            faucet_amount: BigUint::from(DEFAULT_FAUCET_AMOUNT),
            chain_id: DEFAULT_CHAIN_ID,
            max_peers: DEFAULT_MAX_PEERS,
        }
    }
}

impl Config {
    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay variables returned by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node_address = addr;
        }
        if let Some(addr) = lookup(RPC_ADDRESS_KEY) {
            self.rpc_address = Some(addr);
        }
        if let Some(peers) = lookup(PEERS_KEY) {
            self.peers = parse_peer_list(&peers);
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(DIFFICULTY_KEY) {
            self.difficulty = parse_var(DIFFICULTY_KEY, &raw)?;
        }
        if let Some(raw) = lookup(CHAIN_ID_KEY) {
            self.chain_id = parse_var(CHAIN_ID_KEY, &raw)?;
        }
        Ok(())
    }

    /// Port of the P2P address, which also names the node's data directory
    pub fn node_port(&self) -> Result<u16> {
        let (_, port) = split_host_port(&self.node_address)?;
        Ok(port)
    }

    /// Configured RPC address, or the P2P host with the port shifted by 1000
    pub fn rpc_address(&self) -> Result<String> {
        if let Some(addr) = &self.rpc_address {
            return Ok(addr.clone());
        }
        let (host, port) = split_host_port(&self.node_address)?;
        let rpc_port = port.checked_add(RPC_PORT_OFFSET).ok_or_else(|| {
            BlockchainError::Config(format!("No RPC port above P2P port {port}"))
        })?;
        Ok(format!("{host}:{rpc_port}"))
    }

    pub fn chain_params(&self) -> Result<ChainParams> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "Difficulty must be between 1 and {MAX_DIFFICULTY}, got {}",
                self.difficulty
            )));
        }
        Ok(ChainParams {
            difficulty: self.difficulty,
            mining_reward: self.mining_reward.clone(),
            faucet_amount: self.faucet_amount.clone(),
            chain_id: self.chain_id,
        })
    }
}

fn parse_peer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(String::from)
        .collect()
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| BlockchainError::Config(format!("Invalid {key} {raw:?}: {e}")))
}

fn split_host_port(addr: &str) -> Result<(&str, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| BlockchainError::Config(format!("Address {addr} has no port")))?;
    let port = port
        .parse()
        .map_err(|e| BlockchainError::Config(format!("Invalid port in {addr}: {e}")))?;
    Ok((host, port))
}
