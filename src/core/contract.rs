//! Deployed contract records
//!
//! Bytecode is stored, never executed. Each contract keeps a string slot map
//! that `eth_call` balance lookups read from, and every deployment appends a
//! creation log entry served by `eth_getLogs`.

use crate::core::Address;
use crate::error::{BlockchainError, Result};
use crate::utils::hex_bytes;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Topic attached to contract-creation log entries
pub const CONTRACT_CREATED_TOPIC: &str =
    "0x8be0079c531659141344cd1fd0a4f28419497f9722a3daafe3b4186f6b6457e0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContract {
    pub address: Address,
    pub deployer: Address,
    #[serde(with = "hex_bytes")]
    pub bytecode: Vec<u8>,
    pub deployed_by_tx: String,
    pub deployed_at: i64,
    pub storage: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLog {
    pub address: Address,
    pub block_number: String,
    pub block_hash: String,
    pub transaction_hash: String,
    pub transaction_index: String,
    pub log_index: String,
    pub data: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: RwLock<HashMap<Address, DeployedContract>>,
    logs: RwLock<Vec<ContractLog>>,
}

impl ContractRegistry {
    pub fn new() -> ContractRegistry {
        ContractRegistry::default()
    }

    /// Record a deployment seen while the chain had `block_number` blocks on
    /// top of `block_hash`
    pub fn deploy(&self, contract: DeployedContract, block_number: u64, block_hash: &str) {
        let log = ContractLog {
            address: contract.address.clone(),
            block_number: format!("0x{block_number:x}"),
            block_hash: block_hash.to_string(),
            transaction_hash: contract.deployed_by_tx.clone(),
            transaction_index: "0x0".to_string(),
            log_index: "0x0".to_string(),
            data: "0x".to_string(),
            topics: vec![CONTRACT_CREATED_TOPIC.to_string()],
        };
        self.contracts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(contract.address.clone(), contract);
        self.logs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(log);
    }

    pub fn get(&self, address: &Address) -> Option<DeployedContract> {
        self.contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    /// Deployed bytecode, empty for plain accounts
    pub fn code(&self, address: &Address) -> Vec<u8> {
        self.get(address)
            .map(|contract| contract.bytecode)
            .unwrap_or_default()
    }

    /// Contract created by the transaction with hash `tx_hash`
    pub fn address_for_transaction(&self, tx_hash: &str) -> Option<Address> {
        self.contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|contract| contract.deployed_by_tx.eq_ignore_ascii_case(tx_hash))
            .map(|contract| contract.address.clone())
    }

    pub fn read_storage(&self, address: &Address, slot: &str) -> Option<String> {
        self.contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .and_then(|contract| contract.storage.get(slot).cloned())
    }

    /// Set a storage slot. Bytecode is never executed, so no node operation
    /// writes slots; deployment starts every contract with empty storage and
    /// `eth_call` answers "0x0" until a slot is seeded here.
    pub fn write_storage(&self, address: &Address, slot: &str, value: String) -> Result<()> {
        let mut contracts = self
            .contracts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let contract = contracts
            .get_mut(address)
            .ok_or_else(|| BlockchainError::NotFound(format!("contract {address}")))?;
        contract.storage.insert(slot.to_string(), value);
        Ok(())
    }

    pub fn logs(&self) -> Vec<ContractLog> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contract() -> DeployedContract {
        DeployedContract {
            address: Address::parse("0xC0FFEE").unwrap(),
            deployer: Address::parse("0xA").unwrap(),
            bytecode: vec![0x60, 0x80],
            deployed_by_tx: "0xabc".to_string(),
            deployed_at: 1,
            storage: BTreeMap::new(),
        }
    }

    #[test]
    fn test_deploy_records_code_and_log() {
        let registry = ContractRegistry::new();
        registry.deploy(sample_contract(), 3, "00ff");

        let address = Address::parse("0xc0ffee").unwrap();
        assert_eq!(registry.code(&address), vec![0x60, 0x80]);
        assert_eq!(registry.address_for_transaction("0xABC"), Some(address));

        let logs = registry.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, "0x3");
        assert_eq!(logs[0].topics, vec![CONTRACT_CREATED_TOPIC.to_string()]);
    }

    #[test]
    fn test_storage_slots() {
        let registry = ContractRegistry::new();
        registry.deploy(sample_contract(), 1, "00");
        let address = Address::parse("0xc0ffee").unwrap();

        assert_eq!(registry.read_storage(&address, "0xa"), None);
        registry
            .write_storage(&address, "0xa", "500".to_string())
            .unwrap();
        assert_eq!(registry.read_storage(&address, "0xa"), Some("500".to_string()));

        let missing = Address::parse("0xdead").unwrap();
        assert!(matches!(
            registry.write_storage(&missing, "0xa", "1".to_string()),
            Err(BlockchainError::NotFound(_))
        ));
        assert!(registry.code(&missing).is_empty());
    }
}
