// A transaction moves value between two accounts and carries an opaque payload.
// No sender means a system-issued transaction (reward, faucet grant) and no
// receiver means a contract deployment. Values are immutable once built: the
// `with_*` builders return a new transaction instead of editing one in place.

use crate::core::monetary::GAS_UNIT_PRICE;
use crate::core::{Address, Amount};
use crate::error::{BlockchainError, Result};
use crate::utils::{
    amount_string, current_timestamp, hex_bytes, keccak_digest, option_hex_bytes, sign_digest,
    to_hex_prefixed, verify_signature,
};
use ethers_core::utils::hash_message;
use k256::ecdsa::SigningKey;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    sender: Option<Address>,
    receiver: Option<Address>,
    #[serde(with = "hex_bytes")]
    payload: Vec<u8>,
    gas_limit: u64,
    #[serde(with = "amount_string")]
    value: Amount,
    #[serde(with = "option_hex_bytes")]
    signature: Option<Vec<u8>>,
    timestamp: i64,
}

// The hashed view: fixed field order, signature excluded
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedFields<'a> {
    sender: Option<&'a Address>,
    receiver: Option<&'a Address>,
    data: String,
    timestamp: i64,
    gas_limit: u64,
    value: String,
}

impl Transaction {
    pub fn new(
        sender: Option<Address>,
        receiver: Option<Address>,
        payload: Vec<u8>,
        gas_limit: u64,
        value: Amount,
    ) -> Result<Transaction> {
        Ok(Self::new_at(
            sender,
            receiver,
            payload,
            gas_limit,
            value,
            current_timestamp()?,
        ))
    }

    pub fn new_at(
        sender: Option<Address>,
        receiver: Option<Address>,
        payload: Vec<u8>,
        gas_limit: u64,
        value: Amount,
        timestamp: i64,
    ) -> Transaction {
        Transaction {
            sender,
            receiver,
            payload,
            gas_limit,
            value,
            signature: None,
            timestamp,
        }
    }

    /// Privileged transaction crediting `receiver`; bypasses signature and gas checks
    pub fn new_system(receiver: Address, payload: Vec<u8>, value: Amount) -> Result<Transaction> {
        Self::new(None, Some(receiver), payload, 0, value)
    }

    /// Sign the transaction hash with `key`, returning the signed copy
    pub fn sign(self, key: &SigningKey) -> Result<Transaction> {
        let digest = self.digest()?;
        let signature = sign_digest(key, &digest)?;
        Ok(self.with_signature(signature))
    }

    pub fn with_signature(self, signature: Vec<u8>) -> Transaction {
        Transaction {
            signature: Some(signature),
            ..self
        }
    }

    /// Copy with the logical receiver set, e.g. to a derived contract address
    pub fn with_receiver(self, receiver: Address) -> Transaction {
        Transaction {
            receiver: Some(receiver),
            ..self
        }
    }

    /// Ethereum signed-message digest over the canonical hashed fields
    pub fn digest(&self) -> Result<[u8; 32]> {
        let fields = HashedFields {
            sender: self.sender.as_ref(),
            receiver: self.receiver.as_ref(),
            data: to_hex_prefixed(&self.payload),
            timestamp: self.timestamp,
            gas_limit: self.gas_limit,
            value: self.value.to_string(),
        };
        let encoded = serde_json::to_vec(&fields)?;
        Ok(hash_message(encoded).0)
    }

    pub fn compute_hash(&self) -> Result<String> {
        Ok(to_hex_prefixed(&self.digest()?))
    }

    /// Key of the pending pool's duplicate index
    pub fn payload_digest(&self) -> String {
        to_hex_prefixed(&keccak_digest(&self.payload))
    }

    pub fn is_valid(&self) -> Result<bool> {
        let Some(sender) = &self.sender else {
            return Ok(true);
        };
        let signature = self
            .signature
            .as_ref()
            .ok_or(BlockchainError::MissingSignature)?;
        Ok(verify_signature(sender, &self.digest()?, signature))
    }

    pub fn gas_fee(&self) -> Amount {
        BigUint::from(self.gas_limit) * BigUint::from(GAS_UNIT_PRICE)
    }

    /// Value plus gas fee, the amount debited from the sender
    pub fn total_cost(&self) -> Amount {
        &self.value + self.gas_fee()
    }

    pub fn is_system(&self) -> bool {
        self.sender.is_none()
    }

    pub fn is_deployment(&self) -> bool {
        self.receiver.is_none()
    }

    pub fn get_sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    pub fn get_receiver(&self) -> Option<&Address> {
        self.receiver.as_ref()
    }

    pub fn get_payload(&self) -> &[u8] {
        self.payload.as_slice()
    }

    pub fn get_gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn get_value(&self) -> &Amount {
        &self.value
    }

    pub fn get_signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }
}
