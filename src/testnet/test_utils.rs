//! Test utilities for ledger and chain testing

use crate::core::{
    sign_legacy_transaction, Address, Amount, Blockchain, ChainParams, LegacyTransactionRequest,
    MIN_GAS_LIMIT,
};
use crate::error::{BlockchainError, Result};
use crate::utils::{address_of_signer, new_signing_key};
use k256::ecdsa::SigningKey;
use num_bigint::BigInt;
use tempfile::TempDir;

/// Chain parameters that keep mining fast in tests
pub fn easy_params() -> ChainParams {
    ChainParams {
        difficulty: 1,
        ..ChainParams::default()
    }
}

/// Genesis-only chain over an in-memory ledger
pub fn test_chain() -> Result<Blockchain> {
    Blockchain::in_memory(easy_params())
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

/// Chain persisted under a fresh temporary directory
pub fn persistent_test_chain() -> Result<(Blockchain, sled::Db, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let db = sled::open(temp_dir.path().join("test_chain"))?;
    let chain = Blockchain::open(&db, easy_params())?;
    Ok((chain, db, temp_dir))
}

/// Fresh key whose address holds `amount` wei
pub fn funded_account(chain: &Blockchain, amount: u64) -> Result<(SigningKey, Address)> {
    let key = new_signing_key();
    let address = address_of_signer(&key);
    chain.balances().adjust(&address, &BigInt::from(amount))?;
    Ok((key, address))
}

/// Raw signed legacy transfer with the minimum gas limit
pub fn raw_transfer(
    key: &SigningKey,
    to: Option<&Address>,
    value: u64,
    nonce: u64,
) -> Result<String> {
    sign_legacy_transaction(
        key,
        &LegacyTransactionRequest {
            to: to.cloned(),
            value: Amount::from(value),
            data: Vec::new(),
            gas_limit: MIN_GAS_LIMIT,
            gas_price: 1,
            nonce,
            chain_id: easy_params().chain_id,
        },
    )
}
