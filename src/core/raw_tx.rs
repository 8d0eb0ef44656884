// Wallet interop: decode RLP-encoded signed Ethereum transactions (legacy,
// EIP-2930, EIP-1559) and recover their sender, and build signed legacy
// transactions for the CLI.

use crate::core::{Address, Amount};
use crate::error::{BlockchainError, Result};
use crate::utils::{parse_hex_prefixed, to_hex_prefixed};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{NameOrAddress, Signature, TransactionRequest, H160, U256};
use ethers_core::utils::get_contract_address;
use ethers_core::utils::rlp::Rlp;
use k256::ecdsa::SigningKey;
use num_bigint::BigUint;

/// Fields of a decoded signed transaction, sender already recovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub sender: Address,
    pub receiver: Option<Address>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub value: Amount,
    pub data: Vec<u8>,
    /// `r || s || v` with `v = 27 + recovery id`
    pub signature: Vec<u8>,
    pub chain_id: Option<u64>,
}

/// Unsigned legacy transaction, as built by the CLI
#[derive(Debug, Clone)]
pub struct LegacyTransactionRequest {
    pub to: Option<Address>,
    pub value: Amount,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub nonce: u64,
    pub chain_id: u64,
}

pub fn decode_raw_transaction(raw_hex: &str) -> Result<DecodedTransaction> {
    let bytes = parse_hex_prefixed(raw_hex.trim())
        .map_err(|e| BlockchainError::InvalidTransaction(e.to_string()))?;
    if bytes.is_empty() {
        return Err(BlockchainError::InvalidTransaction(
            "empty raw transaction".to_string(),
        ));
    }

    let rlp = Rlp::new(&bytes);
    let (tx, signature) = TypedTransaction::decode_signed(&rlp)
        .map_err(|e| BlockchainError::InvalidTransaction(format!("RLP decode failed: {e}")))?;
    let sender = signature
        .recover(tx.sighash())
        .map_err(|_| BlockchainError::InvalidSignature)?;

    let receiver = match tx.to() {
        Some(NameOrAddress::Address(to)) => Some(Address::from_bytes(to.as_bytes())),
        Some(NameOrAddress::Name(name)) => {
            return Err(BlockchainError::InvalidRecipient(format!(
                "unresolved name {name}"
            )))
        }
        None => None,
    };

    Ok(DecodedTransaction {
        sender: Address::from_bytes(sender.as_bytes()),
        receiver,
        nonce: u256_to_u64(tx.nonce().copied().unwrap_or_default(), "nonce")?,
        gas_limit: u256_to_u64(tx.gas().copied().unwrap_or_default(), "gas limit")?,
        value: u256_to_amount(tx.value().copied().unwrap_or_default()),
        data: tx.data().map(|data| data.to_vec()).unwrap_or_default(),
        signature: signature_bytes(&signature)?,
        chain_id: tx.chain_id().map(|id| id.as_u64()),
    })
}

/// CREATE address: `keccak256(rlp([sender, nonce]))[12..]`
pub fn contract_address(sender: &Address, nonce: u64) -> Result<Address> {
    let derived = get_contract_address(H160::from(sender.to_bytes()?), nonce);
    Ok(Address::from_bytes(derived.as_bytes()))
}

/// Sign an EIP-155 legacy transaction and return its `0x` RLP encoding
pub fn sign_legacy_transaction(
    key: &SigningKey,
    request: &LegacyTransactionRequest,
) -> Result<String> {
    let mut tx = TransactionRequest::new()
        .value(amount_to_u256(&request.value)?)
        .gas(request.gas_limit)
        .gas_price(request.gas_price)
        .nonce(request.nonce)
        .data(request.data.clone())
        .chain_id(request.chain_id);
    if let Some(to) = &request.to {
        tx = tx.to(H160::from(to.to_bytes()?));
    }

    let typed = TypedTransaction::Legacy(tx);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(typed.sighash().as_bytes())
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign transaction: {e}")))?;
    let rs = signature.to_bytes();
    let signature = Signature {
        r: U256::from_big_endian(&rs[..32]),
        s: U256::from_big_endian(&rs[32..]),
        v: u64::from(recovery_id.to_byte()) + 35 + 2 * request.chain_id,
    };
    Ok(to_hex_prefixed(typed.rlp_signed(&signature).as_ref()))
}

fn signature_bytes(signature: &Signature) -> Result<Vec<u8>> {
    let recovery = match signature.v {
        0 | 1 => signature.v,
        27 | 28 => signature.v - 27,
        v if v >= 35 => (v - 35) % 2,
        v => {
            return Err(BlockchainError::InvalidTransaction(format!(
                "unsupported signature v {v}"
            )))
        }
    };
    let mut bytes = vec![0u8; 65];
    signature.r.to_big_endian(&mut bytes[..32]);
    signature.s.to_big_endian(&mut bytes[32..64]);
    bytes[64] = 27 + recovery as u8;
    Ok(bytes)
}

fn u256_to_amount(value: U256) -> Amount {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    BigUint::from_bytes_be(&buf)
}

fn amount_to_u256(value: &Amount) -> Result<U256> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(BlockchainError::InvalidTransaction(format!(
            "value {value} exceeds 256 bits"
        )));
    }
    Ok(U256::from_big_endian(&bytes))
}

fn u256_to_u64(value: U256, field: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(BlockchainError::InvalidTransaction(format!(
            "{field} {value} exceeds 64 bits"
        )));
    }
    Ok(value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monetary::{DEFAULT_CHAIN_ID, MIN_GAS_LIMIT};
    use crate::utils::{address_of_signer, recover_address, signing_key_from_hex};
    use ethers_core::types::Eip1559TransactionRequest;

    fn test_key() -> SigningKey {
        signing_key_from_hex("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
            .unwrap()
    }

    fn transfer_request() -> LegacyTransactionRequest {
        LegacyTransactionRequest {
            to: Some(Address::parse("0x000000000000000000000000000000000000beef").unwrap()),
            value: BigUint::from(100u32),
            data: b"memo".to_vec(),
            gas_limit: MIN_GAS_LIMIT,
            gas_price: 1,
            nonce: 7,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }

    #[test]
    fn test_signed_legacy_transfer_decodes() {
        let key = test_key();
        let raw = sign_legacy_transaction(&key, &transfer_request()).unwrap();
        let decoded = decode_raw_transaction(&raw).unwrap();

        assert_eq!(decoded.sender, address_of_signer(&key));
        assert_eq!(
            decoded.receiver.unwrap().as_str(),
            "0x000000000000000000000000000000000000beef"
        );
        assert_eq!(decoded.nonce, 7);
        assert_eq!(decoded.gas_limit, MIN_GAS_LIMIT);
        assert_eq!(decoded.value, BigUint::from(100u32));
        assert_eq!(decoded.data, b"memo".to_vec());
        assert_eq!(decoded.chain_id, Some(DEFAULT_CHAIN_ID));
        assert_eq!(decoded.signature.len(), 65);
    }

    #[test]
    fn test_deployment_has_no_receiver() {
        let request = LegacyTransactionRequest {
            to: None,
            data: vec![0x60, 0x80, 0x60, 0x40],
            ..transfer_request()
        };
        let raw = sign_legacy_transaction(&test_key(), &request).unwrap();
        let decoded = decode_raw_transaction(&raw).unwrap();
        assert!(decoded.receiver.is_none());
        assert_eq!(decoded.data, vec![0x60, 0x80, 0x60, 0x40]);
    }

    #[test]
    fn test_eip1559_transaction_decodes() {
        let key = test_key();
        let request = Eip1559TransactionRequest::new()
            .to(H160::from_low_u64_be(0xbeef))
            .value(5u64)
            .gas(MIN_GAS_LIMIT)
            .max_fee_per_gas(2u64)
            .max_priority_fee_per_gas(1u64)
            .nonce(0u64)
            .chain_id(DEFAULT_CHAIN_ID);
        let typed = TypedTransaction::Eip1559(request);
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(typed.sighash().as_bytes())
            .unwrap();
        let rs = signature.to_bytes();
        let signature = Signature {
            r: U256::from_big_endian(&rs[..32]),
            s: U256::from_big_endian(&rs[32..]),
            v: u64::from(recovery_id.to_byte()),
        };
        let raw = to_hex_prefixed(typed.rlp_signed(&signature).as_ref());

        let decoded = decode_raw_transaction(&raw).unwrap();
        assert_eq!(decoded.sender, address_of_signer(&key));
        assert_eq!(decoded.value, BigUint::from(5u32));
    }

    #[test]
    fn test_recorded_signature_recovers_over_sighash() {
        let key = test_key();
        let raw = sign_legacy_transaction(&key, &transfer_request()).unwrap();
        let decoded = decode_raw_transaction(&raw).unwrap();

        let bytes = parse_hex_prefixed(&raw).unwrap();
        let (tx, _) = TypedTransaction::decode_signed(&Rlp::new(&bytes)).unwrap();
        let recovered = recover_address(&tx.sighash().0, &decoded.signature).unwrap();
        assert_eq!(recovered, decoded.sender);
    }

    #[test]
    fn test_garbage_is_invalid_transaction() {
        assert!(matches!(
            decode_raw_transaction("0xzz"),
            Err(BlockchainError::InvalidTransaction(_))
        ));
        assert!(matches!(
            decode_raw_transaction("0x"),
            Err(BlockchainError::InvalidTransaction(_))
        ));
        assert!(matches!(
            decode_raw_transaction("0xc0"),
            Err(BlockchainError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_contract_address_known_vectors() {
        let sender = Address::parse("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();
        assert_eq!(
            contract_address(&sender, 0).unwrap().as_str(),
            "0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"
        );
        assert_eq!(
            contract_address(&sender, 1).unwrap().as_str(),
            "0x343c43a37d37dff08ae8c4a11544c718abb4fcf8"
        );
    }

    #[test]
    fn test_contract_address_needs_account_bytes() {
        let sender = Address::parse("0xA").unwrap();
        assert!(matches!(
            contract_address(&sender, 0),
            Err(BlockchainError::InvalidAddress(_))
        ));
    }
}
