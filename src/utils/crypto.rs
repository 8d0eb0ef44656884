use crate::core::Address;
use crate::error::{BlockchainError, Result};
use ethers_core::utils::keccak256;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use ring::digest::{Context, SHA256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a recoverable signature: r (32) || s (32) || v (1)
pub const SIGNATURE_LEN: usize = 65;

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn keccak_digest(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

pub fn new_signing_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

pub fn signing_key_from_hex(hex_key: &str) -> Result<SigningKey> {
    let digits = hex_key.trim().trim_start_matches("0x");
    let bytes = hex::decode(digits)
        .map_err(|e| BlockchainError::Crypto(format!("Invalid private key hex: {e}")))?;
    SigningKey::from_slice(&bytes)
        .map_err(|e| BlockchainError::Crypto(format!("Invalid private key: {e}")))
}

pub fn signing_key_to_hex(key: &SigningKey) -> String {
    format!("0x{}", hex::encode(key.to_bytes()))
}

/// Ethereum-style account address: last 20 bytes of keccak(uncompressed point)
pub fn address_from_key(key: &VerifyingKey) -> Address {
    let point = key.as_affine().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_bytes(&hash[12..])
}

pub fn address_of_signer(key: &SigningKey) -> Address {
    address_from_key(key.verifying_key())
}

/// Sign a 32-byte digest, producing `r || s || v` with `v = 27 + recovery id`
pub fn sign_digest(key: &SigningKey, digest: &[u8; 32]) -> Result<Vec<u8>> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign digest: {e}")))?;
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    Ok(bytes)
}

/// Recover the signing address from a digest and a 65-byte signature.
/// Accepts `v` as 0/1 or 27/28.
pub fn recover_address(digest: &[u8; 32], signature: &[u8]) -> Result<Address> {
    if signature.len() != SIGNATURE_LEN {
        return Err(BlockchainError::InvalidSignature);
    }
    let v = match signature[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        _ => return Err(BlockchainError::InvalidSignature),
    };
    let recovery_id = RecoveryId::from_byte(v).ok_or(BlockchainError::InvalidSignature)?;
    let signature =
        Signature::from_slice(&signature[..64]).map_err(|_| BlockchainError::InvalidSignature)?;
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|_| BlockchainError::InvalidSignature)?;
    Ok(address_from_key(&key))
}

/// Malformed signatures verify as false rather than erroring
pub fn verify_signature(address: &Address, digest: &[u8; 32], signature: &[u8]) -> bool {
    match recover_address(digest, signature) {
        Ok(recovered) => &recovered == address,
        Err(_) => false,
    }
}
