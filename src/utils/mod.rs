//! Utility functions and helpers
//!
//! Digests, secp256k1 signing and recovery, timestamps, and the canonical
//! encodings used for hashing, the wire format and block storage.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    address_from_key, address_of_signer, current_timestamp, keccak_digest, new_signing_key,
    recover_address, sha256_digest, sign_digest, signing_key_from_hex, signing_key_to_hex,
    verify_signature, SIGNATURE_LEN,
};

pub use serialization::{
    amount_string, deserialize, hex_bytes, option_hex_bytes, parse_hex_prefixed, serialize,
    to_hex_prefixed, to_hex_quantity,
};
