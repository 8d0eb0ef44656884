// Canonical encodings shared by hashing, the peer wire format and block storage.
// Amounts always travel as decimal strings and byte fields as 0x-prefixed hex.
use crate::error::{BlockchainError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize data with bincode 2.0 (serde path, standard configuration)
pub fn serialize<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::serde::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data written by [`serialize`]
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let config = bincode::config::standard();
    let (data, _) = bincode::serde::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed (or bare) hex. The empty string and `0x` decode to no bytes.
pub fn parse_hex_prefixed(value: &str) -> Result<Vec<u8>> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(digits).map_err(|e| BlockchainError::Serialization(format!("Invalid hex: {e}")))
}

/// `0x`-prefixed hex quantity, as used by JSON-RPC numeric fields
pub fn to_hex_quantity(value: &num_bigint::BigUint) -> String {
    format!("0x{}", value.to_str_radix(16))
}

pub mod amount_string {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<BigUint>()
            .map_err(|e| de::Error::custom(format!("invalid amount {raw:?}: {e}")))
    }
}

pub mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex_prefixed(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hex_prefixed(&raw).map_err(de::Error::custom)
    }
}

pub mod option_hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&super::to_hex_prefixed(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| super::parse_hex_prefixed(&raw).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        #[serde(with = "amount_string")]
        amount: BigUint,
        #[serde(with = "hex_bytes")]
        payload: Vec<u8>,
        #[serde(with = "option_hex_bytes")]
        signature: Option<Vec<u8>>,
    }

    fn sample() -> Record {
        Record {
            amount: "100000000000000000000".parse().unwrap(),
            payload: vec![0xde, 0xad],
            signature: None,
        }
    }

    #[test]
    fn test_json_uses_decimal_amounts_and_hex_bytes() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"amount":"100000000000000000000","payload":"0xdead","signature":null}"#
        );
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_bincode_preserves_records() {
        let bytes = serialize(&sample()).expect("Serialization should work");
        let back: Record = deserialize(&bytes).expect("Deserialization should work");
        assert_eq!(back, sample());
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<Record> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_amounts() {
        let json = r#"{"amount":"-5","payload":"0x","signature":null}"#;
        assert!(serde_json::from_str::<Record>(json).is_err());
    }

    #[test]
    fn test_hex_quantity() {
        assert_eq!(to_hex_quantity(&BigUint::from(0u32)), "0x0");
        assert_eq!(to_hex_quantity(&BigUint::from(43210u32)), "0xa8ca");
        assert_eq!(parse_hex_prefixed("0x").unwrap(), Vec::<u8>::new());
    }
}
