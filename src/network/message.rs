use crate::core::{Address, Block, Transaction};
use serde::{Deserialize, Serialize};

/// Peer wire message. Serialized as a JSON object with a `type` discriminator,
/// e.g. `{"type":"RAW_TRANSACTION","rawTx":"0x..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    /// Full chain; sent on every new connection and after local mining
    Chain { chain: Vec<Block> },
    Transaction { transaction: Transaction },
    RawTransaction {
        #[serde(rename = "rawTx")]
        raw_tx: String,
    },
    MineRequest {
        #[serde(rename = "minerAddress", default)]
        miner_address: Option<Address>,
    },
}

impl PeerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Chain { .. } => "CHAIN",
            PeerMessage::Transaction { .. } => "TRANSACTION",
            PeerMessage::RawTransaction { .. } => "RAW_TRANSACTION",
            PeerMessage::MineRequest { .. } => "MINE_REQUEST",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape_uses_type_tag() {
        let message = PeerMessage::RawTransaction {
            raw_tx: "0xf86c".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "RAW_TRANSACTION", "rawTx": "0xf86c"})
        );

        let message = PeerMessage::MineRequest {
            miner_address: Some(Address::parse("0xAbC").unwrap()),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "MINE_REQUEST", "minerAddress": "0xabc"})
        );
    }

    #[test]
    fn test_mine_request_without_miner_parses() {
        let message: PeerMessage = serde_json::from_str(r#"{"type":"MINE_REQUEST"}"#).unwrap();
        assert!(matches!(
            message,
            PeerMessage::MineRequest {
                miner_address: None
            }
        ));
    }

    #[test]
    fn test_chain_message_carries_blocks() {
        let genesis = Block::genesis().unwrap();
        let encoded = serde_json::to_string(&PeerMessage::Chain {
            chain: vec![genesis.clone()],
        })
        .unwrap();
        assert!(encoded.starts_with(r#"{"type":"CHAIN","chain":[{"#));

        match serde_json::from_str::<PeerMessage>(&encoded).unwrap() {
            PeerMessage::Chain { chain } => assert_eq!(chain, vec![genesis]),
            other => panic!("unexpected message {}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<PeerMessage>(r#"{"type":"PING"}"#).is_err());
    }
}
