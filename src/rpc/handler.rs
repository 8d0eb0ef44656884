use crate::core::monetary::BLOCK_GAS_LIMIT;
use crate::core::{
    Address, Block, Blockchain, Transaction, TransactionLocation, GAS_UNIT_PRICE, MIN_GAS_LIMIT,
};
use crate::error::BlockchainError;
use crate::network::PeerNetwork;
use crate::utils::{parse_hex_prefixed, to_hex_prefixed, to_hex_quantity};
use log::{debug, warn};
use serde_json::{json, Map, Value};
use std::fmt;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SERVER_ERROR: i64 = -32000;
pub const NOT_FOUND: i64 = -32001;

/// `balanceOf(address)` selector, the only call `eth_call` answers
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

const EMPTY_UNCLES_HASH: &str =
    "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347";
const EMPTY_TRIE_ROOT: &str = "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421";
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not supported: {method}"))
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(NOT_FOUND, message)
    }

    fn to_value(&self) -> Value {
        json!({ "code": self.code, "message": self.message })
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl From<BlockchainError> for RpcError {
    fn from(error: BlockchainError) -> Self {
        let code = match error {
            BlockchainError::NotFound(_) => NOT_FOUND,
            _ => SERVER_ERROR,
        };
        RpcError::new(code, error.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(error: serde_json::Error) -> Self {
        BlockchainError::from(error).into()
    }
}

type RpcResult = std::result::Result<Value, RpcError>;

/// Transport-independent JSON-RPC 2.0 dispatcher over the node.
///
/// Wallet-facing `eth_*`/`net_*` methods plus `node_*` methods for mining,
/// the faucet and chain inspection. When a [`PeerNetwork`] is attached,
/// accepted transactions and mined chains are relayed to peers.
#[derive(Clone)]
pub struct RpcHandler {
    blockchain: Blockchain,
    network: Option<PeerNetwork>,
}

impl RpcHandler {
    pub fn new(blockchain: Blockchain, network: Option<PeerNetwork>) -> Self {
        Self {
            blockchain,
            network,
        }
    }

    /// Answer one request object or a batch array
    pub fn handle(&self, request: &Value) -> Value {
        match request {
            Value::Array(batch) if batch.is_empty() => {
                error_response(Value::Null, &RpcError::new(INVALID_REQUEST, "Empty batch"))
            }
            Value::Array(batch) => Value::Array(batch.iter().map(|r| self.handle_one(r)).collect()),
            single => self.handle_one(single),
        }
    }

    fn handle_one(&self, request: &Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let Some(method) = request.get("method").and_then(Value::as_str) else {
            return error_response(id, &RpcError::new(INVALID_REQUEST, "Missing method"));
        };
        let no_params = Value::Array(Vec::new());
        let params = request.get("params").unwrap_or(&no_params);

        debug!("RPC {method} {params}");
        match self.dispatch(method, params) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(e) => {
                warn!("RPC {method} failed: {e}");
                error_response(id, &e)
            }
        }
    }

    pub fn dispatch(&self, method: &str, params: &Value) -> RpcResult {
        match method {
            "eth_chainId" => Ok(json!(quantity(self.blockchain.params().chain_id))),
            "net_version" => Ok(json!(self.blockchain.params().chain_id.to_string())),
            "eth_blockNumber" => {
                let latest = self.blockchain.len().saturating_sub(1) as u64;
                Ok(json!(quantity(latest)))
            }
            "eth_accounts" => Ok(json!([])),
            "eth_gasPrice" => Ok(json!(quantity(GAS_UNIT_PRICE))),
            "eth_estimateGas" => {
                if !param(params, 0).is_some_and(Value::is_object) {
                    return Err(RpcError::invalid_params("Transaction data required"));
                }
                Ok(json!(quantity(MIN_GAS_LIMIT)))
            }
            "eth_getBalance" => {
                let address = address_param(params, 0)?;
                Ok(json!(to_hex_quantity(&self.blockchain.balance(&address)?)))
            }
            "eth_getCode" => {
                let address = address_param(params, 0)?;
                let code = self.blockchain.contracts().code(&address);
                Ok(json!(to_hex_prefixed(&code)))
            }
            "eth_getTransactionCount" => {
                let address = address_param(params, 0)?;
                Ok(json!(quantity(self.blockchain.transaction_count(&address)?)))
            }
            "eth_sendRawTransaction" => self.send_raw_transaction(params),
            "eth_getTransactionReceipt" => self.transaction_receipt(params),
            "eth_getBlockByNumber" => {
                let tag = string_param(params, 0)?;
                let block = self.block_by_tag(tag)?;
                self.block_view(&block, bool_param(params, 1))
            }
            "eth_getBlockByHash" => {
                let hash = string_param(params, 0)?;
                let block = self
                    .blockchain
                    .block_by_hash(hash)
                    .ok_or_else(|| RpcError::not_found(format!("Block {hash} not found")))?;
                self.block_view(&block, bool_param(params, 1))
            }
            "eth_call" => self.call(params),
            "eth_getLogs" => Ok(serde_json::to_value(self.blockchain.contracts().logs())?),
            "node_mine" => self.mine(params),
            "node_requestMining" => {
                let miner = address_param(params, 0)?;
                let reached = match &self.network {
                    Some(network) => network.broadcast_mine_request(&miner)?,
                    None => 0,
                };
                Ok(json!(quantity(reached as u64)))
            }
            "node_faucet" => {
                let address = address_param(params, 0)?;
                Ok(json!(self.blockchain.faucet(&address)?))
            }
            "node_submitTransaction" => self.submit_transaction(params),
            "node_blocks" => Ok(serde_json::to_value(self.blockchain.blocks())?),
            "node_transactions" => transaction_list(&self.blockchain.all_transactions()),
            "node_pendingTransactions" => {
                transaction_list(&self.blockchain.pending_transactions())
            }
            other => Err(RpcError::method_not_found(other)),
        }
    }

    fn send_raw_transaction(&self, params: &Value) -> RpcResult {
        let raw_tx = string_param(params, 0)?;
        let outcome = self.blockchain.submit_signed(raw_tx)?;
        if let Some(network) = &self.network {
            if let Err(e) = network.broadcast_raw_transaction(raw_tx) {
                warn!("Failed to relay raw transaction {}: {e}", outcome.tx_hash);
            }
        }
        Ok(json!(outcome.tx_hash))
    }

    fn submit_transaction(&self, params: &Value) -> RpcResult {
        let raw = param(params, 0)
            .ok_or_else(|| RpcError::invalid_params("Transaction object required"))?;
        let transaction: Transaction = serde_json::from_value(raw.clone())
            .map_err(|e| RpcError::invalid_params(format!("Malformed transaction: {e}")))?;

        let tx_hash = self.blockchain.admit(transaction.clone())?;
        if let Some(network) = &self.network {
            if let Err(e) = network.broadcast_transaction(&transaction) {
                warn!("Failed to relay transaction {tx_hash}: {e}");
            }
        }
        Ok(json!(tx_hash))
    }

    fn mine(&self, params: &Value) -> RpcResult {
        let miner = address_param(params, 0)?;
        let Some(block_hash) = self.blockchain.mine_pending(&miner)? else {
            return Ok(Value::Null);
        };
        if let Some(network) = &self.network {
            if let Err(e) = network.broadcast_chain() {
                warn!("Failed to broadcast chain after mining {block_hash}: {e}");
            }
        }
        let block_number = self.blockchain.len().saturating_sub(1) as u64;
        Ok(json!({
            "blockHash": format!("0x{block_hash}"),
            "blockNumber": quantity(block_number),
        }))
    }

    fn transaction_receipt(&self, params: &Value) -> RpcResult {
        let wanted = string_param(params, 0)?;
        let (tx, location) = self
            .blockchain
            .find_transaction(wanted)
            .ok_or_else(|| RpcError::not_found(format!("Transaction {wanted} not found")))?;
        let tx_hash = tx.compute_hash()?;

        let (block_hash, block_number) = match location {
            TransactionLocation::Pending => (Value::Null, Value::Null),
            TransactionLocation::Sealed {
                block_index,
                block_hash,
            } => (
                json!(format!("0x{block_hash}")),
                json!(quantity(block_index)),
            ),
        };
        let contract_address = self.blockchain.contracts().address_for_transaction(&tx_hash);

        Ok(json!({
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": block_hash,
            "blockNumber": block_number,
            "from": tx.get_sender(),
            "to": tx.get_receiver(),
            "gasUsed": quantity(MIN_GAS_LIMIT),
            "cumulativeGasUsed": quantity(MIN_GAS_LIMIT),
            "status": "0x1",
            "logs": [],
            "logsBloom": "0x00",
            "contractAddress": contract_address,
        }))
    }

    fn call(&self, params: &Value) -> RpcResult {
        let call = param(params, 0)
            .filter(|call| call.is_object())
            .ok_or_else(|| RpcError::invalid_params("Call object required"))?;
        let to = call
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("Contract address required"))?;
        let contract_address = Address::parse(to)?;
        if self.blockchain.contracts().get(&contract_address).is_none() {
            return Err(RpcError::not_found(format!("Contract {to} not found")));
        }

        let data = call
            .get("data")
            .or_else(|| call.get("input"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let input = parse_hex_prefixed(data)
            .map_err(|_| RpcError::invalid_params(format!("Call data {data} is not hex")))?;
        if !input.starts_with(&BALANCE_OF_SELECTOR) {
            return Err(RpcError::new(SERVER_ERROR, "Method not supported"));
        }

        // Argument is a left-padded 32-byte word; the address is its last 20 bytes
        let argument = &input[BALANCE_OF_SELECTOR.len()..];
        if argument.len() != 32 {
            return Err(RpcError::invalid_params(format!(
                "balanceOf takes one 32-byte word, got {} bytes",
                argument.len()
            )));
        }
        let holder = Address::from_bytes(&argument[12..]).to_string();
        let balance = self
            .blockchain
            .contracts()
            .read_storage(&contract_address, &holder)
            .unwrap_or_else(|| "0x0".to_string());
        Ok(json!(balance))
    }

    fn block_by_tag(&self, tag: &str) -> std::result::Result<Block, RpcError> {
        let block = match tag {
            "latest" | "pending" => self.blockchain.tip(),
            "earliest" => self.blockchain.block_by_number(0),
            number => {
                let digits = number.strip_prefix("0x").unwrap_or(number);
                let index = u64::from_str_radix(digits, 16).map_err(|_| {
                    RpcError::invalid_params(format!("Invalid block number {number}"))
                })?;
                self.blockchain.block_by_number(index)
            }
        };
        block.ok_or_else(|| RpcError::not_found(format!("Block {tag} not found")))
    }

    fn block_view(&self, block: &Block, full_transactions: bool) -> RpcResult {
        let difficulty = u64::from(self.blockchain.params().difficulty);
        let size = serde_json::to_vec(block)?.len() as u64;
        let gas_used: u64 = block
            .get_transactions()
            .iter()
            .map(Transaction::get_gas_limit)
            .sum();
        let transactions = if full_transactions {
            transaction_list(block.get_transactions())?
        } else {
            let hashes = block
                .get_transactions()
                .iter()
                .map(Transaction::compute_hash)
                .collect::<Result<Vec<_>, _>>()?;
            json!(hashes)
        };
        let seconds = u64::try_from(block.get_timestamp()).unwrap_or_default() / 1000;

        Ok(json!({
            "number": quantity(block.get_index()),
            "hash": format!("0x{}", block.get_hash()),
            "parentHash": format!("0x{}", block.get_previous_hash()),
            "nonce": quantity(block.get_nonce()),
            "sha3Uncles": EMPTY_UNCLES_HASH,
            "logsBloom": "0x00",
            "transactionsRoot": EMPTY_TRIE_ROOT,
            "stateRoot": EMPTY_TRIE_ROOT,
            "miner": ZERO_ADDRESS,
            "minerReward": to_hex_quantity(block.get_miner_reward()),
            "difficulty": quantity(difficulty),
            "totalDifficulty": quantity(difficulty.saturating_mul(block.get_index())),
            "size": quantity(size),
            "gasLimit": quantity(BLOCK_GAS_LIMIT),
            "gasUsed": quantity(gas_used),
            "timestamp": quantity(seconds),
            "transactions": transactions,
            "uncles": [],
        }))
    }
}

fn error_response(id: Value, error: &RpcError) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error.to_value() })
}

fn quantity(value: u64) -> String {
    format!("0x{value:x}")
}

fn param(params: &Value, index: usize) -> Option<&Value> {
    params.as_array().and_then(|params| params.get(index))
}

fn string_param(params: &Value, index: usize) -> std::result::Result<&str, RpcError> {
    param(params, index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params(format!("Missing string parameter {index}")))
}

fn address_param(params: &Value, index: usize) -> std::result::Result<Address, RpcError> {
    let raw = string_param(params, index)?;
    Address::parse(raw).map_err(|e| RpcError::invalid_params(e.to_string()))
}

fn bool_param(params: &Value, index: usize) -> bool {
    param(params, index).and_then(Value::as_bool).unwrap_or(false)
}

/// Transactions as JSON objects with their hash attached
fn transaction_list(transactions: &[Transaction]) -> RpcResult {
    let views = transactions
        .iter()
        .map(|tx| {
            let mut view = match serde_json::to_value(tx)? {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            view.insert("hash".to_string(), json!(tx.compute_hash()?));
            Ok(Value::Object(view))
        })
        .collect::<std::result::Result<Vec<_>, RpcError>>()?;
    Ok(Value::Array(views))
}
