// This is the entry point for the node binary: one long-running command
// (startnode) and a handful of client commands that talk to a node over RPC
use clap::Parser;
use log::{error, warn, LevelFilter};
use num_bigint::BigUint;
use qryptum_chain::core::format_coins;
use qryptum_chain::rpc::{rpc_call, RpcHandler, RpcServer};
use qryptum_chain::storage::open_node_db;
use qryptum_chain::utils::{
    address_of_signer, new_signing_key, parse_hex_prefixed, signing_key_from_hex,
    signing_key_to_hex,
};
use qryptum_chain::{
    sign_legacy_transaction, Address, Block, Blockchain, Command, Config, LegacyTransactionRequest,
    Opt, PeerNetwork,
};
use serde_json::{json, Value};
use std::process;

fn main() {
    // I log at Info by default; RUST_LOG still wins when it is set
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    // Any failure is logged and turned into exit code 1
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode {
            config,
            node_address,
            rpc_address,
            peers,
            data_dir,
            difficulty,
        } => {
            // Defaults, then the TOML file, then the environment, then my flags
            let mut config = Config::load(config.as_deref())?;
            if let Some(addr) = node_address {
                config.node_address = addr;
            }
            if let Some(addr) = rpc_address {
                config.rpc_address = Some(addr);
            }
            if !peers.is_empty() {
                config.peers = peers;
            }
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(difficulty) = difficulty {
                config.difficulty = difficulty;
            }

            // Every node keeps its own database under <data_dir>/node_<port>/
            let params = config.chain_params()?;
            let db = open_node_db(&config.data_dir, config.node_port()?)?;
            let blockchain = Blockchain::open(&db, params)?;

            let network = PeerNetwork::new(blockchain.clone(), config.max_peers);
            network.listen(&config.node_address)?;
            for peer in &config.peers {
                // A peer that is down right now is not fatal; it can dial us later
                if let Err(e) = network.connect(peer) {
                    warn!("Could not connect to peer {peer}: {e}");
                }
            }

            let rpc_address = config.rpc_address()?;
            println!(
                "Node running: P2P on {}, RPC on {rpc_address}, {} blocks",
                config.node_address,
                blockchain.len()
            );
            RpcServer::new(RpcHandler::new(blockchain, Some(network))).run(&rpc_address)?;
        }
        Command::NewAccount => {
            let key = new_signing_key();
            println!("Address:     {}", address_of_signer(&key));
            println!("Private key: {}", signing_key_to_hex(&key));
        }
        Command::GetBalance { address, rpc } => {
            let address = Address::parse(&address)?;
            let balance = rpc_call(&rpc, "eth_getBalance", json!([address, "latest"]))?;
            let wei = parse_quantity(&balance)?;
            println!("Balance of {address}: {wei} wei ({} coins)", format_coins(&wei));
        }
        Command::Faucet { address, rpc } => {
            let address = Address::parse(&address)?;
            let tx_hash = rpc_call(&rpc, "node_faucet", json!([address]))?;
            println!("Faucet transaction: {}", as_text(&tx_hash));
        }
        Command::Mine { miner, rpc } => {
            let miner = Address::parse(&miner)?;
            match rpc_call(&rpc, "node_mine", json!([miner]))? {
                Value::Null => println!("Nothing to mine"),
                mined => println!(
                    "Mined block {} ({})",
                    as_text(&mined["blockNumber"]),
                    as_text(&mined["blockHash"])
                ),
            }
        }
        Command::Transfer {
            key,
            to,
            value,
            data,
            gas_limit,
            rpc,
        } => {
            let key = signing_key_from_hex(&key)?;
            let sender = address_of_signer(&key);
            let to = to.as_deref().map(Address::parse).transpose()?;
            let value: BigUint = value
                .parse()
                .map_err(|e| format!("Invalid value {value}: {e}"))?;
            let data = match data {
                Some(data) => parse_hex_prefixed(&data)?,
                None => Vec::new(),
            };
            if to.is_none() && data.is_empty() {
                return Err("A deployment needs --data bytecode".into());
            }

            // I ask the node for the nonce and chain id so the signature matches
            let nonce = rpc_call(&rpc, "eth_getTransactionCount", json!([sender]))?;
            let nonce = parse_quantity(&nonce)?;
            let chain_id = parse_quantity(&rpc_call(&rpc, "eth_chainId", json!([]))?)?;
            let raw = sign_legacy_transaction(
                &key,
                &LegacyTransactionRequest {
                    to,
                    value,
                    data,
                    gas_limit,
                    gas_price: 1,
                    nonce: u64::try_from(nonce)?,
                    chain_id: u64::try_from(chain_id)?,
                },
            )?;

            let tx_hash = rpc_call(&rpc, "eth_sendRawTransaction", json!([raw]))?;
            println!("Transaction: {}", as_text(&tx_hash));
            let receipt = rpc_call(&rpc, "eth_getTransactionReceipt", json!([tx_hash]))?;
            if let Some(contract) = receipt["contractAddress"].as_str() {
                println!("Contract address: {contract}");
            }
        }
        Command::SendRaw { raw, rpc } => {
            let tx_hash = rpc_call(&rpc, "eth_sendRawTransaction", json!([raw]))?;
            println!("Transaction: {}", as_text(&tx_hash));
        }
        Command::Printchain { rpc } => {
            let blocks = rpc_call(&rpc, "node_blocks", json!([]))?;
            let blocks: Vec<Block> = serde_json::from_value(blocks)?;
            for block in blocks {
                println!("Block #{}", block.get_index());
                println!("Pre block hash: {}", block.get_previous_hash());
                println!("Cur block hash: {}", block.get_hash());
                println!("Cur block timestamp: {}", block.get_timestamp());
                println!("Nonce: {}, reward: {} wei", block.get_nonce(), block.get_miner_reward());
                for tx in block.get_transactions() {
                    let from = tx.get_sender().map(Address::to_string);
                    let to = tx.get_receiver().map(Address::to_string);
                    println!(
                        "- Transaction {}: {} -> {}, value = {}",
                        tx.compute_hash()?,
                        from.as_deref().unwrap_or("system"),
                        to.as_deref().unwrap_or("none"),
                        tx.get_value()
                    );
                }
                println!()
            }
        }
        Command::Rpc {
            method,
            params,
            rpc,
        } => {
            let params: Value = serde_json::from_str(&params)?;
            let result = rpc_call(&rpc, &method, params)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn parse_quantity(value: &Value) -> Result<BigUint, Box<dyn std::error::Error>> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("Expected a hex quantity, got {value}"))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| format!("Invalid hex quantity {text}").into())
}

fn as_text(value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}
