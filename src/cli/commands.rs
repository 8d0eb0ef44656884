use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_RPC_ADDR: &str = "127.0.0.1:6001";

#[derive(Debug, Parser)]
#[command(name = "qryptum-chain", about = "Proof-of-work account ledger node")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a node serving P2P and JSON-RPC")]
    StartNode {
        #[arg(long, help = "TOML configuration file")]
        config: Option<PathBuf>,
        #[arg(long = "node-address", help = "P2P listen address, e.g. 127.0.0.1:5001")]
        node_address: Option<String>,
        #[arg(long = "rpc-address", help = "RPC listen address (default: P2P port + 1000)")]
        rpc_address: Option<String>,
        #[arg(long = "peer", help = "Peer to connect to on startup (repeatable)")]
        peers: Vec<String>,
        #[arg(long = "data-dir", help = "Directory holding node_<port>/ state")]
        data_dir: Option<PathBuf>,
        #[arg(long, help = "Leading zero hex digits required of block hashes")]
        difficulty: Option<u32>,
    },
    #[command(name = "newaccount", about = "Generate a secp256k1 key and its address")]
    NewAccount,
    #[command(name = "getbalance", about = "Get the balance of an address in wei")]
    GetBalance {
        #[arg(help = "The account address")]
        address: String,
        #[arg(long, default_value = DEFAULT_RPC_ADDR, help = "Node RPC address")]
        rpc: String,
    },
    #[command(name = "faucet", about = "Grant the faucet amount to an address")]
    Faucet {
        #[arg(help = "The account address to fund")]
        address: String,
        #[arg(long, default_value = DEFAULT_RPC_ADDR, help = "Node RPC address")]
        rpc: String,
    },
    #[command(name = "mine", about = "Seal pending transactions into a block")]
    Mine {
        #[arg(help = "Address to receive the mining reward")]
        miner: String,
        #[arg(long, default_value = DEFAULT_RPC_ADDR, help = "Node RPC address")]
        rpc: String,
    },
    #[command(name = "transfer", about = "Sign and submit a transfer or contract deployment")]
    Transfer {
        #[arg(long, help = "Sender private key as hex")]
        key: String,
        #[arg(long, help = "Receiver address; omit to deploy --data as a contract")]
        to: Option<String>,
        #[arg(long, default_value = "0", help = "Amount to send in wei")]
        value: String,
        #[arg(long, help = "Payload or contract bytecode as hex")]
        data: Option<String>,
        #[arg(long = "gas-limit", default_value_t = 21_000, help = "Gas limit")]
        gas_limit: u64,
        #[arg(long, default_value = DEFAULT_RPC_ADDR, help = "Node RPC address")]
        rpc: String,
    },
    #[command(name = "sendraw", about = "Submit an already signed raw transaction")]
    SendRaw {
        #[arg(help = "0x-prefixed RLP-encoded signed transaction")]
        raw: String,
        #[arg(long, default_value = DEFAULT_RPC_ADDR, help = "Node RPC address")]
        rpc: String,
    },
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain {
        #[arg(long, default_value = DEFAULT_RPC_ADDR, help = "Node RPC address")]
        rpc: String,
    },
    #[command(name = "rpc", about = "Call any JSON-RPC method")]
    Rpc {
        #[arg(help = "Method name, e.g. eth_blockNumber")]
        method: String,
        #[arg(help = "Params as a JSON array", default_value = "[]")]
        params: String,
        #[arg(long, default_value = DEFAULT_RPC_ADDR, help = "Node RPC address")]
        rpc: String,
    },
}
