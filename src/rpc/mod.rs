//! Ethereum-style JSON-RPC
//!
//! [`RpcHandler`] maps JSON-RPC 2.0 requests onto the node; [`RpcServer`]
//! serves it over a TCP stream of JSON objects and [`rpc_call`] is the
//! matching client used by the CLI.

pub mod handler;
pub mod server;

pub use handler::{RpcError, RpcHandler};
pub use server::{rpc_call, RpcServer};
