use crate::error::{BlockchainError, Result};
use crate::rpc::handler::{RpcError, RpcHandler, PARSE_ERROR};
use log::{error, info, warn};
use serde_json::{json, Deserializer, Value};
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;

/// JSON-stream RPC listener: each connection sends request objects and reads
/// back one response object per request, in order.
pub struct RpcServer {
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(handler: RpcHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    fn bind(addr: &str) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind RPC to {addr}: {e}")))
    }

    /// Serve on a background thread, returning the bound address
    pub fn serve(&self, addr: &str) -> Result<SocketAddr> {
        let listener = Self::bind(addr)?;
        let local_addr = listener.local_addr()?;
        info!("RPC server listening on {local_addr}");

        let handler = Arc::clone(&self.handler);
        thread::spawn(move || Self::accept_loop(handler, listener));
        Ok(local_addr)
    }

    /// Serve on the current thread until the listener fails
    pub fn run(&self, addr: &str) -> Result<()> {
        let listener = Self::bind(addr)?;
        info!("RPC server listening on {}", listener.local_addr()?);
        Self::accept_loop(Arc::clone(&self.handler), listener);
        Ok(())
    }

    fn accept_loop(handler: Arc<RpcHandler>, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = Arc::clone(&handler);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(&handler, stream) {
                            warn!("RPC connection closed with error: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting RPC connection: {e}");
                }
            }
        }
    }

    fn handle_connection(handler: &RpcHandler, stream: TcpStream) -> Result<()> {
        stream.set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))?;
        let mut writer = stream.try_clone()?;
        let requests = Deserializer::from_reader(BufReader::new(&stream)).into_iter::<Value>();

        for request in requests {
            let response = match request {
                Ok(request) => handler.handle(&request),
                Err(e) if e.is_eof() => break,
                Err(e) => {
                    let error = RpcError::new(PARSE_ERROR, format!("Parse error: {e}"));
                    write_message(&mut writer, &parse_error_response(&error))?;
                    break;
                }
            };
            write_message(&mut writer, &response)?;
        }

        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }
}

fn parse_error_response(error: &RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": Value::Null,
        "error": { "code": error.code, "message": error.message },
    })
}

fn write_message(stream: &mut TcpStream, message: &Value) -> Result<()> {
    serde_json::to_writer(&mut *stream, message)?;
    stream.flush()?;
    Ok(())
}

/// Send one request to the RPC server at `addr` and return its `result`.
/// An error object comes back as `BlockchainError::Network`.
pub fn rpc_call(addr: &str, method: &str, params: Value) -> Result<Value> {
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?
        .next()
        .ok_or_else(|| BlockchainError::Network(format!("Invalid address {addr}")))?;
    let mut stream =
        TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_WRITE_TIMEOUT))
            .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream.set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))?;

    let request = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
    write_message(&mut stream, &request)?;

    let response = Deserializer::from_reader(BufReader::new(&stream))
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| BlockchainError::Network(format!("{addr} closed without a response")))??;

    if let Some(error) = response.get("error") {
        return Err(BlockchainError::Network(format!(
            "RPC error {}: {}",
            error["code"],
            error["message"].as_str().unwrap_or_default()
        )));
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}
