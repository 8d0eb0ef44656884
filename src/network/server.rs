use crate::core::{Address, Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::{PeerMessage, PeerSet};
use log::{debug, error, info, warn};
use serde_json::Deserializer;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_MAX_PEERS: usize = 8;
const TCP_WRITE_TIMEOUT: u64 = 5000;

/// Peer-to-peer mesh around one shared [`Blockchain`].
///
/// Every connection, accepted or dialed, is a persistent duplex stream of JSON
/// messages served by its own reader thread. Cloning is cheap and shares the
/// same peer set.
#[derive(Clone)]
pub struct PeerNetwork {
    blockchain: Blockchain,
    peers: Arc<PeerSet>,
}

impl PeerNetwork {
    pub fn new(blockchain: Blockchain, max_peers: usize) -> Self {
        Self {
            blockchain,
            peers: Arc::new(PeerSet::new(max_peers)),
        }
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    /// Bind `addr` and accept peers on a background thread.
    /// Returns the bound address (useful with port 0).
    pub fn listen(&self, addr: &str) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;
        info!("P2P server listening on {local_addr}");

        let network = self.clone();
        thread::spawn(move || network.accept_loop(listener));
        Ok(local_addr)
    }

    fn accept_loop(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if !self.peers.should_accept_connection() {
                        let peer = stream
                            .peer_addr()
                            .map(|addr| addr.to_string())
                            .unwrap_or_default();
                        warn!("Rejecting connection from {peer}: connection limit reached");
                        continue;
                    }
                    if let Err(e) = self.attach(stream) {
                        error!("Failed to set up inbound peer: {e}");
                    }
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
    }

    /// Dial `addr` and join it to the mesh
    pub fn connect(&self, addr: &str) -> Result<SocketAddr> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?
            .next()
            .ok_or_else(|| BlockchainError::Network(format!("Invalid address {addr}")))?;
        let stream =
            TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_WRITE_TIMEOUT))
                .map_err(|e| {
                    BlockchainError::Network(format!("Failed to connect to {addr}: {e}"))
                })?;
        self.attach(stream)
    }

    /// Register a connection, start reading from it, then send our chain
    fn attach(&self, stream: TcpStream) -> Result<SocketAddr> {
        let peer_addr = stream.peer_addr()?;
        stream.set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))?;
        let reader = stream.try_clone()?;
        let handle = self.peers.record_connection(peer_addr, stream)?;

        let network = self.clone();
        thread::spawn(move || network.read_loop(reader, peer_addr));

        let handshake = PeerMessage::Chain {
            chain: self.blockchain.blocks(),
        };
        if let Err(e) = handle.send(&handshake) {
            self.peers.record_disconnection(peer_addr);
            return Err(e);
        }
        Ok(peer_addr)
    }

    fn read_loop(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let reader = BufReader::new(stream);
        let messages = Deserializer::from_reader(reader).into_iter::<PeerMessage>();

        for message in messages {
            match message {
                Ok(message) => {
                    debug!("Received {} from {peer_addr}", message.kind());
                    if let Err(e) = self.handle_message(message) {
                        // No NACK: the message is simply dropped
                        warn!("Dropped message from {peer_addr}: {e}");
                    }
                }
                Err(e) if e.is_eof() => break,
                Err(e) => {
                    // The stream cannot be resynchronized after malformed JSON
                    warn!("Malformed message from {peer_addr}: {e}");
                    break;
                }
            }
        }

        self.peers.record_disconnection(peer_addr);
    }

    /// Apply one peer message to the local chain
    pub fn handle_message(&self, message: PeerMessage) -> Result<()> {
        match message {
            PeerMessage::Chain { chain } => {
                let incoming = chain.len();
                if !self.blockchain.try_replace(chain)? {
                    debug!("Kept local chain over incoming chain of {incoming} blocks");
                }
            }
            PeerMessage::Transaction { transaction } => {
                self.blockchain.admit(transaction)?;
            }
            PeerMessage::RawTransaction { raw_tx } => {
                self.blockchain.submit_signed(&raw_tx)?;
            }
            PeerMessage::MineRequest { miner_address } => {
                let Some(miner) = miner_address else {
                    debug!("Ignoring mine request without a miner address");
                    return Ok(());
                };
                // Mine off the reader thread so the connection keeps draining
                let blockchain = self.blockchain.clone();
                thread::spawn(move || {
                    if let Err(e) = blockchain.mine_pending(&miner) {
                        error!("Requested mining for {miner} failed: {e}");
                    }
                });
            }
        }
        Ok(())
    }

    fn broadcast(&self, message: &PeerMessage) -> Result<usize> {
        let delivered = self.peers.broadcast(message)?;
        debug!("Broadcast {} to {delivered} peers", message.kind());
        Ok(delivered)
    }

    pub fn broadcast_chain(&self) -> Result<usize> {
        self.broadcast(&PeerMessage::Chain {
            chain: self.blockchain.blocks(),
        })
    }

    pub fn broadcast_transaction(&self, transaction: &Transaction) -> Result<usize> {
        self.broadcast(&PeerMessage::Transaction {
            transaction: transaction.clone(),
        })
    }

    pub fn broadcast_raw_transaction(&self, raw_tx: &str) -> Result<usize> {
        self.broadcast(&PeerMessage::RawTransaction {
            raw_tx: raw_tx.to_string(),
        })
    }

    pub fn broadcast_mine_request(&self, miner: &Address) -> Result<usize> {
        self.broadcast(&PeerMessage::MineRequest {
            miner_address: Some(miner.clone()),
        })
    }

    pub fn peer_count(&self) -> usize {
        self.peers.get_connected_count()
    }

    pub fn connected_peers(&self) -> Vec<SocketAddr> {
        self.peers.get_connected_addresses()
    }
}
