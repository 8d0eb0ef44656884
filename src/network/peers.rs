use crate::error::{BlockchainError, Result};
use crate::network::PeerMessage;
use log::{info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Write half of one open peer connection
pub struct PeerHandle {
    addr: SocketAddr,
    writer: Mutex<TcpStream>,
}

impl PeerHandle {
    fn new(addr: SocketAddr, stream: TcpStream) -> PeerHandle {
        PeerHandle {
            addr,
            writer: Mutex::new(stream),
        }
    }

    pub fn get_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Write one already-encoded JSON message
    fn send_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut stream = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        stream
            .write_all(bytes)
            .and_then(|_| stream.flush())
            .map_err(|e| BlockchainError::Network(format!("Failed to send to {}: {e}", self.addr)))
    }

    pub fn send(&self, message: &PeerMessage) -> Result<()> {
        self.send_bytes(&serde_json::to_vec(message)?)
    }

    fn close(&self) {
        let stream = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = stream.shutdown(Shutdown::Both);
    }
}

/// Set of open peer connections
///
/// Only tracks what is connected right now:
/// - Bounded by `max_connections`
/// - A peer whose write fails is evicted
/// - No reputation, banning, or reconnect logic
pub struct PeerSet {
    connected_peers: RwLock<HashMap<SocketAddr, Arc<PeerHandle>>>,
    max_connections: usize,
}

impl PeerSet {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connected_peers: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Register `stream` as the write half for `address`
    pub fn record_connection(
        &self,
        address: SocketAddr,
        stream: TcpStream,
    ) -> Result<Arc<PeerHandle>> {
        let mut connected = self
            .connected_peers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connected.len() >= self.max_connections {
            return Err(BlockchainError::Network(format!(
                "Connection limit of {} peers reached",
                self.max_connections
            )));
        }

        let handle = Arc::new(PeerHandle::new(address, stream));
        connected.insert(address, Arc::clone(&handle));
        info!("Connected to peer: {address}");
        Ok(handle)
    }

    /// Forget `address` and close its socket. Returns false if it was not connected.
    pub fn record_disconnection(&self, address: SocketAddr) -> bool {
        let removed = self
            .connected_peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&address);
        match removed {
            Some(handle) => {
                handle.close();
                info!("Disconnected from peer: {address}");
                true
            }
            None => false,
        }
    }

    pub fn get_connected_addresses(&self) -> Vec<SocketAddr> {
        self.connected_peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn get_connected_count(&self) -> usize {
        self.connected_peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn should_accept_connection(&self) -> bool {
        self.get_connected_count() < self.max_connections
    }

    /// Send `message` to every connected peer and return how many got it.
    /// Peers whose write fails are evicted; the rest still receive the message.
    pub fn broadcast(&self, message: &PeerMessage) -> Result<usize> {
        let bytes = serde_json::to_vec(message)?;
        let handles: Vec<Arc<PeerHandle>> = self
            .connected_peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut delivered = 0;
        for handle in handles {
            match handle.send_bytes(&bytes) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Dropping peer after failed {} broadcast: {e}", message.kind());
                    self.record_disconnection(handle.get_addr());
                }
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    // Connected client/server socket pair on loopback
    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn test_peer_set_creation() {
        let peers = PeerSet::new(8);
        assert_eq!(peers.get_connected_count(), 0);
        assert!(peers.should_accept_connection());
    }

    #[test]
    fn test_connection_tracking() {
        let peers = PeerSet::new(8);
        let (client, _server) = socket_pair();
        let addr = client.local_addr().unwrap();

        peers.record_connection(addr, client).unwrap();
        assert_eq!(peers.get_connected_count(), 1);
        assert_eq!(peers.get_connected_addresses(), vec![addr]);

        assert!(peers.record_disconnection(addr));
        assert!(!peers.record_disconnection(addr));
        assert_eq!(peers.get_connected_count(), 0);
    }

    #[test]
    fn test_connection_limits() {
        let peers = PeerSet::new(1);
        let (first, _keep_first) = socket_pair();
        let (second, _keep_second) = socket_pair();

        peers
            .record_connection(first.local_addr().unwrap(), first)
            .unwrap();
        assert!(!peers.should_accept_connection());
        assert!(matches!(
            peers.record_connection(second.local_addr().unwrap(), second),
            Err(BlockchainError::Network(_))
        ));
    }

    #[test]
    fn test_broadcast_skips_dead_peer() {
        let peers = PeerSet::new(8);
        let (live, mut live_remote) = socket_pair();
        let (dead, dead_remote) = socket_pair();
        let dead_addr = dead.local_addr().unwrap();

        peers
            .record_connection(live.local_addr().unwrap(), live)
            .unwrap();
        let dead_handle = peers.record_connection(dead_addr, dead).unwrap();
        drop(dead_remote);
        dead_handle.close();

        let message = PeerMessage::RawTransaction {
            raw_tx: "0x01".to_string(),
        };
        assert_eq!(peers.broadcast(&message).unwrap(), 1);
        assert_eq!(peers.get_connected_count(), 1);

        let expected = serde_json::to_vec(&message).unwrap();
        let mut received = vec![0u8; expected.len()];
        live_remote.read_exact(&mut received).unwrap();
        assert_eq!(received, expected);
    }
}
