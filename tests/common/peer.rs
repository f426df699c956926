//! Raw UDP peer for scripted exchanges.

use bytes::Bytes;
use snmp_requester::message::{CommunityMessage, Message};
use snmp_requester::{Direction, PacketTrace};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;

/// A localhost socket driven step by step by the test.
pub struct UdpPeer {
    socket: UdpSocket,
}

impl UdpPeer {
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("failed to bind peer socket");
        Self { socket }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    /// Next datagram; panics after five seconds of silence.
    pub async fn recv(&self) -> (Bytes, SocketAddr) {
        let mut buf = vec![0u8; 65535];
        let (len, from) = tokio::time::timeout(Duration::from_secs(5), self.socket.recv_from(&mut buf))
            .await
            .expect("peer timed out waiting for a datagram")
            .expect("peer receive failed");
        buf.truncate(len);
        (Bytes::from(buf), from)
    }

    pub async fn send(&self, data: &[u8], to: SocketAddr) {
        self.socket.send_to(data, to).await.expect("peer send failed");
    }
}

/// Decode a datagram that must be a v1/v2c message.
pub fn community_request(data: &Bytes) -> CommunityMessage {
    match Message::decode(data.clone()).expect("undecodable request") {
        Message::Community(message) => message,
        other => panic!("expected community message, got {other:?}"),
    }
}

/// Packet trace sink remembering direction and peer of each datagram.
#[derive(Clone, Default)]
pub struct Collector(pub Arc<Mutex<Vec<(Direction, SocketAddr)>>>);

impl Collector {
    pub fn records(&self) -> Vec<(Direction, SocketAddr)> {
        self.0.lock().unwrap().clone()
    }
}

impl PacketTrace for Collector {
    fn record(&self, direction: Direction, peer: SocketAddr, _data: &[u8]) {
        self.0.lock().unwrap().push((direction, peer));
    }
}
