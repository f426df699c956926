//! Client sockets and their read loops.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::ClientInner;
use crate::error::{Error, Result};
use crate::util::{bind_udp_socket, lock};

/// Largest UDP payload.
const MAX_DATAGRAM: usize = 65535;

type Slot = Mutex<Option<Arc<UdpSocket>>>;

/// One lazily bound socket per address family.
#[derive(Default)]
pub(super) struct Sockets {
    v4: Slot,
    v6: Slot,
}

impl Sockets {
    fn slot(&self, ipv6: bool) -> &Slot {
        if ipv6 { &self.v6 } else { &self.v4 }
    }

    /// Socket for `peer`'s address family, bound and given a read loop on first use.
    pub(super) fn get_or_bind(
        &self,
        peer: SocketAddr,
        inner: &Arc<ClientInner>,
    ) -> Result<Arc<UdpSocket>> {
        let ipv6 = peer.is_ipv6();
        let mut slot = lock(self.slot(ipv6));
        if let Some(socket) = slot.as_ref() {
            return Ok(Arc::clone(socket));
        }

        let local = if ipv6 {
            inner.config.bind_v6
        } else {
            inner.config.bind_v4
        };
        let socket = bind_udp_socket(local, inner.config.recv_buffer_size)
            .map(Arc::new)
            .map_err(|source| Error::Network { target: peer, source }.boxed())?;
        tracing::debug!(
            target: "snmp_requester::client",
            { local_addr = ?socket.local_addr().ok() },
            "socket bound"
        );

        tokio::spawn(read_loop(
            Arc::downgrade(inner),
            Arc::clone(&socket),
            ipv6,
            inner.shutdown.clone(),
        ));
        *slot = Some(Arc::clone(&socket));
        Ok(socket)
    }

    /// Forget `socket` if it is still the current one for its family.
    fn discard(&self, socket: &Arc<UdpSocket>, ipv6: bool) {
        let mut slot = lock(self.slot(ipv6));
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, socket)) {
            *slot = None;
        }
    }

    pub(super) fn clear(&self) {
        lock(&self.v4).take();
        lock(&self.v6).take();
    }
}

/// Receive datagrams on `socket` and hand them to the client until shutdown.
///
/// Holds only a weak reference so an abandoned client can be dropped while
/// the loop is parked in `recv_from`.
async fn read_loop(
    client: Weak<ClientInner>,
    socket: Arc<UdpSocket>,
    ipv6: bool,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        let Some(inner) = client.upgrade() else {
            break;
        };

        match received {
            Ok((len, peer)) => inner.dispatch(Bytes::copy_from_slice(&buf[..len]), peer),
            Err(err) => {
                inner.receive_failed(&socket, ipv6, &err);
                break;
            }
        }
    }
    tracing::trace!(target: "snmp_requester::client", { ipv6 }, "read loop stopped");
}

impl ClientInner {
    /// Retire a socket whose receive failed and fail everything still waiting.
    ///
    /// The next send to the same family binds a fresh socket.
    fn receive_failed(&self, socket: &Arc<UdpSocket>, ipv6: bool, err: &io::Error) {
        tracing::warn!(
            target: "snmp_requester::client",
            { error = %err },
            "socket receive failed, closing socket"
        );
        self.sockets.discard(socket, ipv6);
        let reason = format!("socket receive failed: {err}");
        self.correlator
            .reject_all(|_, _| Error::transport(reason.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientConfig};
    use crate::pdu::Pdu;

    #[tokio::test]
    async fn test_receive_failure_rejects_pending_and_rebinds() {
        let client = Client::new(ClientConfig::default());
        let inner = &client.inner;
        let peer: SocketAddr = "127.0.0.1:16100".parse().unwrap();

        let first = inner.sockets.get_or_bind(peer, inner).unwrap();
        let mut pdu = Pdu::get_request(0, &[]);
        let handle = inner.correlator.schedule(&mut pdu, peer).unwrap();

        inner.receive_failed(&first, false, &io::Error::other("connection reset"));

        match *handle.wait().await.unwrap_err() {
            Error::Transport { ref reason } => assert!(reason.contains("connection reset")),
            ref other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(inner.correlator.pending_count(), 0);

        let second = inner.sockets.get_or_bind(peer, inner).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &inner.sockets.get_or_bind(peer, inner).unwrap()));
    }

    #[tokio::test]
    async fn test_stale_socket_failure_keeps_current_socket() {
        let client = Client::new(ClientConfig::default());
        let inner = &client.inner;
        let peer: SocketAddr = "127.0.0.1:16100".parse().unwrap();

        let stale = inner.sockets.get_or_bind(peer, inner).unwrap();
        inner.sockets.discard(&stale, false);
        let current = inner.sockets.get_or_bind(peer, inner).unwrap();

        inner.receive_failed(&stale, false, &io::Error::other("late failure"));
        assert!(Arc::ptr_eq(&current, &inner.sockets.get_or_bind(peer, inner).unwrap()));
    }
}
