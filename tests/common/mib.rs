//! In-process community agent.
//!
//! Answers GET, GETNEXT and GETBULK from a MIB map over a real localhost
//! socket and shuts down on drop.

use bytes::Bytes;
use snmp_requester::message::{CommunityMessage, Message};
use snmp_requester::{Oid, Pdu, PduType, Value, VarBind};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Read-only MIB view.
#[derive(Debug, Clone, Default)]
pub struct Mib {
    data: BTreeMap<Oid, Value>,
}

impl Mib {
    pub fn new(data: BTreeMap<Oid, Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, oid: &Oid) -> Value {
        self.data.get(oid).cloned().unwrap_or(Value::NoSuchInstance)
    }

    /// Lexicographic successor of `oid`, or endOfMibView.
    pub fn next(&self, oid: &Oid) -> VarBind {
        self.data
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
            .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
            .unwrap_or_else(|| VarBind::new(oid.clone(), Value::EndOfMibView))
    }

    fn bulk(&self, request: &Pdu) -> Vec<VarBind> {
        let non_repeaters = (request.non_repeaters() as usize).min(request.varbinds.len());
        let mut varbinds: Vec<VarBind> = request.varbinds[..non_repeaters]
            .iter()
            .map(|vb| self.next(&vb.oid))
            .collect();
        let mut cursors: Vec<Oid> = request.varbinds[non_repeaters..]
            .iter()
            .map(|vb| vb.oid.clone())
            .collect();
        if cursors.is_empty() {
            return varbinds;
        }
        for _ in 0..request.max_repetitions() {
            for cursor in cursors.iter_mut() {
                let vb = self.next(cursor);
                *cursor = vb.oid.clone();
                varbinds.push(vb);
            }
        }
        varbinds
    }

    /// The Response a v2c agent would send for `request`.
    pub fn respond(&self, request: &Pdu) -> Pdu {
        let varbinds = match request.pdu_type {
            PduType::GetRequest => request
                .varbinds
                .iter()
                .map(|vb| VarBind::new(vb.oid.clone(), self.get(&vb.oid)))
                .collect(),
            PduType::GetNextRequest => request.varbinds.iter().map(|vb| self.next(&vb.oid)).collect(),
            PduType::GetBulkRequest => self.bulk(request),
            _ => Vec::new(),
        };
        Pdu::response(request.request_id, varbinds)
    }
}

/// Agent answering community `public` on an ephemeral localhost port.
pub struct CommunityAgent {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl CommunityAgent {
    pub async fn spawn(mib: Mib) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("failed to bind agent socket");
        let addr = socket.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(serve(socket, mib, requests.clone(), cancel.clone()));

        Self {
            addr,
            requests,
            cancel,
            _task: task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of well-formed `public` requests answered so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for CommunityAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn serve(socket: UdpSocket, mib: Mib, requests: Arc<AtomicUsize>, cancel: CancellationToken) {
    let mut buf = vec![0u8; 65535];
    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(_) => break,
            },
        };
        let Ok(Message::Community(message)) = Message::decode(Bytes::copy_from_slice(&buf[..len]))
        else {
            continue;
        };
        if &message.community[..] != b"public" {
            continue;
        }
        requests.fetch_add(1, Ordering::SeqCst);
        let response = mib.respond(&message.pdu);
        let reply = CommunityMessage::new(message.version, message.community, response).encode();
        let _ = socket.send_to(&reply, peer).await;
    }
}
