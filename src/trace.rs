//! Optional packet tracing.
//!
//! When a [`PacketTrace`] is attached to a client, every datagram it sends or
//! receives is handed to the sink before transmission or dispatch. Tracing is
//! a diagnostic side channel and never changes protocol behavior.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::format::hex;
use crate::message::{Message, ScopedPduData};
use crate::pdu::Pdu;

/// Which way a traced datagram travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Outgoing => f.write_str("Outgoing"),
            Direction::Incoming => f.write_str("Incoming"),
        }
    }
}

/// Receiver of traced datagrams.
pub trait PacketTrace: Send + Sync + 'static {
    fn record(&self, direction: Direction, peer: SocketAddr, data: &[u8]);
}

/// Renders each datagram through `tracing` at target `snmp_requester::trace`.
///
/// Output is a `Direction (peer)` header, a one-line summary of the decoded
/// message and a hex dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPacketTrace;

impl PacketTrace for TracingPacketTrace {
    fn record(&self, direction: Direction, peer: SocketAddr, data: &[u8]) {
        let header = format!("{direction} ({peer})");
        tracing::debug!(
            target: "snmp_requester::trace",
            "\n{}\n{}\n{}\n{}",
            header,
            "-".repeat(header.len()),
            summarize(data),
            hex::Dump(data)
        );
    }
}

fn describe_pdu(pdu: &Pdu) -> String {
    let mut line = format!(
        "{} request_id={} varbinds={}",
        pdu.pdu_type,
        pdu.request_id,
        pdu.varbinds.len()
    );
    if pdu.is_error() {
        line.push_str(&format!(
            " error_status={} error_index={}",
            pdu.error_status_enum(),
            pdu.error_index
        ));
    }
    line
}

/// One-line description of an encoded message.
pub fn summarize(data: &[u8]) -> String {
    match Message::decode(Bytes::copy_from_slice(data)) {
        Ok(Message::Community(msg)) => format!(
            "{} community={} {}",
            msg.version,
            String::from_utf8_lossy(&msg.community),
            describe_pdu(&msg.pdu)
        ),
        Ok(Message::V3(msg)) => {
            let payload = match &msg.data {
                ScopedPduData::Plaintext(scoped) => describe_pdu(&scoped.pdu),
                ScopedPduData::Encrypted(ciphertext) => {
                    format!("encrypted scoped PDU ({} bytes)", ciphertext.len())
                }
            };
            format!(
                "v3 msg_id={} level={:?} {}",
                msg.msg_id(),
                msg.security_level(),
                payload
            )
        }
        Err(_) => format!("undecodable datagram ({} bytes)", data.len()),
    }
}
