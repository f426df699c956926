//! SNMP message wrappers.
//!
//! - [`CommunityMessage`] for v1/v2c
//! - [`V3Message`] for v3, with [`ScopedPdu`] and msgGlobalData

mod community;
mod v3;

pub use community::CommunityMessage;
pub(crate) use v3::decode_scoped_pdu;
pub use v3::{
    MSG_MAX_SIZE, MsgFlags, MsgGlobalData, ScopedPdu, ScopedPduData, SecurityLevel,
    SecurityModel, V3Message,
};

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::version::Version;

/// Any decoded SNMP message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_inner(Decoder::new(data))
    }

    /// Decode a datagram from `peer`, reporting it as the target of any error.
    pub fn decode_from(data: Bytes, peer: SocketAddr) -> Result<Self> {
        Self::decode_inner(Decoder::with_target(data, peer))
    }

    fn decode_inner(mut decoder: Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let raw = seq.read_integer()?;
        let version =
            Version::from_i32(raw).ok_or_else(|| seq.malformed(DecodeErrorKind::UnknownVersion(raw)))?;
        match version {
            Version::V1 | Version::V2c => {
                CommunityMessage::decode_after_version(&mut seq, version).map(Message::Community)
            }
            Version::V3 => V3Message::decode_after_version(&mut seq).map(Message::V3),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_version() {
        let data = Bytes::from_static(&[0x30, 0x03, 0x02, 0x01, 0x02]);
        assert!(Message::decode(data).is_err());
    }

    #[test]
    fn test_garbage() {
        assert!(Message::decode(Bytes::from_static(b"hello")).is_err());
    }
}
