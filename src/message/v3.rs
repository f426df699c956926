//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SNMPv3Message ::= SEQUENCE {
//!     msgVersion INTEGER (3),
//!     msgGlobalData HeaderData,
//!     msgSecurityParameters OCTET STRING,
//!     msgData ScopedPduData
//! }
//! ```

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::pdu::Pdu;

/// Largest UDP payload over IPv4, advertised as msgMaxSize.
pub const MSG_MAX_SIZE: i32 = 65507;

/// Smallest msgMaxSize a conforming engine may advertise.
const MIN_MSG_MAX_SIZE: i32 = 484;

/// Security model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityModel {
    Usm = 3,
}

impl SecurityModel {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            3 => Some(Self::Usm),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// USM security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Level from the auth/priv bits of msgFlags. Priv without auth is invalid.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & MsgFlags::AUTH != 0, flags & MsgFlags::PRIV != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0,
            Self::AuthNoPriv => MsgFlags::AUTH,
            Self::AuthPriv => MsgFlags::AUTH | MsgFlags::PRIV,
        }
    }

    pub fn requires_auth(self) -> bool {
        self != Self::NoAuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

/// msgFlags octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    pub reportable: bool,
}

impl MsgFlags {
    pub const AUTH: u8 = 0x01;
    pub const PRIV: u8 = 0x02;
    pub const REPORTABLE: u8 = 0x04;

    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(Self {
            security_level: SecurityLevel::from_flags(byte)?,
            reportable: byte & Self::REPORTABLE != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = self.security_level.to_flags();
        if self.reportable {
            byte |= Self::REPORTABLE;
        }
        byte
    }
}

/// msgGlobalData (HeaderData).
#[derive(Debug, Clone, PartialEq)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size: MSG_MAX_SIZE,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model.as_i32());
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let msg_id = seq.read_integer()?;
        let msg_max_size = seq.read_integer()?;
        if msg_id < 0 || msg_max_size < MIN_MSG_MAX_SIZE {
            return Err(seq.malformed(DecodeErrorKind::IntegerOverflow));
        }

        let flags = seq.read_octet_string()?;
        let byte = match flags.as_ref() {
            [byte] => *byte,
            _ => return Err(seq.malformed(DecodeErrorKind::InvalidLength)),
        };
        let msg_flags = MsgFlags::from_byte(byte)
            .ok_or_else(|| seq.malformed(DecodeErrorKind::InvalidMsgFlags(byte)))?;

        let model = seq.read_integer()?;
        let msg_security_model = SecurityModel::from_i32(model)
            .ok_or_else(|| seq.malformed(DecodeErrorKind::UnknownSecurityModel(model)))?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// Scoped PDU: context engine id, context name and the PDU itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: impl Into<Bytes>, context_name: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Standalone encoding, the plaintext input to encryption.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.pdu.varbinds.len() * 32);
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

/// msgData: plaintext scoped PDU, or its encryption.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopedPduData {
    Plaintext(ScopedPdu),
    Encrypted(Bytes),
}

/// SNMPv3 message.
#[derive(Debug, Clone, PartialEq)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Raw msgSecurityParameters (a BER-encoded USM sequence).
    pub security_params: Bytes,
    pub data: ScopedPduData,
}

impl V3Message {
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, data: ScopedPduData) -> Self {
        Self {
            global_data,
            security_params,
            data,
        }
    }

    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    /// The PDU, when msgData is not encrypted.
    pub fn plaintext_pdu(&self) -> Option<&Pdu> {
        match &self.data {
            ScopedPduData::Plaintext(scoped) => Some(&scoped.pdu),
            ScopedPduData::Encrypted(_) => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(128 + self.security_params.len());
        buf.push_sequence(|buf| {
            match &self.data {
                ScopedPduData::Plaintext(scoped) => scoped.encode(buf),
                ScopedPduData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });
        buf.finish()
    }

    /// Decode the fields that follow msgVersion inside the message sequence.
    pub(crate) fn decode_after_version(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;
        let data = if global_data.msg_flags.security_level.requires_priv() {
            ScopedPduData::Encrypted(seq.read_octet_string()?)
        } else {
            ScopedPduData::Plaintext(ScopedPdu::decode(seq)?)
        };
        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }
}

/// Decode a standalone scoped PDU, as recovered by decryption.
pub(crate) fn decode_scoped_pdu(data: Bytes, target: SocketAddr) -> Result<ScopedPdu> {
    let mut dec = Decoder::with_target(data, target);
    ScopedPdu::decode(&mut dec)
}
