//! User-based Security Model (USM) parameters (RFC 3414).
//!
//! USM security parameters are encoded as an OCTET STRING containing
//! a BER-encoded SEQUENCE:
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, decode_length, tag};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;

/// USM security parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsmSecurityParams {
    /// Authoritative engine ID
    pub engine_id: Bytes,
    /// Engine boot count
    pub engine_boots: u32,
    /// Engine time (seconds since last boot)
    pub engine_time: u32,
    pub username: Bytes,
    /// HMAC digest, or empty
    pub auth_params: Bytes,
    /// Salt, or empty
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            ..Self::default()
        }
    }

    /// All-empty parameters, as sent in a discovery request.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Zero-filled auth params of `mac_len` bytes, overwritten once the MAC is known.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.engine_id.len() + self.auth_params.len());
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_integer(clamp_i32(self.engine_time));
            buf.push_integer(clamp_i32(self.engine_boots));
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode the content of msgSecurityParameters.
    pub fn decode(data: Bytes, target: SocketAddr) -> Result<Self> {
        let mut decoder = Decoder::with_target(data, target);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;
        let engine_boots = read_non_negative(&mut seq)?;
        let engine_time = read_non_negative(&mut seq)?;
        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate msgAuthenticationParameters in an encoded v3 message.
    ///
    /// Returns the offset of the content octets and their length.
    pub fn find_auth_params_offset(encoded_msg: &[u8]) -> Option<(usize, usize)> {
        let mut cursor = Cursor {
            data: encoded_msg,
            offset: 0,
        };
        cursor.enter(tag::universal::SEQUENCE)?;
        cursor.skip(tag::universal::INTEGER)?; // msgVersion
        cursor.skip(tag::universal::SEQUENCE)?; // msgGlobalData
        cursor.enter(tag::universal::OCTET_STRING)?; // msgSecurityParameters
        cursor.enter(tag::universal::SEQUENCE)?;
        cursor.skip(tag::universal::OCTET_STRING)?; // engine id
        cursor.skip(tag::universal::INTEGER)?; // boots
        cursor.skip(tag::universal::INTEGER)?; // time
        cursor.skip(tag::universal::OCTET_STRING)?; // user name
        let len = cursor.enter(tag::universal::OCTET_STRING)?;
        (cursor.offset + len <= encoded_msg.len()).then_some((cursor.offset, len))
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn read_non_negative(seq: &mut Decoder) -> Result<u32> {
    let raw = seq.read_integer()?;
    u32::try_from(raw).map_err(|_| seq.malformed(DecodeErrorKind::IntegerOverflow))
}

/// Forward-only TLV walker over raw message bytes.
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Cursor<'_> {
    /// Consume a tag and length, returning the content length.
    fn enter(&mut self, expected: u8) -> Option<usize> {
        if *self.data.get(self.offset)? != expected {
            return None;
        }
        let (len, consumed) =
            decode_length(self.data.get(self.offset + 1..)?, self.offset + 1, None).ok()?;
        self.offset += 1 + consumed;
        Some(len)
    }

    fn skip(&mut self, expected: u8) -> Option<()> {
        let len = self.enter(expected)?;
        self.offset += len;
        Some(())
    }
}
