//! BER encoding.
//!
//! [`EncodeBuf`] grows backwards: contents are pushed before their length and
//! tag, so every length is known when it is written. Constructed values must
//! therefore push their fields last-to-first.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Reverse-order encoding buffer.
#[derive(Default)]
pub struct EncodeBuf {
    // Stored back to front; reversed once in `finish`.
    rev: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rev: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.rev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rev.is_empty()
    }

    pub fn push_tag(&mut self, tag: u8) {
        self.rev.push(tag);
    }

    pub fn push_length(&mut self, len: usize) {
        let (octets, n) = encode_length(len);
        self.rev.extend(octets[..n].iter().rev());
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        self.rev.extend(data.iter().rev());
    }

    /// Push a constructed value whose contents are written by `f`.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Self)) {
        let start = self.rev.len();
        f(self);
        let len = self.rev.len() - start;
        self.push_length(len);
        self.push_tag(tag);
    }

    pub fn push_sequence(&mut self, f: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Push a primitive TLV.
    pub fn push_primitive(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_tag(tag);
    }

    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        // Minimal two's complement: drop leading bytes that only repeat the sign.
        let mut start = 0;
        while start < 3 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.push_primitive(tag::universal::INTEGER, &bytes[start..]);
    }

    /// Unsigned value with an application tag, prefixed with 0x00 when the high bit is set.
    pub fn push_unsigned(&mut self, tag: u8, value: u64) {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(7);
        let mut content = Vec::with_capacity(9);
        if bytes[first] & 0x80 != 0 {
            content.push(0);
        }
        content.extend_from_slice(&bytes[first..]);
        self.push_primitive(tag, &content);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    pub fn push_null(&mut self) {
        self.push_primitive(tag::universal::NULL, &[]);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, &oid.to_ber());
    }

    /// Finish encoding, returning the bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.rev.reverse();
        Bytes::from(self.rev)
    }
}
