//! BER length octets (X.690 8.1.3).
//!
//! Short form for lengths up to 127, long form with up to 4 length octets
//! otherwise. The indefinite form (0x80) is rejected.

use std::net::SocketAddr;

use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, Result, UNKNOWN_TARGET};

/// Largest content length accepted when decoding.
pub const MAX_LENGTH: usize = 0x200000;

/// Encode a length as BER length octets, returned in wire order.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];
    if len <= 0x7F {
        buf[0] = len as u8;
        return (buf, 1);
    }
    let octets = (usize::BITS / 8 - len.leading_zeros() / 8) as usize;
    let octets = octets.min(4);
    buf[0] = 0x80 | octets as u8;
    for i in 0..octets {
        buf[1 + i] = (len >> (8 * (octets - 1 - i))) as u8;
    }
    (buf, 1 + octets)
}

/// Decode length octets, returning `(length, octets consumed)`.
///
/// `base_offset` only feeds diagnostics.
pub fn decode_length(
    data: &[u8],
    base_offset: usize,
    target: Option<SocketAddr>,
) -> Result<(usize, usize)> {
    let fail = |kind: DecodeErrorKind| {
        tracing::debug!(target: "snmp_requester::ber", { snmp.offset = base_offset, kind = %kind }, "bad length octets");
        Error::MalformedResponse {
            target: target.unwrap_or(UNKNOWN_TARGET),
        }
        .boxed()
    };

    let Some(&first) = data.first() else {
        return Err(fail(DecodeErrorKind::TruncatedData));
    };
    if first == 0x80 {
        return Err(fail(DecodeErrorKind::IndefiniteLength));
    }
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let octets = (first & 0x7F) as usize;
    if octets > 4 {
        return Err(fail(DecodeErrorKind::LengthTooLong { octets }));
    }
    let Some(body) = data.get(1..1 + octets) else {
        return Err(fail(DecodeErrorKind::TruncatedData));
    };
    let len = body.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len > MAX_LENGTH {
        return Err(fail(DecodeErrorKind::LengthExceedsMax {
            length: len,
            max: MAX_LENGTH,
        }));
    }
    Ok((len, 1 + octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(len: usize) -> Vec<u8> {
        let (buf, n) = encode_length(len);
        buf[..n].to_vec()
    }

    #[test]
    fn short_and_long_forms() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(127), vec![0x7F]);
        assert_eq!(encoded(128), vec![0x81, 0x80]);
        assert_eq!(encoded(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(encoded(0x012345), vec![0x83, 0x01, 0x23, 0x45]);
    }

    #[test]
    fn decode_matches_encode() {
        for len in [0, 1, 127, 128, 255, 256, 65535, 65536, MAX_LENGTH] {
            let bytes = encoded(len);
            assert_eq!(decode_length(&bytes, 0, None).unwrap(), (len, bytes.len()));
        }
    }

    #[test]
    fn rejects_indefinite_and_oversized() {
        assert!(decode_length(&[0x80], 0, None).is_err());
        assert!(decode_length(&[0x85, 1, 1, 1, 1, 1], 0, None).is_err());
        assert!(decode_length(&[0x84, 0x10, 0, 0, 0], 0, None).is_err());
        assert!(decode_length(&[0x82, 0x01], 0, None).is_err());
        assert!(decode_length(&[], 0, None).is_err());
    }
}
