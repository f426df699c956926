//! SNMP Protocol Data Units (PDUs).

use std::net::SocketAddr;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    const ALL: [PduType; 9] = [
        Self::GetRequest,
        Self::GetNextRequest,
        Self::Response,
        Self::SetRequest,
        Self::TrapV1,
        Self::GetBulkRequest,
        Self::InformRequest,
        Self::TrapV2,
        Self::Report,
    ];

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Request/response PDU.
///
/// For GETBULK, `error_status` carries non-repeaters and `error_index`
/// carries max-repetitions. A request id of 0 means "not yet assigned".
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    fn with_nulls(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::with_nulls(PduType::GetRequest, request_id, oids)
    }

    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::with_nulls(PduType::GetNextRequest, request_id, oids)
    }

    pub fn get_bulk(request_id: i32, non_repeaters: u32, max_repetitions: u32, oids: &[Oid]) -> Self {
        Self {
            error_status: i32::try_from(non_repeaters).unwrap_or(i32::MAX),
            error_index: i32::try_from(max_repetitions).unwrap_or(i32::MAX),
            ..Self::with_nulls(PduType::GetBulkRequest, request_id, oids)
        }
    }

    /// A successful Response carrying `varbinds`.
    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// GETBULK non-repeaters.
    pub fn non_repeaters(&self) -> u32 {
        self.error_status.max(0) as u32
    }

    /// GETBULK max-repetitions.
    pub fn max_repetitions(&self) -> u32 {
        self.error_index.max(0) as u32
    }

    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    pub fn is_trap(&self) -> bool {
        matches!(self.pdu_type, PduType::TrapV1 | PduType::TrapV2)
    }

    /// The [`Error::Snmp`] describing this PDU's error status.
    pub fn to_error(&self, target: SocketAddr) -> Box<Error> {
        let index = self.error_index.max(0) as u32;
        let oid = index
            .checked_sub(1)
            .and_then(|i| self.varbinds.get(i as usize))
            .map(|vb| vb.oid.clone());
        Error::Snmp {
            target,
            status: self.error_status_enum(),
            index,
            oid,
        }
        .boxed()
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode a PDU. A v1 Trap body is skipped and yields an empty `TrapV1` PDU.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag)
            .ok_or_else(|| decoder.malformed(DecodeErrorKind::UnknownPduType(tag)))?;
        let len = decoder.read_length()?;
        let mut body = decoder.sub_decoder(len)?;

        if pdu_type == PduType::TrapV1 {
            return Ok(Self::with_nulls(PduType::TrapV1, 0, &[]));
        }

        let request_id = body.read_integer()?;
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    fn round_trip(pdu: &Pdu) -> Pdu {
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        Pdu::decode(&mut Decoder::new(buf.finish())).unwrap()
    }

    #[test]
    fn test_get_bulk_fields() {
        let pdu = Pdu::get_bulk(77, 1, 10, &[oid!(1, 3, 6, 1, 2, 1, 1, 3), oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)]);
        assert_eq!(pdu.non_repeaters(), 1);
        assert_eq!(pdu.max_repetitions(), 10);
        let decoded = round_trip(&pdu);
        assert_eq!(decoded, pdu);
        assert_eq!(decoded.pdu_type, PduType::GetBulkRequest);
    }

    #[test]
    fn test_error_points_at_varbind() {
        let mut pdu = Pdu::response(5, vec![
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Null),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 9, 0), Value::Null),
        ]);
        pdu.error_status = 2;
        pdu.error_index = 2;
        let target = "192.0.2.9:161".parse().unwrap();
        match *pdu.to_error(target) {
            Error::Snmp { status, index, ref oid, .. } => {
                assert_eq!(status, ErrorStatus::NoSuchName);
                assert_eq!(index, 2);
                assert_eq!(oid.as_ref(), Some(&oid!(1, 3, 6, 1, 2, 1, 1, 9, 0)));
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trap_v1_body_is_skipped() {
        // A4 len { enterprise OID, agent-addr, generic, specific, timestamp, varbinds }
        let bytes = [
            0xA4, 0x14, 0x06, 0x03, 0x2B, 0x06, 0x01, 0x40, 0x04, 10, 0, 0, 1, 0x02, 0x01, 0x00,
            0x02, 0x01, 0x00, 0x43, 0x01, 0x00,
        ];
        let mut dec = Decoder::from_slice(&bytes);
        let pdu = Pdu::decode(&mut dec).unwrap();
        assert!(pdu.is_trap());
        assert!(dec.is_empty());
    }

    #[test]
    fn test_unknown_pdu_tag() {
        let mut dec = Decoder::from_slice(&[0xAF, 0x00]);
        assert!(Pdu::decode(&mut dec).is_err());
    }
}
