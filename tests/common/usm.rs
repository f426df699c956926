//! Agent side of USM exchanges.
//!
//! Holds keys localized to [`ENGINE_ID`] and builds the discovery reports,
//! authenticated reports and (optionally encrypted) responses an agent sends.

use bytes::Bytes;
use snmp_requester::ber::Decoder;
use snmp_requester::message::{
    Message, MsgFlags, MsgGlobalData, ScopedPdu, ScopedPduData, V3Message,
};
use snmp_requester::v3::auth::{authenticate_message, verify_message};
use snmp_requester::v3::engine::usm_stats_oid;
use snmp_requester::v3::{LocalizedKey, MasterKey, PrivKey, UsmSecurityParams};
use snmp_requester::{AuthProtocol, Pdu, PduType, PrivProtocol, SecurityLevel, Value, VarBind};
use std::net::SocketAddr;

pub const ENGINE_ID: &[u8] = b"\x80\x00\x1f\x88\x04test-agent";

/// A request as the agent sees it.
#[derive(Debug)]
pub struct V3Request {
    pub msg_id: i32,
    pub level: SecurityLevel,
    pub params: UsmSecurityParams,
    pub pdu: Pdu,
    /// Digest verified with the agent's key.
    pub authentic: bool,
}

pub struct UsmAgent {
    pub username: &'static str,
    auth: LocalizedKey,
    privacy: Option<PrivKey>,
    pub boots: u32,
    pub time: u32,
}

impl UsmAgent {
    /// Agent for `username` whose privacy password is hashed with `auth_protocol`.
    pub fn new(
        username: &'static str,
        auth_protocol: AuthProtocol,
        auth_password: &str,
        privacy: Option<(PrivProtocol, &str)>,
    ) -> Self {
        let auth = MasterKey::from_password(auth_protocol, auth_password.as_bytes()).localize(ENGINE_ID);
        let privacy = privacy.map(|(protocol, password)| {
            let master = MasterKey::from_password(auth_protocol, password.as_bytes());
            PrivKey::from_master_key(&master, protocol, ENGINE_ID)
        });
        Self {
            username,
            auth,
            privacy,
            boots: 4,
            time: 1200,
        }
    }

    pub fn decode(&self, data: &Bytes, peer: SocketAddr) -> V3Request {
        let message = match Message::decode(data.clone()).expect("undecodable request") {
            Message::V3(message) => message,
            other => panic!("expected v3 message, got {other:?}"),
        };
        let params = UsmSecurityParams::decode(message.security_params.clone(), peer)
            .expect("undecodable USM parameters");
        let level = message.security_level();
        let authentic = level.requires_auth()
            && UsmSecurityParams::find_auth_params_offset(data)
                .is_some_and(|(offset, _)| verify_message(&self.auth, data, offset));
        let pdu = match &message.data {
            ScopedPduData::Plaintext(scoped) => scoped.pdu.clone(),
            ScopedPduData::Encrypted(ciphertext) => {
                let key = self.privacy.as_ref().expect("agent has no privacy key");
                let plaintext = key
                    .decrypt(ciphertext, params.engine_boots, params.engine_time, &params.priv_params)
                    .expect("request does not decrypt");
                ScopedPdu::decode(&mut Decoder::new(plaintext))
                    .expect("decrypted scoped PDU does not decode")
                    .pdu
            }
        };
        V3Request {
            msg_id: message.msg_id(),
            level,
            params,
            pdu,
            authentic,
        }
    }

    fn report_pdu(request: &V3Request, stat: u32) -> Pdu {
        Pdu {
            pdu_type: PduType::Report,
            ..Pdu::response(
                request.pdu.request_id,
                vec![VarBind::new(usm_stats_oid(stat), Value::Counter32(1))],
            )
        }
    }

    /// Unauthenticated usmStatsUnknownEngineIDs report carrying the engine parameters.
    pub fn discovery_report(&self, request: &V3Request) -> Bytes {
        self.unauthenticated_report(request, 4)
    }

    /// Unauthenticated report of usmStats counter `stat`.
    pub fn unauthenticated_report(&self, request: &V3Request, stat: u32) -> Bytes {
        self.plain_report(request, stat, Bytes::from_static(ENGINE_ID))
    }

    /// Discovery reply that omits the engine id.
    pub fn anonymous_report(&self, request: &V3Request) -> Bytes {
        self.plain_report(request, 4, Bytes::new())
    }

    fn plain_report(&self, request: &V3Request, stat: u32, engine_id: Bytes) -> Bytes {
        let params = UsmSecurityParams::new(engine_id.clone(), self.boots, self.time, Bytes::new());
        V3Message::new(
            MsgGlobalData::new(request.msg_id, MsgFlags::new(SecurityLevel::NoAuthNoPriv, false)),
            params.encode(),
            ScopedPduData::Plaintext(ScopedPdu::new(
                engine_id,
                Bytes::new(),
                Self::report_pdu(request, stat),
            )),
        )
        .encode()
    }

    /// Authenticated plaintext report of usmStats counter `stat`.
    pub fn report(&self, request: &V3Request, stat: u32) -> Bytes {
        self.build(request.msg_id, Self::report_pdu(request, stat), false)
    }

    /// Authenticated response, encrypted when the agent has a privacy key.
    pub fn response(&self, request: &V3Request, varbinds: Vec<VarBind>) -> Bytes {
        let pdu = Pdu::response(request.pdu.request_id, varbinds);
        self.build(request.msg_id, pdu, self.privacy.is_some())
    }

    fn build(&self, msg_id: i32, pdu: Pdu, encrypt: bool) -> Bytes {
        let scoped = ScopedPdu::new(Bytes::from_static(ENGINE_ID), Bytes::new(), pdu);
        let (data, priv_params, level) = match (&self.privacy, encrypt) {
            (Some(key), true) => {
                let (ciphertext, priv_params) = key
                    .encrypt(&scoped.encode_to_bytes(), self.boots, self.time, 0x0102_0304_0506_0708)
                    .expect("encryption failed");
                (ScopedPduData::Encrypted(ciphertext), priv_params, SecurityLevel::AuthPriv)
            }
            _ => (ScopedPduData::Plaintext(scoped), Bytes::new(), SecurityLevel::AuthNoPriv),
        };
        let params = UsmSecurityParams::new(Bytes::from_static(ENGINE_ID), self.boots, self.time, self.username)
            .with_priv_params(priv_params)
            .with_auth_placeholder(self.auth.mac_len());
        let encoded = V3Message::new(
            MsgGlobalData::new(msg_id, MsgFlags::new(level, false)),
            params.encode(),
            data,
        )
        .encode();
        let mut buf = encoded.to_vec();
        let (offset, _) = UsmSecurityParams::find_auth_params_offset(&buf).expect("no auth parameters");
        authenticate_message(&self.auth, &mut buf, offset);
        Bytes::from(buf)
    }
}
