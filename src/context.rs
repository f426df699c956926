//! Per-target security context.
//!
//! Community targets only need their community string wrapped around each
//! PDU. USM targets carry the remote engine state and the keys localized to
//! it, moving through three phases:
//!
//! ```text
//!   Discovering ──engine id learned──> Unverified ──authenticated Response──> Synchronized
//!        ^                                 ^                                        │
//!        │                                 └──────── notInTimeWindow Report ────────┤
//!        └──────────────────────── unknownEngineIDs Report ─────────────────────────┘
//! ```
//!
//! Keys are rebuilt on every transition into `Unverified` caused by a new engine id.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};

use crate::credential::{Credential, UsmCredential};
use crate::error::{AuthErrorKind, Error, Result};
use crate::message::{
    CommunityMessage, MsgFlags, MsgGlobalData, ScopedPdu, ScopedPduData, SecurityLevel, V3Message,
    decode_scoped_pdu,
};
use crate::pdu::{Pdu, PduType};
use crate::util::{random_u32, random_u64};
use crate::v3::auth::{authenticate_message, verify_message};
use crate::v3::engine::classify_report;
use crate::v3::{LocalizedKey, MasterKey, PrivKey, PrivProtocol, RemoteEngine, UsmSecurityParams};
use crate::version::Version;

/// Externally visible phase of a USM context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsmPhase {
    /// Engine id unknown; only discovery can be sent.
    Discovering,
    /// Engine id known and keys localized, clock not yet confirmed.
    Unverified,
    /// An authenticated exchange has succeeded.
    Synchronized,
}

/// Outcome of processing an incoming v3 message.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// Verified and, when required, decrypted PDU.
    Deliver(Pdu),
    /// Security parameters were absorbed; nothing verified to deliver.
    Refreshed,
    /// The message cannot be processed and is dropped.
    Rejected,
}

/// Keys localized to the current engine id.
struct Keys {
    auth: Option<LocalizedKey>,
    privacy: Option<PrivKey>,
}

enum UsmState {
    NoEngine,
    EngineKnown(Keys),
    Synchronized(Keys),
}

impl UsmState {
    fn keys(&self) -> Option<&Keys> {
        match self {
            UsmState::NoEngine => None,
            UsmState::EngineKnown(keys) | UsmState::Synchronized(keys) => Some(keys),
        }
    }

    fn into_keys(self) -> Option<Keys> {
        match self {
            UsmState::NoEngine => None,
            UsmState::EngineKnown(keys) | UsmState::Synchronized(keys) => Some(keys),
        }
    }
}

/// Master keys derived once from the credential's passwords.
struct MasterKeys {
    auth: Option<MasterKey>,
    privacy: Option<(PrivProtocol, MasterKey)>,
}

impl MasterKeys {
    fn derive(usm: &UsmCredential) -> Self {
        let auth = usm
            .auth
            .as_ref()
            .map(|(protocol, password)| MasterKey::from_password(*protocol, password));
        // The privacy password is hashed with the authentication protocol.
        let privacy = match (&usm.auth, &usm.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => Some((
                *priv_protocol,
                MasterKey::from_password(*auth_protocol, password),
            )),
            _ => None,
        };
        Self { auth, privacy }
    }

    fn localize(&self, engine_id: &[u8]) -> Keys {
        Keys {
            auth: self.auth.as_ref().map(|master| master.localize(engine_id)),
            privacy: self
                .privacy
                .as_ref()
                .map(|(protocol, master)| PrivKey::from_master_key(master, *protocol, engine_id)),
        }
    }
}

/// Security state of one registered target.
pub struct SecurityContext {
    target: SocketAddr,
    credential: Credential,
    masters: Option<MasterKeys>,
    engine: RemoteEngine,
    state: UsmState,
    salt_counter: u32,
}

impl SecurityContext {
    /// Build the context for `target`. USM passwords are turned into master keys here.
    pub fn new(target: SocketAddr, credential: Credential) -> Result<Self> {
        credential.validate()?;
        let masters = match &credential {
            Credential::Usm(usm) => Some(MasterKeys::derive(usm)),
            Credential::Community { .. } => None,
        };
        Ok(Self {
            target,
            credential,
            masters,
            engine: RemoteEngine::default(),
            state: UsmState::NoEngine,
            salt_counter: random_u32(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn version(&self) -> Version {
        self.credential.version()
    }

    pub fn wants_authentication(&self) -> bool {
        self.credential.security_level().requires_auth()
    }

    pub fn wants_encryption(&self) -> bool {
        self.credential.security_level().requires_priv()
    }

    pub fn engine(&self) -> &RemoteEngine {
        &self.engine
    }

    pub fn phase(&self) -> UsmPhase {
        match self.state {
            UsmState::NoEngine => UsmPhase::Discovering,
            UsmState::EngineKnown(_) => UsmPhase::Unverified,
            UsmState::Synchronized(_) => UsmPhase::Synchronized,
        }
    }

    pub fn is_engine_known(&self) -> bool {
        self.engine.is_known() && self.state.keys().is_some()
    }

    fn auth_key(&self) -> Option<&LocalizedKey> {
        self.state.keys().and_then(|keys| keys.auth.as_ref())
    }

    fn priv_key(&self) -> Option<&PrivKey> {
        self.state.keys().and_then(|keys| keys.privacy.as_ref())
    }

    /// Drop everything learned about the engine; the next send rediscovers it.
    pub fn forget_engine(&mut self) {
        tracing::debug!(
            target: "snmp_requester::usm",
            { snmp.target = %self.target },
            "forgetting remote engine"
        );
        self.engine = RemoteEngine::default();
        self.state = UsmState::NoEngine;
    }

    /// Fall back to `Unverified` after the peer rejected our clock.
    fn unsynchronize(&mut self) {
        let state = std::mem::replace(&mut self.state, UsmState::NoEngine);
        self.state = match state.into_keys() {
            Some(keys) => UsmState::EngineKnown(keys),
            None => UsmState::NoEngine,
        };
    }

    fn mark_synchronized(&mut self) {
        let state = std::mem::replace(&mut self.state, UsmState::NoEngine);
        self.state = match state.into_keys() {
            Some(keys) => UsmState::Synchronized(keys),
            None => UsmState::NoEngine,
        };
    }

    /// Absorb incoming engine fields, relocalizing keys when the engine id changed.
    fn absorb(&mut self, params: &UsmSecurityParams) {
        let changed = self.engine.refresh(params);
        if changed || (self.engine.is_known() && self.state.keys().is_none()) {
            let keys = match &self.masters {
                Some(masters) => masters.localize(&self.engine.engine_id),
                None => Keys {
                    auth: None,
                    privacy: None,
                },
            };
            tracing::debug!(
                target: "snmp_requester::usm",
                { snmp.target = %self.target, snmp.engine_boots = self.engine.engine_boots, snmp.engine_time = self.engine.engine_time },
                "engine id learned, keys localized"
            );
            self.state = UsmState::EngineKnown(keys);
        }
    }

    /// Wrap `pdu` for the wire.
    ///
    /// Community credentials ignore `msg_id`; USM credentials require one. While no
    /// privacy key exists an empty GetRequest is sent at authNoPriv in place of `pdu`.
    pub fn prepare_message(&mut self, pdu: &Pdu, msg_id: Option<i32>) -> Result<Bytes> {
        let (requested, username, context_name) = match &self.credential {
            Credential::Community { version, community } => {
                return Ok(CommunityMessage::new(*version, community.clone(), pdu.clone()).encode());
            }
            Credential::Usm(usm) => (
                usm.security_level(),
                Bytes::copy_from_slice(usm.username.as_bytes()),
                usm.context_name.clone(),
            ),
        };
        let msg_id = msg_id.ok_or_else(|| Error::Config("SNMPv3 requires a message id".into()).boxed())?;

        let (pdu, level) = if requested.requires_priv() && self.priv_key().is_none() {
            tracing::debug!(
                target: "snmp_requester::usm",
                { snmp.target = %self.target },
                "no privacy key yet, sending intermediate request"
            );
            (
                Pdu::get_request(pdu.request_id, &[]),
                SecurityLevel::AuthNoPriv,
            )
        } else {
            (pdu.clone(), requested)
        };
        let level = if level.requires_auth() && self.auth_key().is_none() {
            SecurityLevel::NoAuthNoPriv
        } else {
            level
        };

        let boots = self.engine.engine_boots;
        let time = self.engine.estimated_time();
        let scoped = ScopedPdu::new(self.engine.engine_id.clone(), context_name, pdu);

        let (data, priv_params) = if level.requires_priv() {
            let salt = self.next_salt();
            let target = self.target;
            let key = self
                .priv_key()
                .ok_or_else(|| Error::auth(target, AuthErrorKind::MissingCredential))?;
            let (ciphertext, priv_params) = key
                .encrypt(&scoped.encode_to_bytes(), boots, time, salt)
                .map_err(|kind| {
                    tracing::debug!(
                        target: "snmp_requester::usm",
                        { snmp.target = %target, %kind },
                        "encryption failed"
                    );
                    Error::Encryption { target }.boxed()
                })?;
            (ScopedPduData::Encrypted(ciphertext), priv_params)
        } else {
            (ScopedPduData::Plaintext(scoped), Bytes::new())
        };

        let mut params = UsmSecurityParams::new(self.engine.engine_id.clone(), boots, time, username)
            .with_priv_params(priv_params);
        if level.requires_auth()
            && let Some(key) = self.auth_key()
        {
            params = params.with_auth_placeholder(key.mac_len());
        }

        let global = MsgGlobalData::new(msg_id, MsgFlags::new(level, true));
        let encoded = V3Message::new(global, params.encode(), data).encode();
        Ok(self.authenticate_outgoing(encoded))
    }

    /// A noAuthNoPriv discovery message with empty USM parameters.
    pub fn prepare_unauthenticated_message(&self, pdu: &Pdu, msg_id: i32) -> Bytes {
        let global = MsgGlobalData::new(msg_id, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true));
        let scoped = ScopedPdu::new(Bytes::new(), Bytes::new(), pdu.clone());
        V3Message::new(
            global,
            UsmSecurityParams::empty().encode(),
            ScopedPduData::Plaintext(scoped),
        )
        .encode()
    }

    /// Patch the MAC into an encoded message carrying an auth placeholder.
    fn authenticate_outgoing(&self, encoded: Bytes) -> Bytes {
        let Some(key) = self.auth_key() else {
            return encoded;
        };
        match UsmSecurityParams::find_auth_params_offset(&encoded) {
            Some((offset, len)) if len == key.mac_len() => {
                let mut buf = BytesMut::from(&encoded[..]);
                authenticate_message(key, &mut buf, offset);
                buf.freeze()
            }
            _ => encoded,
        }
    }

    /// Salt for the next encryption: an incrementing counter for DES, random for AES.
    fn next_salt(&mut self) -> u64 {
        match self.priv_key().map(PrivKey::protocol) {
            Some(protocol) if protocol.uses_counter_salt() => {
                self.salt_counter = self.salt_counter.wrapping_add(1);
                u64::from(self.salt_counter)
            }
            _ => random_u64(),
        }
    }

    /// Process an incoming v3 message whose encoding is `raw`.
    ///
    /// Errors are peer-reported USM failures attached to a message that failed
    /// verification; everything else is an [`Inbound`] outcome.
    pub fn handle_incoming_v3(&mut self, message: &V3Message, raw: &[u8]) -> Result<Inbound> {
        let params = match UsmSecurityParams::decode(message.security_params.clone(), self.target) {
            Ok(params) => params,
            Err(_) => return Ok(Inbound::Rejected),
        };

        if !self.wants_authentication() {
            self.absorb(&params);
            return Ok(match &message.data {
                ScopedPduData::Plaintext(scoped) => {
                    if scoped.pdu.pdu_type == PduType::Response {
                        self.mark_synchronized();
                    }
                    Inbound::Deliver(scoped.pdu.clone())
                }
                ScopedPduData::Encrypted(_) => Inbound::Rejected,
            });
        }

        if !self.is_engine_known() || self.auth_key().is_none() {
            self.absorb(&params);
            return Ok(Inbound::Refreshed);
        }

        if !self.verify(message, raw) {
            return match message.plaintext_pdu().and_then(classify_report) {
                Some(kind) => {
                    tracing::debug!(
                        target: "snmp_requester::usm",
                        { snmp.target = %self.target, %kind },
                        "unauthenticated report"
                    );
                    if kind == AuthErrorKind::UnknownEngineId {
                        // A duplicate discovery answer for the engine already in use.
                        if params.engine_id == self.engine.engine_id {
                            return Ok(Inbound::Refreshed);
                        }
                        self.forget_engine();
                    }
                    Err(Error::auth(self.target, kind))
                }
                None => {
                    tracing::debug!(
                        target: "snmp_requester::usm",
                        { snmp.target = %self.target },
                        "message digest mismatch"
                    );
                    Ok(Inbound::Rejected)
                }
            };
        }

        if !self.wants_encryption() {
            return Ok(match &message.data {
                ScopedPduData::Plaintext(scoped) => self.deliver_verified(&params, scoped.pdu.clone()),
                ScopedPduData::Encrypted(_) => Inbound::Rejected,
            });
        }

        if self.priv_key().is_none() {
            self.absorb(&params);
            return Ok(Inbound::Refreshed);
        }

        let ciphertext = match &message.data {
            // Agents report clock and similar failures at authNoPriv.
            ScopedPduData::Plaintext(scoped) if scoped.pdu.pdu_type == PduType::Report => {
                return Ok(self.deliver_verified(&params, scoped.pdu.clone()));
            }
            ScopedPduData::Plaintext(_) => return Ok(Inbound::Rejected),
            ScopedPduData::Encrypted(ciphertext) => ciphertext,
        };
        if params.priv_params.is_empty() || ciphertext.is_empty() {
            return Ok(Inbound::Rejected);
        }

        self.absorb(&params);
        let Some(key) = self.priv_key() else {
            return Ok(Inbound::Rejected);
        };
        let plaintext = match key.decrypt(ciphertext, params.engine_boots, params.engine_time, &params.priv_params) {
            Ok(plaintext) => plaintext,
            Err(kind) => {
                tracing::debug!(
                    target: "snmp_requester::usm",
                    { snmp.target = %self.target, %kind },
                    "decryption failed"
                );
                return Ok(Inbound::Rejected);
            }
        };
        match decode_scoped_pdu(plaintext, self.target) {
            Ok(scoped) => Ok(self.deliver_verified(&params, scoped.pdu)),
            Err(_) => {
                tracing::debug!(
                    target: "snmp_requester::usm",
                    { snmp.target = %self.target },
                    "decrypted scoped PDU does not decode"
                );
                Ok(Inbound::Rejected)
            }
        }
    }

    fn verify(&self, message: &V3Message, raw: &[u8]) -> bool {
        let Some(key) = self.auth_key() else {
            return false;
        };
        if !message.security_level().requires_auth() {
            return false;
        }
        match UsmSecurityParams::find_auth_params_offset(raw) {
            Some((offset, len)) if len == key.mac_len() => {
                verify_message(key, raw, offset)
            }
            _ => false,
        }
    }

    /// Update engine state from a verified message and hand out its PDU.
    fn deliver_verified(&mut self, params: &UsmSecurityParams, pdu: Pdu) -> Inbound {
        match classify_report(&pdu) {
            Some(AuthErrorKind::NotInTimeWindow) => {
                self.engine.resynchronize(params);
                self.unsynchronize();
                tracing::debug!(
                    target: "snmp_requester::usm",
                    { snmp.target = %self.target, snmp.engine_boots = params.engine_boots, snmp.engine_time = params.engine_time },
                    "not in time window, clock resynchronized"
                );
            }
            Some(AuthErrorKind::UnknownEngineId) => self.forget_engine(),
            _ => {
                self.absorb(params);
                if pdu.pdu_type == PduType::Response {
                    self.mark_synchronized();
                }
            }
        }
        Inbound::Deliver(pdu)
    }
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("target", &self.target)
            .field("credential", &self.credential)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
