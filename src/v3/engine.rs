//! Remote engine state and time synchronization (RFC 3414 Section 2.3).
//!
//! A non-authoritative engine (the client) tracks, per target:
//! - `snmpEngineID` of the authoritative engine
//! - `snmpEngineBoots` and `snmpEngineTime` as last received
//! - `latestReceivedEngineTime` for replay protection
//!
//! Report PDUs carrying usmStats counters are mapped onto [`AuthErrorKind`].

use bytes::Bytes;
use tokio::time::Instant;

use super::UsmSecurityParams;
use crate::error::AuthErrorKind;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};

/// Maximum valid snmpEngineTime and snmpEngineBoots value.
pub const MAX_ENGINE_TIME: u32 = 2147483647;

/// usmStats prefix; the counters are `usmStats.N.0`.
const USM_STATS: [u32; 9] = [1, 3, 6, 1, 6, 3, 15, 1, 1];

/// Engine identity and clock of one target, as learned from the wire.
///
/// An empty `engine_id` means the engine has not been discovered yet.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    /// Local time when `engine_time` was received.
    pub synced_at: Instant,
    pub latest_received_engine_time: u32,
}

impl Default for RemoteEngine {
    fn default() -> Self {
        Self {
            engine_id: Bytes::new(),
            engine_boots: 0,
            engine_time: 0,
            synced_at: Instant::now(),
            latest_received_engine_time: 0,
        }
    }
}

impl RemoteEngine {
    pub fn is_known(&self) -> bool {
        !self.engine_id.is_empty()
    }

    /// Absorb the engine fields of incoming security parameters.
    ///
    /// A different engine id replaces everything. For the same engine, boots/time
    /// are only taken per RFC 3414 3.2 step 7b: higher boots, or the same boots
    /// with a later time. Returns whether the engine id changed.
    pub fn refresh(&mut self, params: &UsmSecurityParams) -> bool {
        if params.engine_id.is_empty() {
            return false;
        }
        if params.engine_id != self.engine_id {
            self.engine_id = params.engine_id.clone();
            self.set_clock(params.engine_boots, params.engine_time);
            return true;
        }
        if params.engine_boots > self.engine_boots
            || (params.engine_boots == self.engine_boots
                && params.engine_time > self.latest_received_engine_time)
        {
            self.set_clock(params.engine_boots, params.engine_time);
        }
        false
    }

    /// Take boots/time unconditionally, as after an authenticated notInTimeWindow report.
    pub fn resynchronize(&mut self, params: &UsmSecurityParams) {
        if params.engine_id == self.engine_id {
            self.set_clock(params.engine_boots, params.engine_time);
        }
    }

    fn set_clock(&mut self, boots: u32, time: u32) {
        self.engine_boots = boots;
        self.engine_time = time;
        self.latest_received_engine_time = time;
        self.synced_at = Instant::now();
    }

    /// Engine time now: last received time plus local elapsed seconds,
    /// capped at [`MAX_ENGINE_TIME`].
    pub fn estimated_time(&self) -> u32 {
        let elapsed = u32::try_from(self.synced_at.elapsed().as_secs()).unwrap_or(u32::MAX);
        self.engine_time.saturating_add(elapsed).min(MAX_ENGINE_TIME)
    }
}

/// The `usmStats.N.0` counter OID for report index `n`.
pub fn usm_stats_oid(n: u32) -> Oid {
    let mut oid = Oid::from_slice(&USM_STATS);
    oid = oid.child(n);
    oid.child(0)
}

/// Map a Report PDU's usmStats varbind onto an authentication failure.
pub fn classify_report(pdu: &Pdu) -> Option<AuthErrorKind> {
    if pdu.pdu_type != PduType::Report {
        return None;
    }
    pdu.varbinds.iter().find_map(|vb| match vb.oid.arcs() {
        [prefix @ .., n, 0] if prefix == USM_STATS => match n {
            1 => Some(AuthErrorKind::UnsupportedSecurityLevel),
            2 => Some(AuthErrorKind::NotInTimeWindow),
            3 => Some(AuthErrorKind::UnknownUserName),
            4 => Some(AuthErrorKind::UnknownEngineId),
            5 => Some(AuthErrorKind::WrongDigest),
            6 => Some(AuthErrorKind::DecryptionError),
            _ => None,
        },
        _ => None,
    })
}
