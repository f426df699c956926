//! Authentication key derivation and HMAC operations (RFC 3414).
//!
//! This module implements:
//! - Password-to-key derivation (1MB expansion + hash)
//! - Key localization (binding key to engine ID)
//! - Key extension for privacy protocols needing more material than one digest
//! - Truncated HMAC computation and constant-time verification

use digest::{Digest, KeyInit, Mac, OutputSizeUser};
use hmac::Hmac;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;

/// Minimum password length recommended by net-snmp.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Password-derived key (Ku), not yet bound to an engine.
///
/// Derived once per security context; localizing it per engine id is cheap.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl MasterKey {
    /// Run the RFC 3414 A.2.1 password-to-key transformation.
    pub fn from_password(protocol: AuthProtocol, password: &[u8]) -> Self {
        if password.len() < MIN_PASSWORD_LENGTH {
            tracing::warn!(
                target: "snmp_requester::usm",
                { password_len = password.len(), min_len = MIN_PASSWORD_LENGTH },
                "SNMPv3 password is shorter than recommended minimum"
            );
        }
        Self {
            key: password_to_key(protocol, password),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Bind this key to `engine_id`: `H(Ku || engineID || Ku)`.
    pub fn localize(&self, engine_id: &[u8]) -> LocalizedKey {
        LocalizedKey {
            key: localize_key(self.protocol, &self.key, engine_id),
            protocol: self.protocol,
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Localized key (Kul), bound to one engine id.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Derive a localized key from a password and engine ID.
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        MasterKey::from_password(protocol, password).localize(engine_id)
    }

    /// Create a localized key from raw bytes.
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// HMAC over `data`, truncated to the protocol's MAC length.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        compute_hmac(self.protocol, &self.key, data)
    }

    /// Constant-time check of `expected` against the HMAC of `data`.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        computed.len() == expected.len() && bool::from(computed.ct_eq(expected))
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Blumenthal key extension: append `H(key so far)` until `needed` bytes exist.
///
/// Keys already long enough are truncated to `needed`.
pub fn extend_key(protocol: AuthProtocol, key: &[u8], needed: usize) -> Vec<u8> {
    let mut extended = key.to_vec();
    while extended.len() < needed {
        let next = digest_of(protocol, &extended);
        extended.extend_from_slice(&next);
    }
    extended.truncate(needed);
    extended
}

fn digest_of(protocol: AuthProtocol, data: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => md5::Md5::digest(data).to_vec(),
        AuthProtocol::Sha1 => sha1::Sha1::digest(data).to_vec(),
        AuthProtocol::Sha224 => sha2::Sha224::digest(data).to_vec(),
        AuthProtocol::Sha256 => sha2::Sha256::digest(data).to_vec(),
        AuthProtocol::Sha384 => sha2::Sha384::digest(data).to_vec(),
        AuthProtocol::Sha512 => sha2::Sha512::digest(data).to_vec(),
    }
}

/// Password to key transformation (RFC 3414 Section A.2.1).
fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    const EXPANSION_SIZE: usize = 1_048_576;

    match protocol {
        AuthProtocol::Md5 => password_to_key_impl::<md5::Md5>(password, EXPANSION_SIZE),
        AuthProtocol::Sha1 => password_to_key_impl::<sha1::Sha1>(password, EXPANSION_SIZE),
        AuthProtocol::Sha224 => password_to_key_impl::<sha2::Sha224>(password, EXPANSION_SIZE),
        AuthProtocol::Sha256 => password_to_key_impl::<sha2::Sha256>(password, EXPANSION_SIZE),
        AuthProtocol::Sha384 => password_to_key_impl::<sha2::Sha384>(password, EXPANSION_SIZE),
        AuthProtocol::Sha512 => password_to_key_impl::<sha2::Sha512>(password, EXPANSION_SIZE),
    }
}

fn password_to_key_impl<D>(password: &[u8], expansion_size: usize) -> Vec<u8>
where
    D: Digest + Default,
{
    if password.is_empty() {
        return vec![0u8; <D as OutputSizeUser>::output_size()];
    }

    let mut hasher = D::new();
    let mut buf = [0u8; 64];
    let mut index = 0;
    let mut count = 0;
    while count < expansion_size {
        for byte in &mut buf {
            *byte = password[index];
            index = (index + 1) % password.len();
        }
        hasher.update(buf);
        count += buf.len();
    }
    let key = hasher.finalize().to_vec();
    buf.zeroize();
    key
}

/// Key localization (RFC 3414 Section A.2.2).
fn localize_key(protocol: AuthProtocol, master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => localize_key_impl::<md5::Md5>(master_key, engine_id),
        AuthProtocol::Sha1 => localize_key_impl::<sha1::Sha1>(master_key, engine_id),
        AuthProtocol::Sha224 => localize_key_impl::<sha2::Sha224>(master_key, engine_id),
        AuthProtocol::Sha256 => localize_key_impl::<sha2::Sha256>(master_key, engine_id),
        AuthProtocol::Sha384 => localize_key_impl::<sha2::Sha384>(master_key, engine_id),
        AuthProtocol::Sha512 => localize_key_impl::<sha2::Sha512>(master_key, engine_id),
    }
}

fn localize_key_impl<D>(master_key: &[u8], engine_id: &[u8]) -> Vec<u8>
where
    D: Digest + Default,
{
    let mut hasher = D::new();
    hasher.update(master_key);
    hasher.update(engine_id);
    hasher.update(master_key);
    hasher.finalize().to_vec()
}

fn compute_hmac(protocol: AuthProtocol, key: &[u8], data: &[u8]) -> Vec<u8> {
    macro_rules! truncated_hmac {
        ($hash:ty) => {{
            let mut mac = <Hmac<$hash> as KeyInit>::new_from_slice(key)
                .expect("HMAC can take key of any size");
            Mac::update(&mut mac, data);
            mac.finalize().into_bytes()[..protocol.mac_len()].to_vec()
        }};
    }

    match protocol {
        AuthProtocol::Md5 => truncated_hmac!(md5::Md5),
        AuthProtocol::Sha1 => truncated_hmac!(sha1::Sha1),
        AuthProtocol::Sha224 => truncated_hmac!(sha2::Sha224),
        AuthProtocol::Sha256 => truncated_hmac!(sha2::Sha256),
        AuthProtocol::Sha384 => truncated_hmac!(sha2::Sha384),
        AuthProtocol::Sha512 => truncated_hmac!(sha2::Sha512),
    }
}

/// Authenticate an outgoing message in place.
///
/// `message` must carry zeros at `auth_offset..auth_offset + key.mac_len()`;
/// the MAC is computed over the whole message and written there.
pub fn authenticate_message(key: &LocalizedKey, message: &mut [u8], auth_offset: usize) {
    let mac = key.compute_hmac(message);
    message[auth_offset..auth_offset + mac.len()].copy_from_slice(&mac);
}

/// Verify the MAC of an incoming message located at `auth_offset`.
pub fn verify_message(key: &LocalizedKey, message: &[u8], auth_offset: usize) -> bool {
    let auth_len = key.mac_len();
    let Some(received) = message.get(auth_offset..auth_offset + auth_len) else {
        return false;
    };
    let mut zeroed = message.to_vec();
    zeroed[auth_offset..auth_offset + auth_len].fill(0);
    key.verify_hmac(&zeroed, received)
}
