//! SNMPv3 User-based Security Model (RFC 3414, RFC 3826, RFC 7860).
//!
//! - [`auth`]: password-to-key derivation, localization, HMAC
//! - [`privacy`]: DES-CBC and AES-CFB payload encryption
//! - [`usm`]: msgSecurityParameters codec
//! - [`engine`]: remote engine boots/time tracking and Report classification

pub mod auth;
pub mod engine;
pub mod privacy;
pub mod usm;

pub use auth::{LocalizedKey, MasterKey, extend_key};
pub use engine::{MAX_ENGINE_TIME, RemoteEngine};
pub use privacy::{PrivKey, PrivacyError};
pub use usm::UsmSecurityParams;

/// A protocol name that matched no supported algorithm.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {family} protocol '{input}', expected one of {expected}")]
pub struct ParseProtocolError {
    family: &'static str,
    input: String,
    expected: &'static str,
}

/// Uppercased with separators removed, so `sha-256`, `SHA256` and `Sha_256` compare equal.
fn canonical(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// USM authentication algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthProtocol {
    /// usmHMACMD5AuthProtocol
    Md5,
    /// usmHMACSHAAuthProtocol
    Sha1,
    /// usmHMAC128SHA224AuthProtocol
    Sha224,
    /// usmHMAC192SHA256AuthProtocol
    Sha256,
    /// usmHMAC256SHA384AuthProtocol
    Sha384,
    /// usmHMAC384SHA512AuthProtocol
    Sha512,
}

impl AuthProtocol {
    pub const ALL: [Self; 6] = [
        Self::Md5,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Hash output size; localized keys have this length.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Bytes of the HMAC kept in msgAuthenticationParameters.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha224 => 16,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }
}

impl std::fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AuthProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = canonical(s);
        if wanted == "SHA" {
            return Ok(Self::Sha1);
        }
        Self::ALL
            .into_iter()
            .find(|p| canonical(p.name()) == wanted)
            .ok_or_else(|| ParseProtocolError {
                family: "authentication",
                input: s.to_owned(),
                expected: "MD5, SHA-1, SHA-224, SHA-256, SHA-384, SHA-512",
            })
    }
}

/// USM privacy algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivProtocol {
    /// usmDESPrivProtocol (CBC-DES)
    Des,
    /// usmAesCfb128Protocol
    Aes128,
    /// AES-192 in CFB mode, Blumenthal key extension
    Aes192,
    /// AES-256 in CFB mode, Blumenthal key extension
    Aes256,
}

impl PrivProtocol {
    pub const ALL: [Self; 4] = [Self::Des, Self::Aes128, Self::Aes192, Self::Aes256];

    pub fn name(self) -> &'static str {
        match self {
            Self::Des => "DES",
            Self::Aes128 => "AES-128",
            Self::Aes192 => "AES-192",
            Self::Aes256 => "AES-256",
        }
    }

    /// Localized key bytes consumed. DES takes a key and a pre-IV of 8 bytes each.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des | Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// DES salts embed the local counter; AES salts are random.
    pub fn uses_counter_salt(self) -> bool {
        matches!(self, Self::Des)
    }
}

impl std::fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PrivProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = canonical(s);
        if wanted == "AES" {
            return Ok(Self::Aes128);
        }
        Self::ALL
            .into_iter()
            .find(|p| canonical(p.name()) == wanted)
            .ok_or_else(|| ParseProtocolError {
                family: "privacy",
                input: s.to_owned(),
                expected: "DES, AES-128, AES-192, AES-256",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_protocol_names() {
        for proto in AuthProtocol::ALL {
            assert_eq!(proto.to_string().parse::<AuthProtocol>().unwrap(), proto);
        }
        assert_eq!("sha1".parse::<AuthProtocol>().unwrap(), AuthProtocol::Sha1);
        assert_eq!("SHA".parse::<AuthProtocol>().unwrap(), AuthProtocol::Sha1);
        assert_eq!("sha_256".parse::<AuthProtocol>().unwrap(), AuthProtocol::Sha256);
        assert!("sha3".parse::<AuthProtocol>().is_err());
    }

    #[test]
    fn test_priv_protocol_names() {
        assert_eq!("aes".parse::<PrivProtocol>().unwrap(), PrivProtocol::Aes128);
        assert_eq!("AES-256".parse::<PrivProtocol>().unwrap(), PrivProtocol::Aes256);
        for proto in PrivProtocol::ALL {
            assert_eq!(proto.to_string().parse::<PrivProtocol>().unwrap(), proto);
        }
        let err = "bogus".parse::<PrivProtocol>().unwrap_err();
        assert!(err.to_string().contains("privacy protocol"));
    }

    #[test]
    fn test_mac_lengths() {
        assert_eq!(AuthProtocol::Md5.mac_len(), 12);
        assert_eq!(AuthProtocol::Sha1.mac_len(), 12);
        assert_eq!(AuthProtocol::Sha224.mac_len(), 16);
        assert_eq!(AuthProtocol::Sha512.mac_len(), 48);
        assert!(AuthProtocol::Sha1.digest_len() < PrivProtocol::Aes256.key_len());
    }
}
