//! Target credentials.
//!
//! A [`Credential`] is fixed at target registration: a community string for
//! v1/v2c, or a USM user with optional authentication and privacy.
//!
//! ```rust
//! use snmp_requester::{AuthProtocol, Credential, PrivProtocol, SecurityLevel};
//!
//! let v2c = Credential::v2c("public");
//! assert_eq!(v2c.security_level(), SecurityLevel::NoAuthNoPriv);
//!
//! let usm: Credential = Credential::usm("admin")
//!     .auth(AuthProtocol::Sha256, "authpassword")
//!     .privacy(PrivProtocol::Aes128, "privpassword")
//!     .into();
//! assert_eq!(usm.security_level(), SecurityLevel::AuthPriv);
//! assert!(usm.validate().is_ok());
//! ```

use bytes::Bytes;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::message::SecurityLevel;
use crate::v3::{AuthProtocol, PrivProtocol};
use crate::version::Version;

/// Longest USM user name (RFC 3414 SnmpAdminString SIZE(1..32)).
const MAX_USERNAME_LEN: usize = 32;

/// Credential used for every message to one target.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Community string (SNMPv1 or v2c).
    Community { version: Version, community: Bytes },
    /// User-based Security Model (SNMPv3).
    Usm(UsmCredential),
}

impl Credential {
    pub fn v1(community: impl Into<Bytes>) -> Self {
        Credential::Community {
            version: Version::V1,
            community: community.into(),
        }
    }

    pub fn v2c(community: impl Into<Bytes>) -> Self {
        Credential::Community {
            version: Version::V2c,
            community: community.into(),
        }
    }

    /// Start building an SNMPv3 USM credential.
    pub fn usm(username: impl Into<String>) -> UsmBuilder {
        UsmBuilder::new(username)
    }

    pub fn version(&self) -> Version {
        match self {
            Credential::Community { version, .. } => *version,
            Credential::Usm(_) => Version::V3,
        }
    }

    /// Community string or user name.
    pub fn security_name(&self) -> &[u8] {
        match self {
            Credential::Community { community, .. } => community,
            Credential::Usm(usm) => usm.username.as_bytes(),
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        match self {
            Credential::Community { .. } => SecurityLevel::NoAuthNoPriv,
            Credential::Usm(usm) => usm.security_level(),
        }
    }

    /// Check the credential is usable.
    ///
    /// Privacy without authentication is rejected, as are v3 user names outside 1..=32 bytes
    /// and a community credential tagged with version 3.
    pub fn validate(&self) -> Result<()> {
        match self {
            Credential::Community { version, .. } if !version.is_community() => Err(Error::Config(
                "community credentials require SNMP v1 or v2c".into(),
            )
            .boxed()),
            Credential::Community { .. } => Ok(()),
            Credential::Usm(usm) => {
                if usm.username.is_empty() || usm.username.len() > MAX_USERNAME_LEN {
                    return Err(Error::Config(
                        format!("USM user name must be 1..={MAX_USERNAME_LEN} bytes").into(),
                    )
                    .boxed());
                }
                if usm.privacy.is_some() && usm.auth.is_none() {
                    return Err(Error::Config("privacy requires authentication".into()).boxed());
                }
                Ok(())
            }
        }
    }
}

/// SNMPv3 USM user.
#[derive(Clone)]
pub struct UsmCredential {
    pub username: String,
    pub auth: Option<(AuthProtocol, Zeroizing<Vec<u8>>)>,
    pub privacy: Option<(PrivProtocol, Zeroizing<Vec<u8>>)>,
    /// contextName for the scoped PDU; usually empty.
    pub context_name: Bytes,
}

impl UsmCredential {
    pub fn auth_protocol(&self) -> Option<AuthProtocol> {
        self.auth.as_ref().map(|(protocol, _)| *protocol)
    }

    pub fn priv_protocol(&self) -> Option<PrivProtocol> {
        self.privacy.as_ref().map(|(protocol, _)| *protocol)
    }

    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (None, _) => SecurityLevel::NoAuthNoPriv,
        }
    }
}

impl std::fmt::Debug for UsmCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmCredential")
            .field("username", &self.username)
            .field("auth_protocol", &self.auth_protocol())
            .field("priv_protocol", &self.priv_protocol())
            .field("context_name", &self.context_name)
            .finish_non_exhaustive()
    }
}

/// Builder for SNMPv3 USM credentials.
pub struct UsmBuilder {
    username: String,
    auth: Option<(AuthProtocol, Zeroizing<Vec<u8>>)>,
    privacy: Option<(PrivProtocol, Zeroizing<Vec<u8>>)>,
    context_name: Bytes,
}

impl UsmBuilder {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
            context_name: Bytes::new(),
        }
    }

    /// Add authentication (authNoPriv or authPriv).
    pub fn auth(mut self, protocol: AuthProtocol, password: impl AsRef<[u8]>) -> Self {
        self.auth = Some((protocol, Zeroizing::new(password.as_ref().to_vec())));
        self
    }

    /// Add privacy (authPriv). Requires [`auth`](Self::auth); checked by [`Credential::validate`].
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl AsRef<[u8]>) -> Self {
        self.privacy = Some((protocol, Zeroizing::new(password.as_ref().to_vec())));
        self
    }

    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.context_name = name.into();
        self
    }

    pub fn build(self) -> Credential {
        self.into()
    }
}

impl From<UsmBuilder> for Credential {
    fn from(b: UsmBuilder) -> Credential {
        Credential::Usm(UsmCredential {
            username: b.username,
            auth: b.auth,
            privacy: b.privacy,
            context_name: b.context_name,
        })
    }
}
