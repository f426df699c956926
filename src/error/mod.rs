//! Error types for snmp-requester.
//!
//! This module provides:
//!
//! - [`Error`] - the error type returned by every public operation
//! - [`ErrorCategory`] - coarse classification (timeout, authentication, transport, protocol, usage)
//! - [`AuthErrorKind`] - USM failure reasons, whether reported by the peer or detected locally
//! - [`ErrorStatus`] - SNMP error-status codes carried in response PDUs (RFC 3416)
//!
//! Errors are boxed: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use snmp_requester::{Error, ErrorCategory, Result};
//!
//! fn describe(result: Result<()>) -> &'static str {
//!     match result {
//!         Ok(()) => "ok",
//!         Err(e) => match e.category() {
//!             ErrorCategory::Timeout => "no reply, try again",
//!             ErrorCategory::Authentication => "check credentials",
//!             _ => "failed",
//!         },
//!     }
//! }
//! ```

pub(crate) mod internal;

use std::net::SocketAddr;
use std::time::Duration;

use crate::oid::Oid;

/// Placeholder target address used when no target is known.
pub(crate) const UNKNOWN_TARGET: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)), 0);

// Detailed decode/crypto failures are logged, then collapsed into a public variant:
//
// tracing::debug!(
//     target: "snmp_requester::ber",
//     { snmp.offset = 42, kind = %DecodeErrorKind::ZeroLengthInteger },
//     "zero-length integer"
// );
// return Err(Error::MalformedResponse { target }.boxed());

/// Result type alias using the library's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No reply within the request deadline.
    Timeout,
    /// USM failure, peer-reported or detected locally.
    Authentication,
    /// Socket closed or failed.
    Transport,
    /// Undecodable or unexpected message, or an agent-reported error status.
    Protocol,
    /// Caller mistake: unknown target, duplicate request id, bad arguments.
    Usage,
}

/// USM authentication failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthErrorKind {
    /// Peer reported usmStatsWrongDigests.
    WrongDigest,
    /// Peer reported usmStatsUnknownUserNames.
    UnknownUserName,
    /// Peer reported usmStatsDecryptionErrors.
    DecryptionError,
    /// Time window still unresolved after the resynchronization retry.
    NotInTimeWindow,
    /// Peer reported usmStatsUnsupportedSecLevels.
    UnsupportedSecurityLevel,
    /// Peer reported usmStatsUnknownEngineIDs.
    UnknownEngineId,
    /// Discovery round-trip completed without yielding an engine id.
    EngineDiscoveryFailed,
    /// Credential lacks a field the requested security level needs.
    MissingCredential,
    /// An incoming message failed local digest verification.
    DigestMismatch,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongDigest => write!(f, "peer reported failed authentication"),
            Self::UnknownUserName => write!(f, "peer reported unknown username"),
            Self::DecryptionError => write!(f, "peer reported decryption error"),
            Self::NotInTimeWindow => write!(f, "still not in time window after resync"),
            Self::UnsupportedSecurityLevel => write!(f, "peer reported unsupported security level"),
            Self::UnknownEngineId => write!(f, "peer reported unknown engine id"),
            Self::EngineDiscoveryFailed => write!(f, "failed to retrieve engine id"),
            Self::MissingCredential => write!(f, "credential incomplete for security level"),
            Self::DigestMismatch => write!(f, "message digest verification failed"),
        }
    }
}

/// The error type for all snmp-requester operations.
///
/// Errors are boxed (via [`Result`]) to keep the size small on the stack.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No reply arrived before the request's timeout slot fired.
    #[error("timeout after {elapsed:?} waiting for request {request_id} to {target}")]
    Timeout {
        target: SocketAddr,
        request_id: i32,
        elapsed: Duration,
    },

    /// USM authentication failure.
    #[error("authentication failed for {target}: {kind}")]
    Auth {
        target: SocketAddr,
        kind: AuthErrorKind,
    },

    /// Sending to a target failed.
    #[error("network error communicating with {target}: {source}")]
    Network {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A client socket closed or failed; every request pending on it is rejected.
    #[error("transport failure: {reason}")]
    Transport { reason: Box<str> },

    /// Reply could not be decoded or had an unexpected shape.
    #[error("malformed response from {target}")]
    MalformedResponse { target: SocketAddr },

    /// Agent answered with a non-zero error status.
    #[error("SNMP error from {target}: {status} at index {index}")]
    Snmp {
        target: SocketAddr,
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    /// Local encryption failed while preparing a request.
    #[error("encryption failed for {target}")]
    Encryption { target: SocketAddr },

    /// No target registered under this id.
    #[error("unknown target: {0}")]
    UnknownTarget(Box<str>),

    /// Caller-supplied request id collides with an outstanding request.
    #[error("request ID {0} is already pending")]
    DuplicateRequestId(i32),

    /// GetBulk reply does not fit the requested column layout.
    #[error("unexpected response shape: {0}")]
    ResponseShape(Box<str>),

    /// Invalid configuration or arguments.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// Invalid OID format.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Auth { .. } | Self::Encryption { .. } => ErrorCategory::Authentication,
            Self::Network { .. } | Self::Transport { .. } => ErrorCategory::Transport,
            Self::MalformedResponse { .. } | Self::Snmp { .. } => ErrorCategory::Protocol,
            Self::UnknownTarget(_)
            | Self::DuplicateRequestId(_)
            | Self::ResponseShape(_)
            | Self::Config(_)
            | Self::InvalidOid(_) => ErrorCategory::Usage,
        }
    }

    pub(crate) fn auth(target: SocketAddr, kind: AuthErrorKind) -> Box<Self> {
        Self::Auth { target, kind }.boxed()
    }

    pub(crate) fn transport(reason: impl Into<Box<str>>) -> Box<Self> {
        Self::Transport {
            reason: reason.into(),
        }
        .boxed()
    }
}

/// SNMP protocol error status codes (RFC 3416).
///
/// ```
/// use snmp_requester::ErrorStatus;
///
/// let status = ErrorStatus::from_i32(2);
/// assert_eq!(status, ErrorStatus::NoSuchName);
/// assert_eq!(status.to_string(), "noSuchName");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Code outside the RFC 3416 range.
    Unknown(i32),
}

const STATUS_NAMES: [(ErrorStatus, &str); 19] = [
    (ErrorStatus::NoError, "noError"),
    (ErrorStatus::TooBig, "tooBig"),
    (ErrorStatus::NoSuchName, "noSuchName"),
    (ErrorStatus::BadValue, "badValue"),
    (ErrorStatus::ReadOnly, "readOnly"),
    (ErrorStatus::GenErr, "genErr"),
    (ErrorStatus::NoAccess, "noAccess"),
    (ErrorStatus::WrongType, "wrongType"),
    (ErrorStatus::WrongLength, "wrongLength"),
    (ErrorStatus::WrongEncoding, "wrongEncoding"),
    (ErrorStatus::WrongValue, "wrongValue"),
    (ErrorStatus::NoCreation, "noCreation"),
    (ErrorStatus::InconsistentValue, "inconsistentValue"),
    (ErrorStatus::ResourceUnavailable, "resourceUnavailable"),
    (ErrorStatus::CommitFailed, "commitFailed"),
    (ErrorStatus::UndoFailed, "undoFailed"),
    (ErrorStatus::AuthorizationError, "authorizationError"),
    (ErrorStatus::NotWritable, "notWritable"),
    (ErrorStatus::InconsistentName, "inconsistentName"),
];

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match usize::try_from(value).ok().and_then(|i| STATUS_NAMES.get(i)) {
            Some((status, _)) => *status,
            None => {
                tracing::warn!(target: "snmp_requester::error", { snmp.error_status = value }, "unknown SNMP error status");
                Self::Unknown(value)
            }
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Unknown(code) => *code,
            known => STATUS_NAMES
                .iter()
                .position(|(s, _)| s == known)
                .map_or(-1, |i| i as i32),
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({})", code),
            known => {
                let name = STATUS_NAMES
                    .iter()
                    .find(|(s, _)| s == known)
                    .map_or("unknown", |(_, n)| n);
                f.write_str(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size_budget() {
        assert!(
            std::mem::size_of::<Error>() <= 128,
            "Error size {} exceeds 128-byte budget",
            std::mem::size_of::<Error>()
        );
        assert_eq!(
            std::mem::size_of::<Result<()>>(),
            std::mem::size_of::<*const ()>(),
        );
    }

    #[test]
    fn status_codes_round_trip() {
        for code in 0..=18 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::from_i32(-3).as_i32(), -3);
        assert_eq!(ErrorStatus::AuthorizationError.to_string(), "authorizationError");
    }

    #[test]
    fn categories() {
        let target = UNKNOWN_TARGET;
        assert_eq!(
            Error::Timeout {
                target,
                request_id: 1,
                elapsed: Duration::from_secs(3)
            }
            .category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            Error::auth(target, AuthErrorKind::WrongDigest).category(),
            ErrorCategory::Authentication
        );
        assert_eq!(Error::transport("closed").category(), ErrorCategory::Transport);
        assert_eq!(
            Error::MalformedResponse { target }.category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            Error::UnknownTarget("nope".into()).category(),
            ErrorCategory::Usage
        );
        assert_eq!(Error::DuplicateRequestId(7).category(), ErrorCategory::Usage);
    }
}
