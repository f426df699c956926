//! Detailed failure kinds that are logged but never returned.

use std::fmt;

/// Why a BER decode failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeErrorKind {
    UnexpectedTag { expected: u8, actual: u8 },
    TruncatedData,
    InvalidLength,
    IndefiniteLength,
    LengthTooLong { octets: usize },
    LengthExceedsMax { length: usize, max: usize },
    InsufficientData { needed: usize, available: usize },
    IntegerOverflow,
    ZeroLengthInteger,
    Integer64TooLong { length: usize },
    InvalidNull,
    InvalidIpAddressLength { length: usize },
    OidTooLong { count: usize, max: usize },
    UnknownVersion(i32),
    UnknownPduType(u8),
    UnknownSecurityModel(i32),
    InvalidMsgFlags(u8),
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length not supported"),
            Self::LengthTooLong { octets } => write!(f, "length uses {} octets", octets),
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes, {} available", needed, available)
            }
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::Integer64TooLong { length } => write!(f, "64-bit integer of {} bytes", length),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IpAddress of {} bytes", length)
            }
            Self::OidTooLong { count, max } => write!(f, "OID has {} arcs, max {}", count, max),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type 0x{:02X}", t),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model {}", m),
            Self::InvalidMsgFlags(flags) => write!(f, "invalid msgFlags 0x{:02X}", flags),
        }
    }
}

/// Why a privacy operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptoErrorKind {
    InvalidKeyLength,
    InvalidPrivParamsLength { expected: usize, actual: usize },
    InvalidCiphertextLength { length: usize, block_size: usize },
    CipherError,
}

impl fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(f, "privParameters of {} bytes, expected {}", actual, expected)
            }
            Self::InvalidCiphertextLength { length, block_size } => write!(
                f,
                "ciphertext length {} not a multiple of {}",
                length, block_size
            ),
            Self::CipherError => write!(f, "cipher operation failed"),
        }
    }
}
