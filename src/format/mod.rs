//! Formatting helpers for diagnostics.
//!
//! ```
//! use snmp_requester::format::hex;
//!
//! assert_eq!(hex::encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
//! println!("{}", hex::Bytes(&[0x00, 0xff])); // prints: 00ff
//! ```

pub mod hex;
