//! # snmp-requester
//!
//! Async SNMP request client for many agents at once.
//!
//! ## Features
//!
//! - SNMPv1, v2c and v3 (USM with MD5/SHA authentication, DES/AES privacy)
//! - One UDP socket per address family shared by every registered target
//! - Request correlation with coarse 250 ms timeout slots
//! - GETBULK reshaping into scalars and table columns, and full table retrieval
//! - Optional packet tracing through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snmp_requester::{Client, Credential, OidList, oid};
//!
//! #[tokio::main]
//! async fn main() -> snmp_requester::Result<()> {
//!     let client = Client::builder().build();
//!     client.register_target("core-sw1", "192.0.2.1:161".parse().unwrap(), Credential::v2c("public"))?;
//!
//!     let oids = OidList::from(vec![oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
//!     let response = client.get("core-sw1", &oids).await?;
//!     println!("sysDescr: {}", response.varbinds[0].value);
//!     Ok(())
//! }
//! ```
//!
//! ## SNMPv3 and tables
//!
//! ```rust,no_run
//! use snmp_requester::{AuthProtocol, Client, Credential, OidList, PrivProtocol};
//!
//! #[tokio::main]
//! async fn main() -> snmp_requester::Result<()> {
//!     let client = Client::builder().build();
//!     let credential = Credential::usm("admin")
//!         .auth(AuthProtocol::Sha1, "authpass123")
//!         .privacy(PrivProtocol::Aes128, "privpass123");
//!     client.register_target("edge-rtr", "192.0.2.7:161".parse().unwrap(), credential)?;
//!
//!     let oids = OidList::parse([
//!         ("1.3.6.1.2.1.1.3", Some("sysUpTime")),
//!         ("1.3.6.1.2.1.2.2.1.2", Some("ifDescr")),
//!         ("1.3.6.1.2.1.2.2.1.10", Some("ifInOctets")),
//!     ])?;
//!     let table = client.table("edge-rtr", &oids, 20, 1).await?;
//!     if let Some(descr) = table.column("ifDescr") {
//!         for (index, vb) in &descr.rows {
//!             println!("{index}: {}", vb.value);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod client;
pub mod context;
pub mod correlator;
pub mod credential;
pub mod error;
pub mod format;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod scheduler;
pub mod trace;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod counters;
pub(crate) mod util;

pub use client::{AgentReachability, BulkTable, Client, ClientBuilder, ClientConfig, Column, OidList};
pub use context::{Inbound, SecurityContext, UsmPhase};
pub use counters::CounterSnapshot;
pub use credential::{Credential, UsmBuilder, UsmCredential};
pub use error::{AuthErrorKind, Error, ErrorCategory, ErrorStatus, Result};
pub use message::SecurityLevel;
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use trace::{Direction, PacketTrace, TracingPacketTrace};
pub use v3::{AuthProtocol, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
