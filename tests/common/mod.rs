//! Shared test infrastructure for snmp-requester.
//!
//! Provides an in-process community agent backed by a MIB map, a raw UDP
//! peer for scripted exchanges, and USM key material for v3 agents.

// Not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod mib;
pub mod peer;
pub mod usm;

pub use fixtures::{
    if_descr, if_in_octets, interface_mib, sys_descr, sys_name, sys_uptime, system_mib,
};
pub use mib::{CommunityAgent, Mib};
pub use peer::{Collector, UdpPeer, community_request};
pub use usm::{ENGINE_ID, UsmAgent, V3Request};

/// Install a fmt subscriber honoring `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
