//! SNMPv1/v2c request tests against in-process agents.

mod common;

use common::{CommunityAgent, Collector, Mib, UdpPeer, community_request, sys_descr, sys_name, system_mib};
use snmp_requester::message::CommunityMessage;
use snmp_requester::{
    AgentReachability, Client, Credential, Direction, Error, ErrorStatus, OidList, Pdu, Value,
    Version,
};
use std::time::Duration;

fn client() -> Client {
    Client::builder().build()
}

/// Basic GET returns the agent's value and leaves nothing pending.
#[tokio::test]
async fn get_returns_value() {
    common::init_tracing();
    let agent = CommunityAgent::spawn(Mib::new(system_mib())).await;
    let client = client();
    client
        .register_target("agent", agent.addr(), Credential::v2c("public"))
        .unwrap();

    let response = client
        .get("agent", &OidList::from(vec![sys_descr()]))
        .await
        .unwrap();

    assert_eq!(response.varbinds.len(), 1);
    assert_eq!(response.varbinds[0].value.as_str(), Some("Test SNMP Agent"));
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.reachability("agent"), Some(AgentReachability::Reachable));

    let counters = client.counters();
    assert_eq!(counters.sent_requests, 1);
    assert_eq!(counters.sent_messages, 1);
    assert_eq!(counters.received_messages, 1);
    assert_eq!(counters.received_responses, 1);
    assert!(counters.sent_bytes > 0);

    client.reset_counters();
    assert_eq!(client.counters().sent_messages, 0);
}

/// SNMPv1 uses the same path with a version-0 message.
#[tokio::test]
async fn v1_get_returns_value() {
    let agent = CommunityAgent::spawn(Mib::new(system_mib())).await;
    let client = client();
    client
        .register_target("agent", agent.addr(), Credential::v1("public"))
        .unwrap();

    let response = client
        .get("agent", &OidList::from(vec![sys_name()]))
        .await
        .unwrap();
    assert_eq!(response.varbinds[0].value.as_str(), Some("test-agent"));
}

/// GETNEXT returns the lexicographic successor.
#[tokio::test]
async fn get_next_returns_successor() {
    let agent = CommunityAgent::spawn(Mib::new(system_mib())).await;
    let client = client();
    client
        .register_target("agent", agent.addr(), Credential::v2c("public"))
        .unwrap();

    let response = client
        .get_next("agent", &OidList::from(vec![sys_descr()]))
        .await
        .unwrap();
    assert_eq!(response.varbinds[0].oid, common::sys_uptime());
    assert_eq!(response.varbinds[0].value, Value::TimeTicks(123456));
}

/// Requests to two agents in flight at once each get their own answer.
#[tokio::test]
async fn concurrent_requests_to_two_agents() {
    let first = CommunityAgent::spawn(Mib::new(system_mib())).await;
    let mut other = system_mib();
    other.insert(sys_descr(), Value::from("Other Agent"));
    let second = CommunityAgent::spawn(Mib::new(other)).await;

    let client = client();
    client
        .register_target("first", first.addr(), Credential::v2c("public"))
        .unwrap();
    client
        .register_target("second", second.addr(), Credential::v2c("public"))
        .unwrap();

    let oids = OidList::from(vec![sys_descr()]);
    let (a, b) = tokio::join!(client.get("first", &oids), client.get("second", &oids));
    assert_eq!(a.unwrap().varbinds[0].value.as_str(), Some("Test SNMP Agent"));
    assert_eq!(b.unwrap().varbinds[0].value.as_str(), Some("Other Agent"));
    assert_eq!(first.requests(), 1);
    assert_eq!(second.requests(), 1);
}

/// A non-zero error status becomes an SNMP error naming the offending varbind.
#[tokio::test]
async fn error_status_maps_to_snmp_error() {
    let peer = UdpPeer::bind().await;
    let client = client();
    client
        .register_target("agent", peer.addr(), Credential::v1("public"))
        .unwrap();

    let oids = OidList::from(vec![sys_descr()]);
    let script = async {
        let (data, from) = peer.recv().await;
        let request = community_request(&data);
        assert_eq!(request.version, Version::V1);
        let mut response = Pdu::response(request.pdu.request_id, request.pdu.varbinds.clone());
        response.error_status = ErrorStatus::NoSuchName.as_i32();
        response.error_index = 1;
        let reply = CommunityMessage::new(Version::V1, "public", response).encode();
        peer.send(&reply, from).await;
    };
    let (result, ()) = tokio::join!(client.get("agent", &oids), script);

    match *result.unwrap_err() {
        Error::Snmp {
            status, index, ref oid, ..
        } => {
            assert_eq!(status, ErrorStatus::NoSuchName);
            assert_eq!(index, 1);
            assert_eq!(oid.as_ref(), Some(&sys_descr()));
        }
        ref other => panic!("expected SNMP error, got {other:?}"),
    }
    assert_eq!(client.reachability("agent"), Some(AgentReachability::Reachable));
}

/// Silence yields a timeout, marks the agent unreachable and clears the request.
#[tokio::test(start_paused = true)]
async fn timeout_marks_unreachable() {
    let peer = UdpPeer::bind().await;
    let client = Client::builder()
        .request_timeout(Duration::from_secs(2))
        .build();
    client
        .register_target("agent", peer.addr(), Credential::v2c("public"))
        .unwrap();

    let err = client
        .get("agent", &OidList::from(vec![sys_descr()]))
        .await
        .unwrap_err();
    match *err {
        Error::Timeout { target, elapsed, .. } => {
            assert_eq!(target, peer.addr());
            assert!(elapsed >= Duration::from_secs(2));
        }
        ref other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.reachability("agent"), Some(AgentReachability::Unreachable));
}

/// Replies sent from an address other than the target's are ignored.
#[tokio::test]
async fn reply_from_other_address_is_ignored() {
    let peer = UdpPeer::bind().await;
    let impostor = UdpPeer::bind().await;
    let client = Client::builder()
        .request_timeout(Duration::from_millis(500))
        .build();
    client
        .register_target("agent", peer.addr(), Credential::v2c("public"))
        .unwrap();

    let oids = OidList::from(vec![sys_descr()]);
    let script = async {
        let (data, from) = peer.recv().await;
        let request = community_request(&data);
        let reply = CommunityMessage::new(Version::V2c, "public", Pdu::response(request.pdu.request_id, vec![])).encode();
        impostor.send(&reply, from).await;
    };
    let (result, ()) = tokio::join!(client.get("agent", &oids), script);

    assert!(matches!(*result.unwrap_err(), Error::Timeout { .. }));
}

/// Shutdown fails requests still waiting for a reply.
#[tokio::test]
async fn shutdown_rejects_pending_requests() {
    let peer = UdpPeer::bind().await;
    let client = client();
    client
        .register_target("agent", peer.addr(), Credential::v2c("public"))
        .unwrap();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.get("agent", &OidList::from(vec![sys_descr()])).await })
    };
    peer.recv().await;
    client.shutdown();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(*err, Error::Transport { .. }));
    assert_eq!(client.pending_requests(), 0);
}

/// An explicit request id already in flight is refused.
#[tokio::test]
async fn duplicate_request_id_is_rejected() {
    let peer = UdpPeer::bind().await;
    let client = client();
    client
        .register_target("agent", peer.addr(), Credential::v2c("public"))
        .unwrap();

    let first = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .send_request_pdu("agent", Pdu::get_request(77, &[sys_descr()]))
                .await
        })
    };
    peer.recv().await;

    let err = client
        .send_request_pdu("agent", Pdu::get_request(77, &[sys_descr()]))
        .await
        .unwrap_err();
    assert!(matches!(*err, Error::DuplicateRequestId(77)));

    client.shutdown();
    assert!(first.await.unwrap().is_err());
}

/// A packet trace sees both directions of an exchange.
#[tokio::test]
async fn packet_trace_records_both_directions() {
    let agent = CommunityAgent::spawn(Mib::new(system_mib())).await;
    let collector = Collector::default();
    let client = Client::builder().trace(collector.clone()).build();
    client
        .register_target("agent", agent.addr(), Credential::v2c("public"))
        .unwrap();

    client
        .get("agent", &OidList::from(vec![sys_descr()]))
        .await
        .unwrap();

    assert_eq!(
        collector.records(),
        vec![
            (Direction::Outgoing, agent.addr()),
            (Direction::Incoming, agent.addr())
        ]
    );
}

/// Garbage from a peer is counted and otherwise ignored.
#[tokio::test]
async fn invalid_datagram_is_counted() {
    let peer = UdpPeer::bind().await;
    let client = Client::builder()
        .request_timeout(Duration::from_millis(500))
        .build();
    client
        .register_target("agent", peer.addr(), Credential::v2c("public"))
        .unwrap();

    let oids = OidList::from(vec![sys_descr()]);
    let script = async {
        let (data, from) = peer.recv().await;
        peer.send(&[0xFF, 0x00, 0x01], from).await;
        let request = community_request(&data);
        let response = Pdu::response(request.pdu.request_id, request.pdu.varbinds.clone());
        let reply = CommunityMessage::new(Version::V2c, "public", response).encode();
        peer.send(&reply, from).await;
    };
    let (result, ()) = tokio::join!(client.get("agent", &oids), script);

    assert!(result.is_ok());
    let counters = client.counters();
    assert_eq!(counters.received_invalid_packets, 1);
    assert_eq!(counters.received_responses, 1);
}
