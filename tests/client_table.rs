//! GETBULK reshaping and table retrieval tests.

mod common;

use common::{
    CommunityAgent, Collector, Mib, UdpPeer, community_request, if_descr, if_in_octets,
    interface_mib, sys_uptime,
};
use snmp_requester::message::CommunityMessage;
use snmp_requester::{
    Client, Credential, Direction, OidList, Pdu, Value, VarBind, Version, oid,
};

fn interface_columns() -> OidList {
    let mut oids = OidList::new();
    oids.push(oid!(1, 3, 6, 1, 2, 1, 1, 3), Some("uptime"));
    oids.push(if_descr(), Some("ifDescr"));
    oids.push(if_in_octets(), Some("ifInOctets"));
    oids
}

/// One GETBULK round split into a scalar and two columns.
#[tokio::test]
async fn get_bulk_normalized_splits_scalars_and_columns() {
    let agent = CommunityAgent::spawn(Mib::new(interface_mib(3))).await;
    let client = Client::builder().build();
    client
        .register_target("agent", agent.addr(), Credential::v2c("public"))
        .unwrap();

    // GETNEXT of the sysUpTime parent lands on sysUpTime.0.
    let oids = interface_columns();

    let table = client
        .get_bulk_normalized("agent", &oids, None, 3, 1)
        .await
        .unwrap();

    assert_eq!(table.scalar("uptime").unwrap().value, Value::TimeTicks(123456));
    let descr = table.column("ifDescr").unwrap();
    assert_eq!(descr.len(), 3);
    assert_eq!(descr.get(&oid!(2)).unwrap().value.as_str(), Some("eth1"));
    let octets = table.column("ifInOctets").unwrap();
    assert_eq!(octets.get(&oid!(3)).unwrap().value, Value::Counter32(3000));
}

/// Walking a table re-requests each column until it comes back short.
#[tokio::test]
async fn table_walks_until_columns_end() {
    let agent = CommunityAgent::spawn(Mib::new(interface_mib(5))).await;
    let collector = Collector::default();
    let client = Client::builder().trace(collector.clone()).build();
    client
        .register_target("agent", agent.addr(), Credential::v2c("public"))
        .unwrap();

    let oids = interface_columns();
    let table = client.table("agent", &oids, 2, 1).await.unwrap();

    assert_eq!(table.scalars.len(), 1);
    assert_eq!(table.scalars[0].0, "uptime");
    assert_eq!(table.scalars[0].1.oid, sys_uptime());

    let descr = table.column("ifDescr").unwrap();
    assert_eq!(descr.len(), 5);
    assert_eq!(descr.get(&oid!(5)).unwrap().value.as_str(), Some("eth4"));
    assert_eq!(table.column("ifInOctets").unwrap().len(), 5);

    // rows 1-2, rows 3-4, row 5 plus out-of-column successors
    let sent = collector
        .records()
        .into_iter()
        .filter(|(direction, _)| *direction == Direction::Outgoing)
        .count();
    assert_eq!(sent, 3);
    assert_eq!(agent.requests(), 3);
}

/// `fetch_table` uses the configured max-repetitions and no scalars.
#[tokio::test]
async fn fetch_table_uses_configured_repetitions() {
    let agent = CommunityAgent::spawn(Mib::new(interface_mib(4))).await;
    let client = Client::builder().max_repetitions(10).build();
    client
        .register_target("agent", agent.addr(), Credential::v2c("public"))
        .unwrap();

    let oids = OidList::from(vec![if_descr()]);
    let table = client.fetch_table("agent", &oids).await.unwrap();

    assert!(table.scalars.is_empty());
    assert_eq!(table.columns.len(), 1);
    assert_eq!(table.columns[0].len(), 4);
    assert_eq!(agent.requests(), 1);
}

/// An agent that keeps returning the same rows does not loop the walk forever.
#[tokio::test]
async fn table_stops_when_column_does_not_advance() {
    let peer = UdpPeer::bind().await;
    let client = Client::builder().build();
    client
        .register_target("agent", peer.addr(), Credential::v2c("public"))
        .unwrap();

    let oids = OidList::from(vec![if_descr()]);
    let script = async {
        for _ in 0..2 {
            let (data, from) = peer.recv().await;
            let request = community_request(&data);
            let rows = vec![
                VarBind::new(if_descr().child(1), Value::from("eth0")),
                VarBind::new(if_descr().child(2), Value::from("eth1")),
            ];
            let reply =
                CommunityMessage::new(Version::V2c, "public", Pdu::response(request.pdu.request_id, rows))
                    .encode();
            peer.send(&reply, from).await;
        }
    };
    let (result, ()) = tokio::join!(client.table("agent", &oids, 2, 0), script);

    let table = result.unwrap();
    assert_eq!(table.columns[0].len(), 2);
    assert_eq!(client.counters().sent_requests, 2);
}
