//! Standard test fixtures with realistic MIB data.

use snmp_requester::{Oid, Value, oid};
use std::collections::BTreeMap;

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

/// ifDescr column (1.3.6.1.2.1.2.2.1.2).
pub fn if_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)
}

/// ifInOctets column (1.3.6.1.2.1.2.2.1.10).
pub fn if_in_octets() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10)
}

/// sysDescr, sysUpTime and sysName.
pub fn system_mib() -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();
    data.insert(sys_descr(), Value::from("Test SNMP Agent"));
    data.insert(sys_uptime(), Value::TimeTicks(123456));
    data.insert(sys_name(), Value::from("test-agent"));
    data
}

/// System group plus `count` rows of ifDescr and ifInOctets, indexed 1..=count.
pub fn interface_mib(count: u32) -> BTreeMap<Oid, Value> {
    let mut data = system_mib();
    data.insert(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(count as i32));
    for index in 1..=count {
        data.insert(
            if_descr().child(index),
            Value::from(format!("eth{}", index - 1).as_str()),
        );
        data.insert(if_in_octets().child(index), Value::Counter32(index * 1000));
    }
    data
}
