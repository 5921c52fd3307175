// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bolt_client_rs::{
    codec::value::Value,
    pool::topology::{MemberRole, Topology, host_port_of},
};

fn overview_row(
    id: &str,
    addresses: &[&str],
    role: &str,
    database: &str,
) -> Vec<Value> {
    vec![
        Value::from(id),
        Value::List(addresses.iter().map(|a| Value::from(*a)).collect()),
        Value::from(role),
        Value::List(vec![Value::from("us-east")]),
        Value::from(database),
    ]
}

#[test]
fn test_full_cluster_parses() -> Result<()> {
    let rows = vec![
        overview_row(
            "core-1",
            &["http://10.0.0.1:7474", "bolt://10.0.0.1:7687"],
            "LEADER",
            "default",
        ),
        overview_row("core-2", &["bolt://10.0.0.2:7687"], "FOLLOWER", "default"),
        overview_row("core-3", &["bolt://10.0.0.3:7687"], "FOLLOWER", "default"),
        overview_row(
            "replica-1",
            &["bolt://10.0.1.1:7687"],
            "READ_REPLICA",
            "default",
        ),
    ];

    let topology = Topology::from_rows(&rows)?;
    assert_eq!(topology.leaders.len(), 1);
    assert_eq!(topology.followers.len(), 2);
    assert_eq!(topology.read_replicas.len(), 1);

    assert_eq!(topology.leaders[0].id, "core-1");
    assert_eq!(topology.leaders[0].role, MemberRole::Leader);
    // Picks the bolt address, not the first address.
    assert_eq!(topology.leaders[0].bolt_address, "10.0.0.1:7687");
    assert_eq!(topology.leaders[0].groups, vec!["us-east".to_string()]);
    assert_eq!(topology.leaders[0].database, "default");

    assert_eq!(topology.write_addresses(), vec!["10.0.0.1:7687"]);
    // Replicas come before followers for reads.
    assert_eq!(
        topology.read_addresses(),
        vec!["10.0.1.1:7687", "10.0.0.2:7687", "10.0.0.3:7687"]
    );
    Ok(())
}

#[test]
fn test_unknown_role_is_rejected() {
    let rows = vec![overview_row(
        "x",
        &["bolt://10.0.0.1:7687"],
        "ARBITER",
        "default",
    )];
    assert!(Topology::from_rows(&rows).is_err());
}

#[test]
fn test_non_string_column_is_rejected() {
    let rows = vec![vec![
        Value::Int(7),
        Value::List(vec![]),
        Value::from("leader"),
        Value::List(vec![]),
        Value::from("default"),
    ]];
    assert!(Topology::from_rows(&rows).is_err());
}

#[test]
fn test_host_port_of_strips_any_scheme() {
    assert_eq!(host_port_of("bolt://h:7687"), "h:7687");
    assert_eq!(host_port_of("bolt+routing://h:7687"), "h:7687");
    assert_eq!(host_port_of("h:7687"), "h:7687");
}

/// The refresh diff: addresses present before but absent after a refresh
/// are exactly the connections that must be pruned.
#[test]
fn test_topology_diff_for_pruning() -> Result<()> {
    let before = Topology::from_rows(&[
        overview_row("a", &["bolt://10.0.0.1:7687"], "leader", "default"),
        overview_row("b", &["bolt://10.0.0.2:7687"], "read_replica", "default"),
    ])?;
    let after = Topology::from_rows(&[
        overview_row("a", &["bolt://10.0.0.1:7687"], "leader", "default"),
        overview_row("c", &["bolt://10.0.0.3:7687"], "read_replica", "default"),
    ])?;

    let live: std::collections::HashSet<String> =
        after.read_addresses().into_iter().collect();
    let dead: Vec<String> = before
        .read_addresses()
        .into_iter()
        .filter(|addr| !live.contains(addr))
        .collect();
    assert_eq!(dead, vec!["10.0.0.2:7687"]);
    Ok(())
}
