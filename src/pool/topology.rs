// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cluster topology discovery.
//!
//! The overview procedure reports every member as
//! `[id, addresses, role, groups, database]`. Members are partitioned by
//! role; writes go to leaders, reads to read replicas first and followers
//! after them. A member without a bolt-scheme address cannot be dialed and
//! is skipped.

use tracing::debug;

use crate::{
    client::{conn::Connection, error::BoltError},
    codec::value::Value,
    proto::version::BoltVersion,
};

/// The statement that returns the cluster overview rows.
pub const CLUSTER_OVERVIEW_QUERY: &str = "call dbms.cluster.overview()";

/// Database the overview must run against on v4 servers.
pub const SYSTEM_DATABASE: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Leader,
    Follower,
    ReadReplica,
}

impl MemberRole {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "leader" => Some(MemberRole::Leader),
            "follower" => Some(MemberRole::Follower),
            "read_replica" => Some(MemberRole::ReadReplica),
            _ => None,
        }
    }
}

/// One cluster member as reported by the overview.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: String,
    pub addresses: Vec<String>,
    pub role: MemberRole,
    pub groups: Vec<String>,
    pub database: String,
    /// The first advertised address with a bolt scheme, as a dialable
    /// `host:port`.
    pub bolt_address: String,
}

/// The cluster partitioned by role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub leaders: Vec<Member>,
    pub followers: Vec<Member>,
    pub read_replicas: Vec<Member>,
}

impl Topology {
    /// Addresses write connections may target.
    pub fn write_addresses(&self) -> Vec<String> {
        self.leaders.iter().map(|m| m.bolt_address.clone()).collect()
    }

    /// Addresses read connections may target: replicas first, followers as
    /// backup.
    pub fn read_addresses(&self) -> Vec<String> {
        self.read_replicas
            .iter()
            .chain(self.followers.iter())
            .map(|m| m.bolt_address.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
            && self.followers.is_empty()
            && self.read_replicas.is_empty()
    }

    /// Builds a topology from overview rows, skipping members without a
    /// bolt address.
    pub fn from_rows(rows: &[Vec<Value>]) -> Result<Self, BoltError> {
        let mut topology = Topology::default();

        for row in rows {
            let Some(member) = parse_member(row)? else {
                continue;
            };
            match member.role {
                MemberRole::Leader => topology.leaders.push(member),
                MemberRole::Follower => topology.followers.push(member),
                MemberRole::ReadReplica => topology.read_replicas.push(member),
            }
        }

        Ok(topology)
    }
}

/// Runs the overview over an established connection and parses the result.
/// On v4 the statement is routed to the system database.
pub async fn fetch_topology(conn: &mut Connection) -> Result<Topology, BoltError> {
    let database = if conn.protocol().version() == BoltVersion::V4 {
        SYSTEM_DATABASE
    } else {
        ""
    };

    let rows = conn
        .query_with_db(CLUSTER_OVERVIEW_QUERY, Default::default(), database)
        .await?;
    let (records, _) = rows.all().await?;

    Topology::from_rows(&records)
}

/// `[id, addresses, role, groups, database]` → one member, or `None` when
/// the member advertises no bolt address.
fn parse_member(row: &[Value]) -> Result<Option<Member>, BoltError> {
    if row.len() != 5 {
        return Err(BoltError::Protocol(format!(
            "invalid number of columns for query {CLUSTER_OVERVIEW_QUERY:?}: {} != 5",
            row.len()
        )));
    }

    let id = expect_string(&row[0], "member id")?;
    let addresses = expect_string_list(&row[1], "member addresses")?;
    let role_raw = expect_string(&row[2], "member role")?;
    let groups = expect_string_list(&row[3], "member groups")?;
    let database = expect_string(&row[4], "member database")?;

    let Some(bolt_raw) = addresses.iter().find(|a| a.contains("bolt")) else {
        debug!(%id, "skipping member without a bolt connection string");
        return Ok(None);
    };
    let bolt_address = host_port_of(bolt_raw);

    let role = MemberRole::parse(&role_raw).ok_or_else(|| {
        BoltError::Protocol(format!("unknown cluster role {role_raw:?}"))
    })?;

    Ok(Some(Member {
        id,
        addresses,
        role,
        groups,
        database,
        bolt_address,
    }))
}

/// Strips a URI scheme off an advertised address, leaving `host:port`.
pub fn host_port_of(address: &str) -> String {
    match address.split_once("://") {
        Some((_, rest)) => rest.to_string(),
        None => address.to_string(),
    }
}

fn expect_string(value: &Value, what: &'static str) -> Result<String, BoltError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BoltError::Protocol(format!("unable to parse {what} as string")))
}

fn expect_string_list(
    value: &Value,
    what: &'static str,
) -> Result<Vec<String>, BoltError> {
    let items = value
        .as_list()
        .ok_or_else(|| BoltError::Protocol(format!("unable to parse {what} as list")))?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                BoltError::Protocol(format!("unable to parse {what} entry as string"))
            })
        })
        .collect()
}
