// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bolt_client_rs::{
    cfg::{config::Config, enums::AccessMode},
    client::error::PoolError,
    pool::routing::RoutingPool,
};
use serial_test::serial;

use crate::integration_tests::common::{AutoServer, overview_row};

/// Leader A and replica B, with A serving the overview.
async fn two_member_cluster() -> Result<(std::sync::Arc<AutoServer>, std::sync::Arc<AutoServer>)>
{
    let leader = AutoServer::spawn([0, 0, 0, 4]).await?;
    let replica = AutoServer::spawn([0, 0, 0, 4]).await?;

    let rows = vec![
        overview_row("leader-1", &leader.address(), "leader"),
        overview_row("replica-1", &replica.address(), "read_replica"),
    ];
    leader.set_overview(rows.clone()).await;
    replica.set_overview(rows).await;

    Ok((leader, replica))
}

fn routing_config(leader: &AutoServer, max_total: usize) -> Result<Config> {
    let mut cfg = Config::from_uri(&format!(
        "bolt+routing://127.0.0.1:{}",
        leader.addr.port()
    ))?;
    cfg.pool.max_total = max_total;
    cfg.pool.max_idle = max_total;
    cfg.pool.min_idle = 1;
    cfg.pool.borrow_timeout = Some(std::time::Duration::from_millis(300));
    Ok(cfg)
}

/// Writes land on the leader, reads on the replica; reclaim by id works and
/// an unknown id fails fast.
#[tokio::test]
#[serial]
async fn borrow_routes_by_access_mode() -> Result<()> {
    let (leader, replica) = two_member_cluster().await?;
    let pool = RoutingPool::start(routing_config(&leader, 4)?).await?;

    let write = pool.borrow(AccessMode::Write).await?;
    assert_eq!(write.conn_string, leader.address());
    assert_eq!(write.access_mode, AccessMode::Write);

    let read = pool.borrow(AccessMode::Read).await?;
    assert_eq!(read.conn_string, replica.address());
    assert_eq!(read.access_mode, AccessMode::Read);

    pool.reclaim(write).await?;
    pool.reclaim(read).await?;

    // Reclaiming a connection the routing pool never lent out fails fast.
    let mut direct_cfg = Config::from_uri(&leader.uri())?;
    direct_cfg.pool.max_total = 1;
    let direct = bolt_client_rs::pool::BoltPool::direct(direct_cfg)?;
    let foreign = direct.borrow().await?;
    let err = pool.reclaim(foreign).await.expect_err("unknown id must fail");
    assert!(matches!(err, PoolError::UnknownConnection(_)), "got {err:?}");
    direct.close().await;

    pool.close().await;
    Ok(())
}

/// Odd capacity gives the spare slot to writes.
#[tokio::test]
#[serial]
async fn odd_capacity_favors_writes() -> Result<()> {
    let (leader, _replica) = two_member_cluster().await?;
    let pool = RoutingPool::start(routing_config(&leader, 5)?).await?;

    // ceil(5 / 2) = 3 write slots.
    let mut writes = Vec::new();
    for _ in 0..3 {
        writes.push(pool.borrow(AccessMode::Write).await?);
    }

    // A fourth write slot does not exist.
    let err = pool
        .borrow(AccessMode::Write)
        .await
        .expect_err("write half is exhausted");
    assert!(matches!(err, PoolError::Timeout), "got {err:?}");

    // The read half still has its two slots.
    let read = pool.borrow(AccessMode::Read).await?;
    pool.reclaim(read).await?;

    for entry in writes {
        pool.reclaim(entry).await?;
    }

    pool.close().await;
    Ok(())
}

/// After a refresh that drops a member, connections to it are pruned and
/// new borrows target the surviving topology. Spec invariant: no borrow
/// returns a connection to a departed member.
#[tokio::test]
#[serial]
async fn refresh_prunes_departed_members() -> Result<()> {
    let (leader, replica) = two_member_cluster().await?;
    let replacement = AutoServer::spawn([0, 0, 0, 4]).await?;

    let pool = RoutingPool::start(routing_config(&leader, 4)?).await?;

    // Warm a read connection to the original replica.
    let read = pool.borrow(AccessMode::Read).await?;
    assert_eq!(read.conn_string, replica.address());
    pool.reclaim(read).await?;

    // The replica departs; a replacement joins.
    let new_rows = vec![
        overview_row("leader-1", &leader.address(), "leader"),
        overview_row("replica-2", &replacement.address(), "read_replica"),
    ];
    leader.set_overview(new_rows).await;
    pool.refresh().await;

    let topology = pool.current_topology().await;
    assert_eq!(topology.read_addresses(), vec![replacement.address()]);

    // Every read borrow now lands on the replacement.
    let read = pool.borrow(AccessMode::Read).await?;
    assert_eq!(read.conn_string, replacement.address());
    pool.reclaim(read).await?;

    pool.close().await;
    Ok(())
}

/// A failed refresh keeps the last known topology.
#[tokio::test]
#[serial]
async fn failed_refresh_retains_topology() -> Result<()> {
    let (leader, replica) = two_member_cluster().await?;
    let pool = RoutingPool::start(routing_config(&leader, 4)?).await?;

    // Poison the overview so the next refresh cannot parse members.
    leader.set_overview(Vec::new()).await;
    pool.refresh().await;

    let topology = pool.current_topology().await;
    assert_eq!(topology.write_addresses(), vec![leader.address()]);
    assert_eq!(topology.read_addresses(), vec![replica.address()]);

    pool.close().await;
    Ok(())
}

/// Routing pools demand capacity for both halves.
#[tokio::test]
#[serial]
async fn routing_pool_rejects_tiny_capacity() -> Result<()> {
    let (leader, _replica) = two_member_cluster().await?;

    let mut cfg = routing_config(&leader, 4)?;
    cfg.pool.max_total = 1;
    let err = RoutingPool::start(cfg).await.expect_err("must fail");
    assert!(matches!(err, PoolError::Connection(_)), "got {err:?}");
    Ok(())
}
