// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use bolt_client_rs::{
    cfg::config::Config, client::error::PoolError, pool::BoltPool,
};
use serial_test::serial;

use crate::integration_tests::common::AutoServer;

async fn pool_config(server: &AutoServer, max_total: usize) -> Result<Config> {
    let mut cfg = Config::from_uri(&server.uri())?;
    cfg.pool.max_total = max_total;
    cfg.pool.max_idle = max_total;
    cfg.pool.borrow_timeout = Some(Duration::from_millis(300));
    Ok(cfg)
}

#[tokio::test]
#[serial]
async fn borrow_runs_and_reclaims() -> Result<()> {
    let server = AutoServer::spawn([0, 0, 0, 3]).await?;
    let pool = BoltPool::direct(pool_config(&server, 2).await?)?;

    let mut entry = pool.borrow().await?;
    assert_eq!(entry.borrow_count, 1);

    let result = entry.conn.exec("RETURN 1", Default::default()).await?;
    assert_eq!(
        result.metadata().get("type"),
        Some(&bolt_client_rs::codec::value::Value::from("r"))
    );

    pool.reclaim(entry).await?;
    assert_eq!(pool.idle_count().await, 1);

    // LIFO: the same connection comes back, warm.
    let entry = pool.borrow().await?;
    assert_eq!(entry.borrow_count, 2);
    pool.reclaim(entry).await?;

    pool.close().await;
    Ok(())
}

/// The pool never exceeds max_total live connections, and an exhausted
/// borrow blocks until the timeout.
#[tokio::test]
#[serial]
async fn exhausted_pool_blocks_then_times_out() -> Result<()> {
    let server = AutoServer::spawn([0, 0, 0, 3]).await?;
    let pool = BoltPool::direct(pool_config(&server, 2).await?)?;

    let first = pool.borrow().await?;
    let second = pool.borrow().await?;
    assert_eq!(pool.live_count().await, 2);

    let err = pool.borrow().await.expect_err("pool is exhausted");
    assert!(matches!(err, PoolError::Timeout), "got {err:?}");

    // A return unblocks the next borrower.
    pool.reclaim(first).await?;
    let third = pool.borrow().await?;

    pool.reclaim(second).await?;
    pool.reclaim(third).await?;

    assert!(server.peak_connections() <= 2, "exceeded max_total");
    pool.close().await;
    Ok(())
}

/// Passivation rolls an abandoned transaction back and drains an abandoned
/// stream before the connection goes idle.
#[tokio::test]
#[serial]
async fn reclaim_cleans_dirty_connections() -> Result<()> {
    let server = AutoServer::spawn([0, 0, 0, 3]).await?;
    let pool = BoltPool::direct(pool_config(&server, 2).await?)?;

    // Abandoned transaction.
    let mut entry = pool.borrow().await?;
    let tx = entry.conn.begin().await?;
    drop(tx);
    assert!(!entry.conn.validate());
    pool.reclaim(entry).await?;
    assert_eq!(pool.idle_count().await, 1);

    // Abandoned stream.
    let mut entry = pool.borrow().await?;
    {
        let mut rows = entry.conn.query("RETURN 1", Default::default()).await?;
        let _ = rows.next().await?;
        // Dropped mid-stream.
    }
    assert!(!entry.conn.validate());
    pool.reclaim(entry).await?;

    // Both came back clean and reusable.
    let entry = pool.borrow().await?;
    assert!(entry.conn.validate());
    pool.reclaim(entry).await?;

    pool.close().await;
    Ok(())
}

/// Closing the pool destroys idle connections and fails new borrows;
/// in-flight connections die on return.
#[tokio::test]
#[serial]
async fn closed_pool_rejects_borrows() -> Result<()> {
    let server = AutoServer::spawn([0, 0, 0, 3]).await?;
    let pool = BoltPool::direct(pool_config(&server, 2).await?)?;

    let inflight = pool.borrow().await?;
    let idle = pool.borrow().await?;
    pool.reclaim(idle).await?;
    assert_eq!(pool.idle_count().await, 1);

    pool.close().await;
    assert_eq!(pool.idle_count().await, 0);

    let err = pool.borrow().await.expect_err("pool is closed");
    assert!(matches!(err, PoolError::Closed), "got {err:?}");

    // Returning the in-flight connection destroys it.
    pool.reclaim(inflight).await?;
    assert_eq!(pool.live_count().await, 0);
    Ok(())
}

/// A validate-failing idle connection is destroyed and replaced on borrow.
#[tokio::test]
#[serial]
async fn invalid_idle_connection_is_replaced() -> Result<()> {
    let server = AutoServer::spawn([0, 0, 0, 3]).await?;
    let pool = BoltPool::direct(pool_config(&server, 2).await?)?;

    let mut entry = pool.borrow().await?;
    let id = entry.id().to_string();
    // Kill the connection behind the pool's back.
    entry.conn.close().await?;
    // A dead connection is destroyed on return, not pooled.
    pool.reclaim(entry).await?;
    assert_eq!(pool.idle_count().await, 0);

    let entry = pool.borrow().await?;
    assert_ne!(entry.id(), id, "dead connection must not be handed out");
    assert!(entry.conn.validate());
    pool.reclaim(entry).await?;

    pool.close().await;
    Ok(())
}
