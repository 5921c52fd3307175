// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bolt_client_rs::{
    cfg::config::Config,
    client::{conn::Connection, error::BoltError},
    codec::value::Value,
    proto::version::{BoltVersion, VersionPolicy},
};

use crate::integration_tests::common::{ScriptedServer, expect, send, success};

/// The rollback scenario on v3: BEGIN, a statement, ROLLBACK, and the
/// connection comes back Ready with nothing committed.
#[tokio::test]
async fn transaction_rollback_v3() -> Result<()> {
    let server = ScriptedServer::spawn(
        [0, 0, 0, 3],
        vec![
            expect(0x01), // HELLO
            send(success(&[])),
            expect(0x11), // BEGIN
            send(success(&[])),
            expect(0x10), // RUN create
            expect(0x3F), // PULL_ALL
            send(success(&[("fields", Value::List(vec![]))])),
            send(success(&[])),
            expect(0x13), // ROLLBACK
            send(success(&[])),
        ],
    )
    .await?;

    let mut cfg = Config::from_uri(&server.uri())?;
    cfg.connection.version = VersionPolicy::Strict(BoltVersion::V3);
    let mut conn = Connection::connect(&cfg).await?;

    let mut tx = conn.begin().await?;
    tx.exec("CREATE (n:Thing)", Default::default()).await?;
    tx.rollback().await?;

    assert!(conn.validate());
    conn.close().await?;
    Ok(())
}

/// Commit on v3 sends the dedicated COMMIT message.
#[tokio::test]
async fn transaction_commit_v3() -> Result<()> {
    let server = ScriptedServer::spawn(
        [0, 0, 0, 3],
        vec![
            expect(0x01),
            send(success(&[])),
            expect(0x11), // BEGIN
            send(success(&[])),
            expect(0x12), // COMMIT
            send(success(&[("bookmark", Value::from("neo4j:bookmark:v1:tx42"))])),
        ],
    )
    .await?;

    let mut cfg = Config::from_uri(&server.uri())?;
    cfg.connection.version = VersionPolicy::Strict(BoltVersion::V3);
    let mut conn = Connection::connect(&cfg).await?;

    let tx = conn.begin().await?;
    tx.commit().await?;

    assert!(conn.validate());
    conn.close().await?;
    Ok(())
}

/// Legacy versions drive transactions with RUN statements chased by
/// PULL_ALL, two SUCCESSes each.
#[tokio::test]
async fn transaction_commit_v1_legacy() -> Result<()> {
    let server = ScriptedServer::spawn(
        [0, 0, 0, 1],
        vec![
            expect(0x01), // INIT
            send(success(&[])),
            expect(0x10), // RUN "BEGIN"
            expect(0x3F),
            send(success(&[])),
            send(success(&[])),
            expect(0x10), // RUN "COMMIT"
            expect(0x3F),
            send(success(&[])),
            send(success(&[])),
        ],
    )
    .await?;

    let mut cfg = Config::from_uri(&server.uri())?;
    cfg.connection.version = VersionPolicy::Strict(BoltVersion::V1);
    let mut conn = Connection::connect(&cfg).await?;

    let tx = conn.begin().await?;
    tx.commit().await?;

    assert!(conn.validate());
    conn.close().await?;
    Ok(())
}

/// A second BEGIN while one transaction is open is a usage error.
#[tokio::test]
async fn nested_begin_is_a_usage_error() -> Result<()> {
    let server = ScriptedServer::spawn(
        [0, 0, 0, 3],
        vec![
            expect(0x01),
            send(success(&[])),
            expect(0x11),
            send(success(&[])),
            expect(0x13), // ROLLBACK
            send(success(&[])),
        ],
    )
    .await?;

    let mut cfg = Config::from_uri(&server.uri())?;
    cfg.connection.version = VersionPolicy::Strict(BoltVersion::V3);
    let mut conn = Connection::connect(&cfg).await?;

    let tx = conn.begin().await?;
    drop(tx);
    // The transaction flag survives the dropped guard.
    let err = conn.begin().await.expect_err("nested begin must fail");
    assert!(matches!(err, BoltError::Usage(_)), "got {err:?}");

    // Passivation rolls the abandoned transaction back.
    conn.make_idle().await?;
    assert!(conn.validate());
    conn.close().await?;
    Ok(())
}

/// Requesting a database on a pre-v4 connection is a usage error before
/// anything hits the wire.
#[tokio::test]
async fn multi_database_requires_v4() -> Result<()> {
    let server = ScriptedServer::spawn(
        [0, 0, 0, 3],
        vec![expect(0x01), send(success(&[]))],
    )
    .await?;

    let mut cfg = Config::from_uri(&server.uri())?;
    cfg.connection.version = VersionPolicy::Strict(BoltVersion::V3);
    let mut conn = Connection::connect(&cfg).await?;

    let err = conn
        .exec_with_db("RETURN 1", Default::default(), "movies")
        .await
        .expect_err("must fail");
    assert!(matches!(err, BoltError::Usage(_)), "got {err:?}");

    // Nothing was sent; the connection is untouched.
    assert!(conn.validate());
    conn.close().await?;
    Ok(())
}
