// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection lifecycle hooks.
//!
//! The pool is generic over a small create/validate/activate/passivate/
//! destroy surface. The simple pool and the routing pool's two halves share
//! one implementation, [`BoltFactory`], which differs only in where its
//! target addresses come from.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::RwLock;

use crate::{
    cfg::{config::Config, enums::AccessMode},
    client::{conn::Connection, error::BoltError},
    utils::connection_id,
};

/// The five hooks a pooled connection passes through.
pub trait ConnectionLifecycle: Send + Sync {
    /// Dial, handshake and authenticate a fresh connection, returning it
    /// together with the address it was dialed at.
    fn create(
        &self,
    ) -> impl Future<Output = Result<(Connection, String), BoltError>> + Send;

    /// Cheap liveness check run on borrow, on return and on idle sweeps.
    fn validate(&self, conn: &Connection) -> bool {
        conn.validate()
    }

    /// Prepare a just-borrowed connection for use.
    fn activate(
        &self,
        _conn: &mut Connection,
    ) -> impl Future<Output = Result<(), BoltError>> + Send {
        async { Ok(()) }
    }

    /// Return a connection to Ready before it goes back on the stack:
    /// abandoned transactions are rolled back, abandoned streams discarded.
    fn passivate(
        &self,
        conn: &mut Connection,
    ) -> impl Future<Output = Result<(), BoltError>> + Send {
        async { conn.make_idle().await }
    }

    /// Tear the connection down, sending GOODBYE where the version has one.
    fn destroy(&self, mut conn: Connection) -> impl Future<Output = ()> + Send {
        async move {
            let _ = conn.close().await;
        }
    }
}

/// A rotating set of cluster addresses shared with the refresh task.
#[derive(Debug, Default)]
pub struct RotatingTargets {
    addresses: RwLock<Vec<String>>,
    next: AtomicUsize,
}

impl RotatingTargets {
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses: RwLock::new(addresses),
            next: AtomicUsize::new(0),
        }
    }

    /// Round-robins over the current address set.
    pub async fn next_address(&self) -> Option<String> {
        let addresses = self.addresses.read().await;
        if addresses.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % addresses.len();
        Some(addresses[idx].clone())
    }

    pub async fn replace(&self, addresses: Vec<String>) {
        *self.addresses.write().await = addresses;
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.addresses.read().await.clone()
    }
}

/// Where a factory finds the next address to dial.
#[derive(Debug, Clone)]
pub enum Targets {
    /// A single fixed endpoint (the simple pool).
    Fixed(String),
    /// Cluster members maintained by the routing refresh task.
    Rotating(Arc<RotatingTargets>),
}

/// Creates Bolt connections for one pool.
#[derive(Debug, Clone)]
pub struct BoltFactory {
    config: Config,
    targets: Targets,
    mode: AccessMode,
}

impl BoltFactory {
    pub fn new(config: Config, targets: Targets, mode: AccessMode) -> Self {
        Self {
            config,
            targets,
            mode,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    async fn next_target(&self) -> Result<String, BoltError> {
        match &self.targets {
            Targets::Fixed(addr) => Ok(addr.clone()),
            Targets::Rotating(rotating) => {
                rotating.next_address().await.ok_or_else(|| {
                    BoltError::Configuration(format!(
                        "no cluster members available for {} connections",
                        self.mode
                    ))
                })
            },
        }
    }
}

impl ConnectionLifecycle for BoltFactory {
    async fn create(&self) -> Result<(Connection, String), BoltError> {
        let target = self.next_target().await?;
        let member_config = self
            .config
            .with_address(&target)
            .map_err(|e| BoltError::Configuration(e.to_string()))?;

        let mut conn = Connection::connect(&member_config).await?;
        conn.set_access_mode(self.mode);
        conn.set_id(connection_id(self.mode));

        Ok((conn, member_config.endpoint.address()))
    }
}
