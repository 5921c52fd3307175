// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A cluster-aware pool routing reads and writes to different members.
//!
//! Two simple pools sit underneath: writes borrow from a pool dialing
//! leaders, reads from one dialing read replicas and followers. A
//! background task re-queries the cluster overview on an interval, swaps the
//! target address sets, prunes connections whose member left, and tops the
//! pools back up. Borrowed connections are indexed by their random id so a
//! reclaim with an unknown id fails fast instead of corrupting the pools.

use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cfg::{config::Config, enums::AccessMode},
    client::{
        conn::Connection,
        error::{BoltError, PoolError},
    },
    pool::{
        entry::PoolEntry,
        hooks::{BoltFactory, ConnectionLifecycle, RotatingTargets, Targets},
        simple::{Pool, PoolOptions},
        topology::{Topology, fetch_topology},
    },
};

/// The routing pool. Construct with [`RoutingPool::start`]; always
/// [`close`](RoutingPool::close) it so the refresh task stops.
#[derive(Debug)]
pub struct RoutingPool {
    config: Config,
    topology: RwLock<Topology>,

    write_targets: Arc<RotatingTargets>,
    read_targets: Arc<RotatingTargets>,

    write_pool: Pool<BoltFactory>,
    read_pool: Pool<BoltFactory>,

    /// Borrowed entries indexed by connection id.
    borrowed: DashMap<String, AccessMode>,

    cancel: CancellationToken,
}

impl RoutingPool {
    /// Performs the initial topology discovery, builds both pools, prefills
    /// them to their minimums and spawns the refresh task.
    pub async fn start(config: Config) -> Result<Arc<Self>, PoolError> {
        if config.pool.max_total < 2 {
            return Err(PoolError::Connection(BoltError::Configuration(
                "a routing pool needs max_total >= 2".to_string(),
            )));
        }

        let topology = Self::initial_topology(&config).await?;
        let write_addresses = topology.write_addresses();
        let read_addresses = topology.read_addresses();
        if write_addresses.is_empty() {
            return Err(PoolError::NoMembers("write"));
        }
        if read_addresses.is_empty() {
            return Err(PoolError::NoMembers("read"));
        }

        // Odd capacity gives the spare slot to writes.
        let write_total = config.pool.max_total.div_ceil(2);
        let read_total = config.pool.max_total - write_total;

        let write_targets = Arc::new(RotatingTargets::new(write_addresses));
        let read_targets = Arc::new(RotatingTargets::new(read_addresses));

        let write_pool = Pool::new(
            BoltFactory::new(
                config.clone(),
                Targets::Rotating(Arc::clone(&write_targets)),
                AccessMode::Write,
            ),
            PoolOptions::from_config(&config.pool, write_total),
        );
        let read_pool = Pool::new(
            BoltFactory::new(
                config.clone(),
                Targets::Rotating(Arc::clone(&read_targets)),
                AccessMode::Read,
            ),
            PoolOptions::from_config(&config.pool, read_total),
        );

        let pool = Arc::new(Self {
            config,
            topology: RwLock::new(topology),
            write_targets,
            read_targets,
            write_pool,
            read_pool,
            borrowed: DashMap::new(),
            cancel: CancellationToken::new(),
        });

        pool.write_pool.rebalance().await;
        pool.read_pool.rebalance().await;

        let refresher = Arc::clone(&pool);
        tokio::spawn(async move {
            refresher.refresh_loop().await;
        });

        Ok(pool)
    }

    /// Borrows a connection for the given access mode.
    pub async fn borrow(&self, mode: AccessMode) -> Result<PoolEntry, PoolError> {
        if self.cancel.is_cancelled() {
            return Err(PoolError::Closed);
        }

        let entry = self.pool_for(mode).borrow().await?;
        self.borrowed.insert(entry.id().to_string(), mode);
        Ok(entry)
    }

    /// Returns a borrowed connection. Fails fast when the entry was not
    /// borrowed here. Connections whose member left the cluster, and dead
    /// connections, are destroyed and their slot replenished.
    pub async fn reclaim(&self, mut entry: PoolEntry) -> Result<(), PoolError> {
        let Some((_, mode)) = self.borrowed.remove(entry.id()) else {
            let id = entry.id().to_string();
            self.pool_for(entry.access_mode)
                .factory()
                .destroy(entry.conn)
                .await;
            return Err(PoolError::UnknownConnection(id));
        };

        let still_member = {
            let topology = self.topology.read().await;
            match mode {
                AccessMode::Write => {
                    topology.write_addresses().contains(&entry.conn_string)
                },
                AccessMode::Read => {
                    topology.read_addresses().contains(&entry.conn_string)
                },
            }
        };
        if !still_member {
            debug!(
                id = entry.id(),
                target = %entry.conn_string,
                "reclaimed connection targets a departed member"
            );
            entry.marked_for_deletion = true;
        }

        let pool = self.pool_for(mode);
        pool.reclaim(entry).await?;
        pool.rebalance().await;
        Ok(())
    }

    /// Stops the refresh task and closes both pools. Idle connections die
    /// now; borrowed ones when they are reclaimed.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.write_pool.close().await;
        self.read_pool.close().await;
    }

    /// Live connection count across both halves.
    pub async fn live_count(&self) -> usize {
        self.write_pool.live_count().await + self.read_pool.live_count().await
    }

    pub async fn current_topology(&self) -> Topology {
        self.topology.read().await.clone()
    }

    fn pool_for(&self, mode: AccessMode) -> &Pool<BoltFactory> {
        match mode {
            AccessMode::Write => &self.write_pool,
            AccessMode::Read => &self.read_pool,
        }
    }

    /// Queries the overview over a fresh, short-lived connection to the
    /// configured endpoint.
    async fn initial_topology(config: &Config) -> Result<Topology, PoolError> {
        let mut conn = Connection::connect(config).await?;
        let result = fetch_topology(&mut conn).await;
        let _ = conn.close().await;
        Ok(result?)
    }

    async fn refresh_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.pool.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it, start() just refreshed.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("routing refresh task stopping");
                    return;
                },
                _ = ticker.tick() => {
                    self.refresh().await;
                },
            }
        }
    }

    /// One refresh tick: re-query topology via a known leader, swap the
    /// target sets, prune connections to departed members, and rebalance.
    /// On total failure the previous topology is retained.
    pub async fn refresh(&self) {
        let new_topology = match self.query_topology_via_leader().await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "topology refresh failed, keeping last known topology");
                return;
            },
        };

        let write_addresses = new_topology.write_addresses();
        let read_addresses = new_topology.read_addresses();
        info!(
            writers = write_addresses.len(),
            readers = read_addresses.len(),
            "cluster topology refreshed"
        );

        {
            let mut topology = self.topology.write().await;
            *topology = new_topology;
        }
        self.write_targets.replace(write_addresses.clone()).await;
        self.read_targets.replace(read_addresses.clone()).await;

        let live_writes: HashSet<String> = write_addresses.into_iter().collect();
        let live_reads: HashSet<String> = read_addresses.into_iter().collect();
        let pruned_writes = self.write_pool.prune_targets(&live_writes).await;
        let pruned_reads = self.read_pool.prune_targets(&live_reads).await;
        if pruned_writes + pruned_reads > 0 {
            debug!(
                writes = pruned_writes,
                reads = pruned_reads,
                "pruned connections to departed members"
            );
        }

        self.write_pool.rebalance().await;
        self.read_pool.rebalance().await;
    }

    /// Dials the first reachable leader for a throwaway overview query,
    /// falling back to the originally configured endpoint.
    async fn query_topology_via_leader(&self) -> Result<Topology, BoltError> {
        let mut candidates = self.write_targets.snapshot().await;
        candidates.push(self.config.endpoint.address());

        let mut last_error: Option<BoltError> = None;
        for address in candidates {
            let member_config = match self.config.with_address(&address) {
                Ok(c) => c,
                Err(e) => {
                    last_error = Some(BoltError::Configuration(e.to_string()));
                    continue;
                },
            };

            match Connection::connect(&member_config).await {
                Ok(mut conn) => {
                    let result = fetch_topology(&mut conn).await;
                    let _ = conn.close().await;
                    match result {
                        Ok(topology) if !topology.is_empty() => return Ok(topology),
                        Ok(_) => {
                            last_error = Some(BoltError::Protocol(
                                "cluster overview returned no members".to_string(),
                            ));
                        },
                        Err(e) => last_error = Some(e),
                    }
                },
                Err(e) => {
                    debug!(%address, error = %e, "leader unreachable during refresh");
                    last_error = Some(e);
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BoltError::Configuration("no topology candidates to query".to_string())
        }))
    }
}
