// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A bounded LIFO connection pool.
//!
//! Idle connections live on a stack so the most recently used one is handed
//! out first, keeping the working set warm and letting the tail go stale and
//! be evicted. Every hand-off runs through the [`ConnectionLifecycle`]
//! hooks: validate on borrow, passivate and validate on return, destroy on
//! anything suspect. The pool never holds more than `max_total` live
//! connections, counting borrowed ones.

use std::{collections::HashSet, time::Duration};

use tokio::{
    sync::{Mutex, Notify},
    time::{Instant, timeout_at},
};
use tracing::{debug, warn};

use crate::{
    cfg::config::PoolConfig,
    client::error::PoolError,
    pool::{entry::PoolEntry, hooks::ConnectionLifecycle},
};

/// Sizing knobs for one pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_total: usize,
    pub max_idle: usize,
    pub min_idle: usize,
    pub borrow_timeout: Option<Duration>,
}

impl PoolOptions {
    /// Derives the options for a pool holding `max_total` connections,
    /// inheriting the rest from the config.
    pub fn from_config(cfg: &PoolConfig, max_total: usize) -> Self {
        Self {
            max_total,
            max_idle: cfg.max_idle.min(max_total),
            min_idle: cfg.min_idle.min(max_total),
            borrow_timeout: cfg.borrow_timeout,
        }
    }
}

#[derive(Debug)]
struct PoolState {
    /// LIFO stack of idle entries; the top is the most recently returned.
    idle: Vec<PoolEntry>,
    /// Live connections, borrowed plus idle. Never exceeds `max_total`.
    total: usize,
    closed: bool,
}

/// A fixed-capacity pool of Bolt connections.
#[derive(Debug)]
pub struct Pool<F: ConnectionLifecycle> {
    factory: F,
    opts: PoolOptions,
    state: Mutex<PoolState>,
    /// Signalled whenever capacity or an idle entry becomes available.
    available: Notify,
}

enum BorrowPlan {
    Got(Box<PoolEntry>),
    Create,
    Wait,
}

impl<F: ConnectionLifecycle> Pool<F> {
    pub fn new(factory: F, opts: PoolOptions) -> Self {
        Self {
            factory,
            opts,
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(opts.max_total),
                total: 0,
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn options(&self) -> &PoolOptions {
        &self.opts
    }

    /// Takes a connection, preferring the most recently returned idle one.
    /// Invalid or marked entries found on the way are destroyed and
    /// replaced. Blocks while the pool is exhausted, up to the configured
    /// borrow timeout.
    pub async fn borrow(&self) -> Result<PoolEntry, PoolError> {
        let deadline = self.opts.borrow_timeout.map(|t| Instant::now() + t);

        loop {
            let mut graveyard = Vec::new();
            let plan = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(PoolError::Closed);
                }

                loop {
                    match state.idle.pop() {
                        Some(entry)
                            if !entry.marked_for_deletion
                                && self.factory.validate(&entry.conn) =>
                        {
                            break BorrowPlan::Got(Box::new(entry));
                        },
                        Some(dead) => {
                            state.total -= 1;
                            graveyard.push(dead);
                        },
                        None => {
                            if state.total < self.opts.max_total {
                                state.total += 1;
                                break BorrowPlan::Create;
                            }
                            break BorrowPlan::Wait;
                        },
                    }
                }
            };

            for dead in graveyard {
                debug!(id = dead.id(), "destroying invalid idle connection");
                self.factory.destroy(dead.conn).await;
            }

            match plan {
                BorrowPlan::Got(mut entry) => {
                    if let Err(e) = self.factory.activate(&mut entry.conn).await {
                        warn!(error = %e, "activation failed, destroying connection");
                        self.forget_one().await;
                        self.factory.destroy(entry.conn).await;
                        continue;
                    }
                    entry.borrow_count += 1;
                    return Ok(*entry);
                },
                BorrowPlan::Create => match self.factory.create().await {
                    Ok((conn, conn_string)) => {
                        let mode = conn.access_mode();
                        let mut entry = PoolEntry::new(conn, conn_string, mode);
                        entry.borrow_count = 1;
                        return Ok(entry);
                    },
                    Err(e) => {
                        self.forget_one().await;
                        return Err(PoolError::Connection(e));
                    },
                },
                BorrowPlan::Wait => match deadline {
                    Some(at) => {
                        if timeout_at(at, self.available.notified()).await.is_err() {
                            return Err(PoolError::Timeout);
                        }
                    },
                    None => self.available.notified().await,
                },
            }
        }
    }

    /// Returns a borrowed connection. It is passivated back to Ready and
    /// pushed on the stack, or destroyed when it is marked, fails
    /// validation, or the idle stack is full.
    pub async fn reclaim(&self, mut entry: PoolEntry) -> Result<(), PoolError> {
        let passivated = self.factory.passivate(&mut entry.conn).await;
        if let Err(e) = &passivated {
            warn!(id = entry.id(), error = %e, "passivation failed");
        }

        let healthy = passivated.is_ok()
            && !entry.marked_for_deletion
            && self.factory.validate(&entry.conn);

        let doomed = {
            let mut state = self.state.lock().await;
            if healthy && !state.closed && state.idle.len() < self.opts.max_idle {
                state.idle.push(entry);
                None
            } else {
                state.total -= 1;
                Some(entry)
            }
        };

        if let Some(entry) = doomed {
            debug!(id = entry.id(), "destroying connection on return");
            self.factory.destroy(entry.conn).await;
        }
        self.available.notify_one();
        Ok(())
    }

    /// Hard-drops a borrowed connection without passivation, freeing its
    /// capacity slot.
    pub async fn discard(&self, entry: PoolEntry) {
        {
            let mut state = self.state.lock().await;
            state.total -= 1;
        }
        self.factory.destroy(entry.conn).await;
        self.available.notify_one();
    }

    /// Destroys idle entries whose target address is no longer in `live`.
    /// Returns how many were pruned.
    pub async fn prune_targets(&self, live: &HashSet<String>) -> usize {
        let doomed = {
            let mut state = self.state.lock().await;
            let mut doomed = Vec::new();
            let mut kept = Vec::with_capacity(state.idle.len());
            for entry in state.idle.drain(..) {
                if live.contains(&entry.conn_string) {
                    kept.push(entry);
                } else {
                    doomed.push(entry);
                }
            }
            state.idle = kept;
            state.total -= doomed.len();
            doomed
        };

        let pruned = doomed.len();
        for entry in doomed {
            debug!(
                id = entry.id(),
                target = %entry.conn_string,
                "pruning connection to departed member"
            );
            self.factory.destroy(entry.conn).await;
        }
        if pruned > 0 {
            self.available.notify_waiters();
        }
        pruned
    }

    /// Tops idle connections up to `min_idle` and trims beyond `max_idle`.
    pub async fn rebalance(&self) {
        // Trim first so the top-up never overshoots.
        let excess = {
            let mut state = self.state.lock().await;
            let mut excess = Vec::new();
            while state.idle.len() > self.opts.max_idle {
                // The bottom of the stack is the coldest connection.
                let entry = state.idle.remove(0);
                state.total -= 1;
                excess.push(entry);
            }
            excess
        };
        for entry in excess {
            self.factory.destroy(entry.conn).await;
        }

        loop {
            {
                let mut state = self.state.lock().await;
                if state.closed
                    || state.idle.len() >= self.opts.min_idle
                    || state.total >= self.opts.max_total
                {
                    break;
                }
                state.total += 1;
            }

            match self.factory.create().await {
                Ok((conn, conn_string)) => {
                    let mode = conn.access_mode();
                    let entry = PoolEntry::new(conn, conn_string, mode);
                    let mut state = self.state.lock().await;
                    state.idle.push(entry);
                    drop(state);
                    self.available.notify_one();
                },
                Err(e) => {
                    warn!(error = %e, "could not replenish pool");
                    self.forget_one().await;
                    break;
                },
            }
        }
    }

    /// Closes the pool: idle connections are destroyed now, borrowed ones
    /// when they come back. Waiting borrowers fail with `Closed`.
    pub async fn close(&self) {
        let idle = {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.total -= state.idle.len();
            state.idle.drain(..).collect::<Vec<_>>()
        };
        for entry in idle {
            self.factory.destroy(entry.conn).await;
        }
        self.available.notify_waiters();
    }

    pub async fn idle_count(&self) -> usize {
        self.state.lock().await.idle.len()
    }

    /// Live connections, borrowed plus idle.
    pub async fn live_count(&self) -> usize {
        self.state.lock().await.total
    }

    async fn forget_one(&self) {
        let mut state = self.state.lock().await;
        state.total -= 1;
        drop(state);
        self.available.notify_one();
    }
}
