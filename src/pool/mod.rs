// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod entry;
pub mod hooks;
pub mod routing;
pub mod simple;
pub mod topology;

use std::sync::Arc;

use crate::{
    cfg::config::Config,
    client::error::PoolError,
    pool::{
        hooks::{BoltFactory, Targets},
        simple::{Pool, PoolOptions},
    },
};

/// A single-endpoint pool, the non-routing counterpart of
/// [`routing::RoutingPool`].
pub type BoltPool = Pool<BoltFactory>;

impl Pool<BoltFactory> {
    /// Builds a pool dialing the configured endpoint directly.
    pub fn direct(config: Config) -> Result<Arc<Self>, PoolError> {
        let address = config.endpoint.address();
        let opts = PoolOptions::from_config(&config.pool, config.pool.max_total);
        let factory = BoltFactory::new(
            config,
            Targets::Fixed(address),
            crate::cfg::enums::AccessMode::Write,
        );
        Ok(Arc::new(Pool::new(factory, opts)))
    }
}
