// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{cfg::enums::AccessMode, client::conn::Connection};

/// One pooled connection plus the bookkeeping the pools need around it.
#[derive(Debug)]
pub struct PoolEntry {
    pub conn: Connection,
    /// `host:port` the connection was dialed at; the routing refresh diffs
    /// this against the live topology.
    pub conn_string: String,
    pub access_mode: AccessMode,
    pub borrow_count: u64,
    /// Set when the target member left the cluster; marked entries are
    /// destroyed instead of being handed out or kept.
    pub marked_for_deletion: bool,
}

impl PoolEntry {
    pub fn new(conn: Connection, conn_string: String, access_mode: AccessMode) -> Self {
        Self {
            conn,
            conn_string,
            access_mode,
            borrow_count: 0,
            marked_for_deletion: false,
        }
    }

    /// The connection's random id, the pools' borrow-registry key.
    pub fn id(&self) -> &str {
        self.conn.id()
    }
}
