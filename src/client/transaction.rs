// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Explicit transactions.

use std::collections::HashMap;

use crate::{
    client::{conn::Connection, error::BoltError, result::ExecResult, rows::Rows},
    codec::value::Value,
};

/// An open transaction, ended by exactly one of [`commit`] or [`rollback`].
///
/// The transaction borrows its connection exclusively, so nothing else can
/// slip messages into the middle of it. Dropping it without committing
/// leaves the connection's transaction flag set; pool passivation rolls the
/// abandoned transaction back before the connection is reused.
///
/// [`commit`]: Transaction::commit
/// [`rollback`]: Transaction::rollback
#[derive(Debug)]
pub struct Transaction<'a> {
    conn: &'a mut Connection,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Runs a statement inside the transaction, discarding records.
    pub async fn exec(
        &mut self,
        query: &str,
        parameters: HashMap<String, Value>,
    ) -> Result<ExecResult, BoltError> {
        self.conn.exec(query, parameters).await
    }

    /// Runs a statement inside the transaction, streaming records.
    pub async fn query(
        &mut self,
        query: &str,
        parameters: HashMap<String, Value>,
    ) -> Result<Rows<'_>, BoltError> {
        self.conn.query(query, parameters).await
    }

    pub async fn commit(self) -> Result<(), BoltError> {
        self.conn.commit_tx().await
    }

    pub async fn rollback(self) -> Result<(), BoltError> {
        self.conn.rollback_tx().await
    }
}
