// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Streaming query results.

use std::collections::HashMap;

use crate::{
    client::{
        conn::{Connection, StreamState},
        error::BoltError,
    },
    codec::value::Value,
    proto::messages::Response,
};

/// The record stream of one query.
///
/// Single-consumer: the stream borrows its connection exclusively, yields
/// one row per RECORD off the already-pipelined PULL and terminates on the
/// summary SUCCESS, whose metadata stays available afterwards. An
/// unfinished stream must be [`close`]d (or fully drained) before the
/// connection runs anything else; a dropped unfinished stream leaves the
/// connection dirty for pool passivation to mop up.
///
/// [`close`]: Rows::close
#[derive(Debug)]
pub struct Rows<'a> {
    conn: &'a mut Connection,
    run_metadata: HashMap<String, Value>,
    summary: Option<HashMap<String, Value>>,
    finished: bool,
}

impl<'a> Rows<'a> {
    pub(crate) fn new(
        conn: &'a mut Connection,
        run_metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            conn,
            run_metadata,
            summary: None,
            finished: false,
        }
    }

    /// Column names from the RUN summary.
    pub fn columns(&self) -> Vec<String> {
        let Some(fields) = self.run_metadata.get("fields").and_then(Value::as_list)
        else {
            return Vec::new();
        };
        fields
            .iter()
            .filter_map(|f| f.as_str().map(str::to_string))
            .collect()
    }

    /// Metadata of the RUN summary.
    pub fn run_metadata(&self) -> &HashMap<String, Value> {
        &self.run_metadata
    }

    /// Metadata of the terminating SUCCESS; `None` until the stream ends.
    pub fn summary(&self) -> Option<&HashMap<String, Value>> {
        self.summary.as_ref()
    }

    /// Server-side time until the result was available, from the RUN
    /// summary, under whichever key the negotiated version uses.
    pub fn available_after(&self) -> Option<i64> {
        self.run_metadata
            .get(self.conn.protocol().result_available_after_key())
            .and_then(Value::as_int)
    }

    /// Server-side time until the result was consumed, from the final
    /// summary.
    pub fn consumed_after(&self) -> Option<i64> {
        self.summary
            .as_ref()?
            .get(self.conn.protocol().result_consumed_after_key())
            .and_then(Value::as_int)
    }

    /// Fetches the next row. Returns `None` once the summary SUCCESS has
    /// been consumed.
    pub async fn next(&mut self) -> Result<Option<Vec<Value>>, BoltError> {
        if self.finished {
            return Ok(None);
        }

        match self.conn.consume().await {
            Ok(Response::Record { fields }) => Ok(Some(fields)),
            Ok(Response::Success { metadata }) => {
                self.finished = true;
                self.summary = Some(metadata);
                self.conn.stream_state = StreamState::None;
                Ok(None)
            },
            Ok(other) => Err(BoltError::Protocol(format!(
                "unexpected {} in a record stream",
                other.name()
            ))),
            Err(e) => {
                // Either recovered (stream gone) or fatal; both end the rows.
                self.finished = true;
                Err(e)
            },
        }
    }

    /// Drains every remaining row and hands back rows plus the summary.
    pub async fn all(
        mut self,
    ) -> Result<(Vec<Vec<Value>>, HashMap<String, Value>), BoltError> {
        let mut out = Vec::new();
        while let Some(row) = self.next().await? {
            out.push(row);
        }
        let summary = self.summary.take().unwrap_or_default();
        Ok((out, summary))
    }

    /// Gives up on the stream, draining the records still in flight so the
    /// connection is Ready for its next statement.
    pub async fn close(mut self) -> Result<(), BoltError> {
        if self.finished {
            return Ok(());
        }

        if self.conn.stream_state == StreamState::Streaming {
            while self.next().await?.is_some() {}
        }
        self.finished = true;
        Ok(())
    }
}
