// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{codec::value::Value, proto::dispatch::BoltProtocol};

/// Summary of a statement whose records were discarded.
#[derive(Debug, Clone)]
pub struct ExecResult {
    run_metadata: HashMap<String, Value>,
    summary: HashMap<String, Value>,
    available_key: &'static str,
    consumed_key: &'static str,
}

impl ExecResult {
    pub(crate) fn new(
        run_metadata: HashMap<String, Value>,
        summary: HashMap<String, Value>,
        protocol: &BoltProtocol,
    ) -> Self {
        Self {
            run_metadata,
            summary,
            available_key: protocol.result_available_after_key(),
            consumed_key: protocol.result_consumed_after_key(),
        }
    }

    /// Metadata of the RUN summary (fields, planning info).
    pub fn run_metadata(&self) -> &HashMap<String, Value> {
        &self.run_metadata
    }

    /// Metadata of the final summary (statement type, update counters).
    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.summary
    }

    pub fn available_after(&self) -> Option<i64> {
        self.run_metadata
            .get(self.available_key)
            .and_then(Value::as_int)
    }

    pub fn consumed_after(&self) -> Option<i64> {
        self.summary.get(self.consumed_key).and_then(Value::as_int)
    }
}
