// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-version protocol behavior.
//!
//! Bolt versions differ in message shapes and metadata keys, not in framing
//! or serialization. Rather than one type per version, the differences live
//! as data: a [`BoltProtocol`] is picked at handshake time and every
//! capability is a `match` on the version, so adding a version means the
//! compiler walks you through every decision point.

use std::collections::HashMap;

use crate::{
    cfg::enums::AccessMode,
    codec::value::Value,
    proto::{
        messages::{
            self, ABSENT_QUERY_ID, Request, STREAM_UNLIMITED,
        },
        version::BoltVersion,
    },
};

/// The version-dependent behavior table for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoltProtocol {
    version: BoltVersion,
}

impl BoltProtocol {
    pub fn new(version: BoltVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> BoltVersion {
        self.version
    }

    /// Session initiation: INIT with a separate user-agent field on v1/v2,
    /// HELLO with the agent folded into the metadata map on v3+.
    pub fn init_message(
        &self,
        user_agent: &str,
        auth: HashMap<String, Value>,
    ) -> Request {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => Request::Init {
                client: user_agent.to_string(),
                auth,
            },
            BoltVersion::V3 | BoltVersion::V4 => Request::Hello {
                metadata: messages::hello_metadata(user_agent, auth),
            },
        }
    }

    /// Statement execution. `autocommit` picks between a self-contained
    /// statement (carrying routing/database metadata on v3+) and one running
    /// inside an explicit transaction (bare metadata).
    pub fn run_message(
        &self,
        query: &str,
        parameters: HashMap<String, Value>,
        database: &str,
        mode: AccessMode,
        autocommit: bool,
    ) -> Request {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => Request::Run {
                query: query.to_string(),
                parameters,
            },
            BoltVersion::V3 | BoltVersion::V4 => {
                let metadata = if autocommit {
                    messages::tx_metadata(None, None, database, mode, None)
                } else {
                    HashMap::new()
                };
                Request::RunWithMetadata {
                    query: query.to_string(),
                    parameters,
                    metadata,
                }
            },
        }
    }

    pub fn pull_message(&self) -> Request {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 | BoltVersion::V3 => Request::PullAll,
            BoltVersion::V4 => Request::Pull {
                n: STREAM_UNLIMITED,
                qid: ABSENT_QUERY_ID,
            },
        }
    }

    pub fn discard_message(&self) -> Request {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => Request::DiscardAll,
            BoltVersion::V3 | BoltVersion::V4 => Request::Discard {
                n: STREAM_UNLIMITED,
                qid: ABSENT_QUERY_ID,
            },
        }
    }

    /// True when transactions are driven by `RUN "BEGIN"` statements instead
    /// of dedicated messages; each such statement is followed by PULL_ALL and
    /// answered by two SUCCESSes.
    pub fn uses_legacy_tx(&self) -> bool {
        matches!(self.version, BoltVersion::V1 | BoltVersion::V2)
    }

    pub fn begin_message(&self, database: &str, mode: AccessMode) -> Request {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => Request::Run {
                query: "BEGIN".to_string(),
                parameters: HashMap::new(),
            },
            BoltVersion::V3 | BoltVersion::V4 => Request::Begin {
                metadata: messages::tx_metadata(None, None, database, mode, None),
            },
        }
    }

    pub fn commit_message(&self) -> Request {
        if self.uses_legacy_tx() {
            Request::Run {
                query: "COMMIT".to_string(),
                parameters: HashMap::new(),
            }
        } else {
            Request::Commit
        }
    }

    pub fn rollback_message(&self) -> Request {
        if self.uses_legacy_tx() {
            Request::Run {
                query: "ROLLBACK".to_string(),
                parameters: HashMap::new(),
            }
        } else {
            Request::Rollback
        }
    }

    /// The polite close hint, where the version has one.
    pub fn goodbye_message(&self) -> Option<Request> {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => None,
            BoltVersion::V3 | BoltVersion::V4 => Some(Request::Goodbye),
        }
    }

    /// The message that clears a server-side failure state.
    pub fn recovery_message(&self) -> Request {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => Request::AckFailure,
            BoltVersion::V3 | BoltVersion::V4 => Request::Reset,
        }
    }

    /// Whether RUN / BEGIN metadata may carry a `db` selector.
    pub fn supports_multi_database(&self) -> bool {
        self.version == BoltVersion::V4
    }

    /// Metadata key for server-side planning latency in the RUN summary.
    pub fn result_available_after_key(&self) -> &'static str {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => "result_available_after",
            BoltVersion::V3 | BoltVersion::V4 => "t_first",
        }
    }

    /// Metadata key for stream consumption latency in the PULL summary.
    pub fn result_consumed_after_key(&self) -> &'static str {
        match self.version {
            BoltVersion::V1 | BoltVersion::V2 => "result_consumed_after",
            BoltVersion::V3 | BoltVersion::V4 => "t_last",
        }
    }
}
