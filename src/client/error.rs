// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::codec::error::{DecodeError, EncodeError};

/// Everything that can go wrong on a single connection.
///
/// The kinds matter to the pools: transport, codec and protocol errors are
/// fatal and the connection is destroyed on return; a lone server failure is
/// acknowledged on the wire and handed back with the connection still
/// usable; usage errors never touch connection state.
#[derive(Debug, Error)]
pub enum BoltError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A FAILURE message, surfaced verbatim after it was acknowledged.
    #[error("server failure [{code}]: {message}")]
    ServerFailure { code: String, message: String },

    #[error("usage error: {0}")]
    Usage(String),
}

impl BoltError {
    /// True when the connection that produced this error must be destroyed.
    pub fn is_fatal(&self) -> bool {
        match self {
            BoltError::Io(_)
            | BoltError::Timeout(_)
            | BoltError::Tls(_)
            | BoltError::Protocol(_)
            | BoltError::Encode(_)
            | BoltError::Decode(_) => true,
            BoltError::Configuration(_)
            | BoltError::ServerFailure { .. }
            | BoltError::Usage(_) => false,
        }
    }
}

/// Failures surfaced by the simple and routing pools.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,

    #[error("timed out waiting for a pooled connection")]
    Timeout,

    #[error("no connection borrowed with id {0:?}")]
    UnknownConnection(String),

    #[error("no cluster members available for {0} connections")]
    NoMembers(&'static str),

    #[error(transparent)]
    Connection(#[from] BoltError),
}
