// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Failures raised while serializing values into PackStream bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("integer {0} does not fit into a 64-bit Bolt integer")]
    IntOverflow(u128),

    #[error("map keys must be strings")]
    MapKeyNotString,

    #[error("{kind} of {len} entries exceeds the PackStream size limit")]
    TooLong { kind: &'static str, len: usize },

    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

/// Failures raised while parsing PackStream bytes back into values.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized marker byte {0:#04x}")]
    UnknownMarker(u8),

    #[error("unrecognized structure signature {0:#04x}")]
    UnknownSignature(u8),

    #[error("message ended before the value was complete")]
    Truncated,

    #[error("map keys must be strings")]
    BadMapKey,

    #[error("structure {signature:#04x} carries {got} fields, expected {expected}")]
    BadArity {
        signature: u8,
        expected: usize,
        got: usize,
    },

    #[error("expected {expected} while decoding {context}")]
    UnexpectedType {
        expected: &'static str,
        context: &'static str,
    },

    #[error("string payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0} trailing bytes after the decoded value")]
    TrailingBytes(usize),
}
