// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Bolt message catalog.
//!
//! Every protocol PDU is a PackStream structure with a one-byte signature.
//! Client-initiated messages live in [`Request`], server-initiated ones in
//! [`Response`]; both are closed sums so a dispatcher that forgets a case
//! fails to compile.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;

use crate::{
    cfg::enums::AccessMode,
    codec::{
        decode::decode_from_bytes,
        encode::Encoder,
        error::{DecodeError, EncodeError},
        value::Value,
    },
};

/// User agent reported during INIT / HELLO.
pub const CLIENT_ID: &str = concat!("RustBoltClient/", env!("CARGO_PKG_VERSION"));

pub const INIT_SIGNATURE: u8 = 0x01;
pub const HELLO_SIGNATURE: u8 = 0x01;
pub const GOODBYE_SIGNATURE: u8 = 0x02;
pub const ACK_FAILURE_SIGNATURE: u8 = 0x0E;
pub const RESET_SIGNATURE: u8 = 0x0F;
pub const RUN_SIGNATURE: u8 = 0x10;
pub const BEGIN_SIGNATURE: u8 = 0x11;
pub const COMMIT_SIGNATURE: u8 = 0x12;
pub const ROLLBACK_SIGNATURE: u8 = 0x13;
pub const DISCARD_SIGNATURE: u8 = 0x2F;
pub const PULL_SIGNATURE: u8 = 0x3F;
pub const SUCCESS_SIGNATURE: u8 = 0x70;
pub const RECORD_SIGNATURE: u8 = 0x71;
pub const IGNORED_SIGNATURE: u8 = 0x7E;
pub const FAILURE_SIGNATURE: u8 = 0x7F;

/// Sentinel query id meaning "the only open stream".
pub const ABSENT_QUERY_ID: i64 = -1;
/// Sentinel record count meaning "everything".
pub const STREAM_UNLIMITED: i64 = -1;

const SCHEME_KEY: &str = "scheme";
const PRINCIPAL_KEY: &str = "principal";
const CREDENTIALS_KEY: &str = "credentials";
const REALM_KEY: &str = "realm";
const USER_AGENT_KEY: &str = "user_agent";

const BOOKMARKS_KEY: &str = "bookmarks";
const DATABASE_KEY: &str = "db";
const TX_TIMEOUT_KEY: &str = "tx_timeout";
const TX_METADATA_KEY: &str = "tx_metadata";
const MODE_KEY: &str = "mode";
const MODE_READ_VALUE: &str = "r";

/// A client-initiated message.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// v1/v2 session initiation: user agent plus auth token.
    Init {
        client: String,
        auth: HashMap<String, Value>,
    },
    /// v3/v4 session initiation: one map carrying the auth token and
    /// `user_agent`.
    Hello { metadata: HashMap<String, Value> },
    /// v1/v2 statement execution.
    Run {
        query: String,
        parameters: HashMap<String, Value>,
    },
    /// v3/v4 statement execution with trailing metadata.
    RunWithMetadata {
        query: String,
        parameters: HashMap<String, Value>,
        metadata: HashMap<String, Value>,
    },
    /// Fetch every pending record (v1–v3).
    PullAll,
    /// Fetch `n` records from stream `qid` (v4).
    Pull { n: i64, qid: i64 },
    /// Drop every pending record (v1/v2).
    DiscardAll,
    /// Drop `n` records from stream `qid` (v3/v4).
    Discard { n: i64, qid: i64 },
    Begin { metadata: HashMap<String, Value> },
    Commit,
    Rollback,
    Reset,
    AckFailure,
    Goodbye,
}

impl Request {
    pub fn signature(&self) -> u8 {
        match self {
            Request::Init { .. } => INIT_SIGNATURE,
            Request::Hello { .. } => HELLO_SIGNATURE,
            Request::Run { .. } | Request::RunWithMetadata { .. } => RUN_SIGNATURE,
            Request::PullAll | Request::Pull { .. } => PULL_SIGNATURE,
            Request::DiscardAll | Request::Discard { .. } => DISCARD_SIGNATURE,
            Request::Begin { .. } => BEGIN_SIGNATURE,
            Request::Commit => COMMIT_SIGNATURE,
            Request::Rollback => ROLLBACK_SIGNATURE,
            Request::Reset => RESET_SIGNATURE,
            Request::AckFailure => ACK_FAILURE_SIGNATURE,
            Request::Goodbye => GOODBYE_SIGNATURE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Request::Init { .. } => "INIT",
            Request::Hello { .. } => "HELLO",
            Request::Run { .. } | Request::RunWithMetadata { .. } => "RUN",
            Request::PullAll => "PULL_ALL",
            Request::Pull { .. } => "PULL",
            Request::DiscardAll => "DISCARD_ALL",
            Request::Discard { .. } => "DISCARD",
            Request::Begin { .. } => "BEGIN",
            Request::Commit => "COMMIT",
            Request::Rollback => "ROLLBACK",
            Request::Reset => "RESET",
            Request::AckFailure => "ACK_FAILURE",
            Request::Goodbye => "GOODBYE",
        }
    }

    /// Every request except GOODBYE is answered by the server.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Request::Goodbye)
    }

    /// Ordered structure fields as they appear on the wire.
    pub fn fields(&self) -> Vec<Value> {
        match self {
            Request::Init { client, auth } => vec![
                Value::String(client.clone()),
                Value::Map(auth.clone()),
            ],
            Request::Hello { metadata } => vec![Value::Map(metadata.clone())],
            Request::Run { query, parameters } => vec![
                Value::String(query.clone()),
                Value::Map(parameters.clone()),
            ],
            Request::RunWithMetadata {
                query,
                parameters,
                metadata,
            } => vec![
                Value::String(query.clone()),
                Value::Map(parameters.clone()),
                Value::Map(metadata.clone()),
            ],
            Request::Pull { n, qid } | Request::Discard { n, qid } => {
                let mut extent = HashMap::with_capacity(2);
                extent.insert("n".to_string(), Value::Int(*n));
                extent.insert("qid".to_string(), Value::Int(*qid));
                vec![Value::Map(extent)]
            },
            Request::Begin { metadata } => vec![Value::Map(metadata.clone())],
            Request::PullAll
            | Request::DiscardAll
            | Request::Commit
            | Request::Rollback
            | Request::Reset
            | Request::AckFailure
            | Request::Goodbye => vec![],
        }
    }

    /// Serializes the message into an unframed PackStream payload.
    pub fn to_payload(&self) -> Result<Bytes, EncodeError> {
        let fields = self.fields();
        let mut enc = Encoder::new();
        enc.encode_struct_header(fields.len(), self.signature())?;
        for field in &fields {
            enc.encode_value(field)?;
        }
        Ok(enc.into_payload())
    }
}

/// A server-initiated message.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success { metadata: HashMap<String, Value> },
    Record { fields: Vec<Value> },
    Ignored,
    Failure { metadata: HashMap<String, Value> },
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::Success { .. } => "SUCCESS",
            Response::Record { .. } => "RECORD",
            Response::Ignored => "IGNORED",
            Response::Failure { .. } => "FAILURE",
        }
    }

    /// Parses one unframed payload into a server message.
    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        let value = decode_from_bytes(payload)?;
        let Value::Struct(s) = value else {
            return Err(DecodeError::UnexpectedType {
                expected: "message structure",
                context: "server response",
            });
        };

        match s.signature {
            SUCCESS_SIGNATURE => {
                let [meta] = take_message_fields(s.signature, s.fields)?;
                Ok(Response::Success {
                    metadata: expect_metadata(meta)?,
                })
            },
            RECORD_SIGNATURE => {
                let [fields] = take_message_fields(s.signature, s.fields)?;
                match fields {
                    Value::List(items) => Ok(Response::Record { fields: items }),
                    _ => Err(DecodeError::UnexpectedType {
                        expected: "list",
                        context: "record fields",
                    }),
                }
            },
            IGNORED_SIGNATURE => Ok(Response::Ignored),
            FAILURE_SIGNATURE => {
                let [meta] = take_message_fields(s.signature, s.fields)?;
                Ok(Response::Failure {
                    metadata: expect_metadata(meta)?,
                })
            },
            other => Err(DecodeError::UnknownSignature(other)),
        }
    }
}

fn take_message_fields<const N: usize>(
    signature: u8,
    fields: Vec<Value>,
) -> Result<[Value; N], DecodeError> {
    let got = fields.len();
    fields.try_into().map_err(|_| DecodeError::BadArity {
        signature,
        expected: N,
        got,
    })
}

fn expect_metadata(value: Value) -> Result<HashMap<String, Value>, DecodeError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(DecodeError::UnexpectedType {
            expected: "map",
            context: "message metadata",
        }),
    }
}

/// Reads a string entry out of a metadata map, defaulting to `"none"` when
/// the key is absent or not a string.
pub fn metadata_string(metadata: &HashMap<String, Value>, key: &str) -> String {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("none")
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth tokens

pub fn auth_token_basic(username: &str, password: &str) -> HashMap<String, Value> {
    auth_token_basic_with_realm(username, password, "")
}

pub fn auth_token_basic_with_realm(
    username: &str,
    password: &str,
    realm: &str,
) -> HashMap<String, Value> {
    let mut token = HashMap::with_capacity(4);
    token.insert(SCHEME_KEY.to_string(), Value::from("basic"));
    token.insert(PRINCIPAL_KEY.to_string(), Value::from(username));
    token.insert(CREDENTIALS_KEY.to_string(), Value::from(password));
    if !realm.is_empty() {
        token.insert(REALM_KEY.to_string(), Value::from(realm));
    }
    token
}

pub fn auth_token_kerberos(base64_ticket: &str) -> HashMap<String, Value> {
    let mut token = HashMap::with_capacity(3);
    token.insert(SCHEME_KEY.to_string(), Value::from("kerberos"));
    token.insert(PRINCIPAL_KEY.to_string(), Value::from(""));
    token.insert(CREDENTIALS_KEY.to_string(), Value::from(base64_ticket));
    token
}

pub fn auth_token_none() -> HashMap<String, Value> {
    let mut token = HashMap::with_capacity(1);
    token.insert(SCHEME_KEY.to_string(), Value::from("none"));
    token
}

/// Folds the user agent into an auth token, producing the HELLO metadata map.
pub fn hello_metadata(
    user_agent: &str,
    mut auth: HashMap<String, Value>,
) -> HashMap<String, Value> {
    auth.insert(USER_AGENT_KEY.to_string(), Value::from(user_agent));
    auth
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction metadata

/// Builds RUN / BEGIN metadata for v3+, emitting only the keys that are
/// actually present. Bookmarks are reserved but never populated.
pub fn tx_metadata(
    tx_timeout: Option<Duration>,
    tx_meta: Option<&HashMap<String, Value>>,
    database: &str,
    mode: AccessMode,
    bookmarks: Option<&[String]>,
) -> HashMap<String, Value> {
    let mut out = HashMap::new();

    if let Some(timeout) = tx_timeout
        && !timeout.is_zero()
    {
        out.insert(
            TX_TIMEOUT_KEY.to_string(),
            Value::Int(timeout.as_millis() as i64),
        );
    }

    if let Some(meta) = tx_meta
        && !meta.is_empty()
    {
        out.insert(TX_METADATA_KEY.to_string(), Value::Map(meta.clone()));
    }

    if mode == AccessMode::Read {
        out.insert(MODE_KEY.to_string(), Value::from(MODE_READ_VALUE));
    }

    if !database.is_empty() {
        out.insert(DATABASE_KEY.to_string(), Value::from(database));
    }

    if let Some(marks) = bookmarks
        && !marks.is_empty()
    {
        let items = marks.iter().map(|m| Value::from(m.as_str())).collect();
        out.insert(BOOKMARKS_KEY.to_string(), Value::List(items));
    }

    out
}
