// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-process Bolt servers for driving the client over real sockets.
//!
//! Two flavors: a [`ScriptedServer`] that plays one exact exchange and
//! asserts on what the client sends, and an [`AutoServer`] that answers
//! whatever arrives with plausible SUCCESS/RECORD traffic, for pool tests
//! that open many connections.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Context, Result, bail, ensure};
use bolt_client_rs::codec::{
    decode::decode_from_bytes,
    encode::{Encoder, frame_message},
    value::Value,
};
use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Mutex,
};

pub const PREAMBLE: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// One step of a scripted exchange.
#[derive(Debug, Clone)]
pub enum Step {
    /// Read one client message and assert its signature byte.
    Expect(u8),
    /// Write pre-framed bytes to the client.
    Send(Bytes),
}

pub fn expect(signature: u8) -> Step {
    Step::Expect(signature)
}

pub fn send(bytes: Bytes) -> Step {
    Step::Send(bytes)
}

/// Frames a server message: `signature` + fields.
fn message(signature: u8, fields: &[Value]) -> Bytes {
    let mut enc = Encoder::new();
    enc.encode_struct_header(fields.len(), signature)
        .expect("struct header");
    for field in fields {
        enc.encode_value(field).expect("encode field");
    }
    frame_message(&enc.into_payload(), u16::MAX).expect("frame")
}

pub fn success(entries: &[(&str, Value)]) -> Bytes {
    let map: std::collections::HashMap<String, Value> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    message(0x70, &[Value::Map(map)])
}

pub fn record(fields: Vec<Value>) -> Bytes {
    message(0x71, &[Value::List(fields)])
}

pub fn ignored() -> Bytes {
    message(0x7E, &[])
}

pub fn failure(code: &str, msg: &str) -> Bytes {
    let map: std::collections::HashMap<String, Value> = [
        ("code".to_string(), Value::from(code)),
        ("message".to_string(), Value::from(msg)),
    ]
    .into_iter()
    .collect();
    message(0x7F, &[Value::Map(map)])
}

/// Reads one chunked message and returns its reassembled payload.
async fn read_client_message(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    let mut payload = Vec::new();
    loop {
        let mut len_buf = [0u8; 2];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {},
            // EOF between messages means the client hung up.
            Err(_) if payload.is_empty() => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        if len == 0 {
            return Ok(Some(payload));
        }
        let start = payload.len();
        payload.resize(start + len, 0);
        stream.read_exact(&mut payload[start..]).await?;
    }
}

fn signature_of(payload: &[u8]) -> Result<u8> {
    ensure!(payload.len() >= 2, "short message payload");
    ensure!(
        payload[0] & 0xF0 == 0xB0,
        "client message does not start with a struct marker"
    );
    Ok(payload[1])
}

async fn serve_handshake(
    stream: &mut TcpStream,
    version_reply: [u8; 4],
) -> Result<()> {
    let mut handshake = [0u8; 20];
    stream.read_exact(&mut handshake).await?;
    ensure!(handshake[..4] == PREAMBLE, "bad preamble: {handshake:02X?}");
    stream.write_all(&version_reply).await?;
    Ok(())
}

/// Serves exactly one connection with a fixed exchange.
pub struct ScriptedServer {
    pub addr: SocketAddr,
    /// The raw 20 handshake bytes the client sent.
    pub handshake: Arc<Mutex<Option<[u8; 20]>>>,
}

impl ScriptedServer {
    pub async fn spawn(version_reply: [u8; 4], steps: Vec<Step>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handshake = Arc::new(Mutex::new(None));

        let seen = Arc::clone(&handshake);
        tokio::spawn(async move {
            if let Err(e) = Self::serve(listener, version_reply, steps, seen).await {
                eprintln!("scripted server error: {e:#}");
            }
        });

        Ok(Self { addr, handshake })
    }

    async fn serve(
        listener: TcpListener,
        version_reply: [u8; 4],
        steps: Vec<Step>,
        seen: Arc<Mutex<Option<[u8; 20]>>>,
    ) -> Result<()> {
        let (mut stream, _) = listener.accept().await?;

        let mut handshake = [0u8; 20];
        stream.read_exact(&mut handshake).await?;
        *seen.lock().await = Some(handshake);
        ensure!(handshake[..4] == PREAMBLE, "bad preamble");
        stream.write_all(&version_reply).await?;

        for step in steps {
            match step {
                Step::Expect(signature) => {
                    let payload = read_client_message(&mut stream)
                        .await?
                        .context("client closed mid-script")?;
                    let got = signature_of(&payload)?;
                    ensure!(
                        got == signature,
                        "expected message {signature:#04x}, got {got:#04x}"
                    );
                },
                Step::Send(bytes) => stream.write_all(&bytes).await?,
            }
        }
        Ok(())
    }

    pub fn uri(&self) -> String {
        format!("bolt://127.0.0.1:{}", self.addr.port())
    }
}

/// Answers any number of connections with canned-but-sensible replies.
pub struct AutoServer {
    pub addr: SocketAddr,
    overview: Arc<Mutex<Vec<Vec<Value>>>>,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl AutoServer {
    pub async fn spawn(version_reply: [u8; 4]) -> Result<Arc<Self>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let server = Arc::new(Self {
            addr,
            overview: Arc::new(Mutex::new(Vec::new())),
            current: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        });

        let accept = Arc::clone(&server);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let conn_server = Arc::clone(&accept);
                tokio::spawn(async move {
                    let _ = conn_server.serve_connection(stream, version_reply).await;
                });
            }
        });

        Ok(server)
    }

    /// `host:port` of this server, as it appears in pool bookkeeping.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.addr.port())
    }

    pub fn uri(&self) -> String {
        format!("bolt://127.0.0.1:{}", self.addr.port())
    }

    /// Sets the rows returned for a cluster overview query.
    pub async fn set_overview(&self, rows: Vec<Vec<Value>>) {
        *self.overview.lock().await = rows;
    }

    /// Highest number of simultaneously open connections so far.
    pub fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn open_connections(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    async fn serve_connection(
        &self,
        mut stream: TcpStream,
        version_reply: [u8; 4],
    ) -> Result<()> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.talk(&mut stream, version_reply).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn talk(
        &self,
        stream: &mut TcpStream,
        version_reply: [u8; 4],
    ) -> Result<()> {
        serve_handshake(stream, version_reply).await?;

        let mut pending: Vec<Vec<Value>> = Vec::new();
        loop {
            let Some(payload) = read_client_message(stream).await? else {
                return Ok(());
            };
            let signature = signature_of(&payload)?;

            match signature {
                // INIT / HELLO / BEGIN / COMMIT / ROLLBACK / RESET / ACK.
                0x01 | 0x11 | 0x12 | 0x13 | 0x0E | 0x0F => {
                    stream.write_all(&success(&[])).await?;
                },
                // RUN: stage rows for the following PULL.
                0x10 => {
                    let query = run_query_of(&payload)?;
                    pending = if query.contains("overview") {
                        self.overview.lock().await.clone()
                    } else if matches!(
                        query.as_str(),
                        "BEGIN" | "COMMIT" | "ROLLBACK"
                    ) {
                        Vec::new()
                    } else {
                        vec![vec![Value::Int(1)]]
                    };
                    stream
                        .write_all(&success(&[(
                            "fields",
                            Value::List(vec![Value::from("1")]),
                        )]))
                        .await?;
                },
                // PULL: stream staged rows then the summary.
                0x3F => {
                    for row in pending.drain(..) {
                        stream.write_all(&record(row)).await?;
                    }
                    stream
                        .write_all(&success(&[("type", Value::from("r"))]))
                        .await?;
                },
                // DISCARD: drop staged rows.
                0x2F => {
                    pending.clear();
                    stream.write_all(&success(&[])).await?;
                },
                // GOODBYE.
                0x02 => return Ok(()),
                other => bail!("auto server got unexpected message {other:#04x}"),
            }
        }
    }
}

/// Digs the query string out of a RUN message payload.
fn run_query_of(payload: &[u8]) -> Result<String> {
    let value = decode_from_bytes(payload)?;
    let Value::Struct(s) = value else {
        bail!("RUN payload is not a structure");
    };
    s.fields
        .first()
        .and_then(Value::as_str)
        .map(str::to_string)
        .context("RUN payload has no query string")
}

/// Overview row builder shared by the routing tests.
pub fn overview_row(id: &str, bolt_address: &str, role: &str) -> Vec<Value> {
    vec![
        Value::from(id),
        Value::List(vec![Value::from(format!("bolt://{bolt_address}"))]),
        Value::from(role),
        Value::List(vec![]),
        Value::from("default"),
    ]
}
