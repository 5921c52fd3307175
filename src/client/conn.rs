// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single Bolt connection over TCP or TLS.
//!
//! One connection is one strictly sequential request/response channel: the
//! borrower owns it exclusively, requests go out in issue order, and every
//! response is consumed in the same order. The lifecycle runs
//! `Dialing → Handshaking → Authenticating → Ready`, then bounces between
//! `Ready`, `Streaming` and `InTx` until an I/O error, a failed recovery or
//! an explicit close ends it.

use std::{
    collections::HashMap,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt, ReadBuf},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;
use tracing::{debug, warn};

use crate::{
    cfg::{config::Config, enums::AccessMode},
    client::{
        common::io_with_timeout,
        error::BoltError,
        result::ExecResult,
        rows::Rows,
        tls,
        transaction::Transaction,
    },
    codec::{
        decode::read_message,
        encode::frame_message,
        value::Value,
    },
    proto::{
        dispatch::BoltProtocol,
        messages::{Request, Response, metadata_string},
        version::{NO_VERSION, handshake_bytes, selected_version},
    },
    utils::connection_id,
};

/// The byte stream under a connection, TLS-wrapped or plain.
#[derive(Debug)]
pub enum BoltStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for BoltStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BoltStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            BoltStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for BoltStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            BoltStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            BoltStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BoltStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            BoltStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BoltStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            BoltStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Where an in-flight result stream stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamState {
    /// No query open.
    None,
    /// RUN and PULL are both outstanding; records must be drained to the
    /// summary before the connection accepts other work.
    Streaming,
}

/// Represents a single Bolt connection over a TCP (optionally TLS) stream.
///
/// Owns the socket, the negotiated protocol table, and the three flags the
/// state machine needs: the open-stream state, the open-transaction flag and
/// the closed flag. All operations take `&mut self`, so exclusive ownership
/// for the life of a borrow is enforced by the borrow checker rather than a
/// lock.
#[derive(Debug)]
pub struct Connection {
    stream: BoltStream,
    protocol: BoltProtocol,

    timeout: Duration,
    chunk_size: u16,

    access_mode: AccessMode,
    id: String,

    pub(crate) stream_state: StreamState,
    pub(crate) in_tx: bool,
    closed: bool,
}

impl Connection {
    /// Dials the configured endpoint, handshakes and authenticates.
    pub async fn connect(config: &Config) -> Result<Self, BoltError> {
        let address = config.endpoint.address();
        let timeout = config.connection.timeout;

        let tcp = io_with_timeout(
            "dial",
            async { TcpStream::connect(&address).await },
            timeout,
        )
        .await?;
        tcp.set_nodelay(true)?;

        let stream = if config.tls.enabled {
            let connector = tls::connector(&config.tls)?;
            let name = tls::server_name(&config.endpoint.host)?;
            let tls_stream =
                io_with_timeout("tls handshake", connector.connect(name, tcp), timeout)
                    .await?;
            BoltStream::Tls(Box::new(tls_stream))
        } else {
            BoltStream::Tcp(tcp)
        };

        let mut conn = Self {
            stream,
            protocol: BoltProtocol::new(crate::proto::version::BoltVersion::V1),
            timeout,
            chunk_size: config.connection.chunk_size,
            access_mode: AccessMode::Write,
            id: connection_id(AccessMode::Write),
            stream_state: StreamState::None,
            in_tx: false,
            closed: false,
        };

        conn.handshake(config).await?;
        conn.authenticate(config).await?;

        Ok(conn)
    }

    /// Writes the 20-byte preamble + candidates and reads the server's pick.
    async fn handshake(&mut self, config: &Config) -> Result<(), BoltError> {
        let request = handshake_bytes(&config.connection.version);
        io_with_timeout(
            "handshake write",
            self.stream.write_all(&request),
            self.timeout,
        )
        .await?;

        let mut reply = [0u8; 4];
        io_with_timeout(
            "handshake read",
            self.stream.read_exact(&mut reply),
            self.timeout,
        )
        .await?;

        if reply == NO_VERSION {
            self.closed = true;
            return Err(BoltError::Protocol(
                "server responded with no supported version".to_string(),
            ));
        }

        let version = selected_version(&reply).ok_or_else(|| {
            self.closed = true;
            BoltError::Protocol(format!("server picked unknown version {reply:?}"))
        })?;

        debug!(version = %version, "handshake complete");
        self.protocol = BoltProtocol::new(version);
        Ok(())
    }

    /// Sends INIT / HELLO and expects SUCCESS. A FAILURE here is fatal: the
    /// session never reached Ready, so there is nothing to recover.
    async fn authenticate(&mut self, config: &Config) -> Result<(), BoltError> {
        let init = self
            .protocol
            .init_message(&config.connection.user_agent, config.auth.to_token());
        self.send(&init).await?;

        match self.recv().await? {
            Response::Success { metadata } => {
                debug!(?metadata, "bolt session initiated");
                Ok(())
            },
            Response::Failure { metadata } => {
                let err = failure_to_error(&metadata);
                let _ = self.shutdown_stream().await;
                self.closed = true;
                Err(err)
            },
            other => {
                let _ = self.shutdown_stream().await;
                self.closed = true;
                Err(BoltError::Protocol(format!(
                    "unexpected {} while authenticating",
                    other.name()
                )))
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: String) {
        self.id = id;
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    pub fn set_access_mode(&mut self, mode: AccessMode) {
        self.access_mode = mode;
    }

    pub fn protocol(&self) -> &BoltProtocol {
        &self.protocol
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Pool hook: a connection is reusable when it is open and carries no
    /// dangling stream or transaction.
    pub fn validate(&self) -> bool {
        !self.closed && self.stream_state == StreamState::None && !self.in_tx
    }

    /// Runs a statement and discards its records, returning only the
    /// summary. RUN and PULL are pipelined back to back.
    pub async fn exec(
        &mut self,
        query: &str,
        parameters: HashMap<String, Value>,
    ) -> Result<ExecResult, BoltError> {
        self.exec_with_db(query, parameters, "").await
    }

    pub async fn exec_with_db(
        &mut self,
        query: &str,
        parameters: HashMap<String, Value>,
        database: &str,
    ) -> Result<ExecResult, BoltError> {
        self.ensure_ready(database)?;

        let run = self.protocol.run_message(
            query,
            parameters,
            database,
            self.access_mode,
            !self.in_tx,
        );
        let pull = self.protocol.pull_message();
        self.send(&run).await?;
        self.send(&pull).await?;
        self.stream_state = StreamState::Streaming;

        let run_metadata = match self.consume_success().await {
            Ok(meta) => meta,
            Err(e) => {
                // Recovery already swallowed the IGNORED answering the PULL.
                self.stream_state = StreamState::None;
                return Err(e);
            },
        };

        // Flush records until the pull summary arrives.
        let summary = loop {
            match self.consume().await {
                Ok(Response::Success { metadata }) => break metadata,
                Ok(Response::Record { .. }) => continue,
                Ok(other) => {
                    self.fail_fatally();
                    return Err(BoltError::Protocol(format!(
                        "unexpected {} while draining an exec stream",
                        other.name()
                    )));
                },
                Err(e) => {
                    self.stream_state = StreamState::None;
                    return Err(e);
                },
            }
        };
        self.stream_state = StreamState::None;

        Ok(ExecResult::new(run_metadata, summary, &self.protocol))
    }

    /// Runs a statement and returns its record stream. RUN and PULL are
    /// pipelined back to back; the RUN summary is consumed before this
    /// returns, so column names are available immediately, and the stream
    /// yields the records the outstanding PULL produces.
    pub async fn query(
        &mut self,
        query: &str,
        parameters: HashMap<String, Value>,
    ) -> Result<Rows<'_>, BoltError> {
        self.query_with_db(query, parameters, "").await
    }

    pub async fn query_with_db(
        &mut self,
        query: &str,
        parameters: HashMap<String, Value>,
        database: &str,
    ) -> Result<Rows<'_>, BoltError> {
        self.ensure_ready(database)?;

        let run = self.protocol.run_message(
            query,
            parameters,
            database,
            self.access_mode,
            !self.in_tx,
        );
        let pull = self.protocol.pull_message();
        self.send(&run).await?;
        self.send(&pull).await?;
        self.stream_state = StreamState::Streaming;

        let run_metadata = match self.consume_success().await {
            Ok(meta) => meta,
            Err(e) => {
                // Recovery already swallowed the IGNORED answering the PULL.
                self.stream_state = StreamState::None;
                return Err(e);
            },
        };

        Ok(Rows::new(self, run_metadata))
    }

    /// Opens an explicit transaction.
    pub async fn begin(&mut self) -> Result<Transaction<'_>, BoltError> {
        self.begin_with_db("").await
    }

    pub async fn begin_with_db(
        &mut self,
        database: &str,
    ) -> Result<Transaction<'_>, BoltError> {
        self.ensure_ready(database)?;
        if self.in_tx {
            return Err(BoltError::Usage("transaction already open".to_string()));
        }

        let begin = self.protocol.begin_message(database, self.access_mode);
        self.run_tx_boundary(begin).await?;
        self.in_tx = true;

        Ok(Transaction::new(self))
    }

    pub(crate) async fn commit_tx(&mut self) -> Result<(), BoltError> {
        if !self.in_tx {
            return Err(BoltError::Usage("no open transaction".to_string()));
        }
        let msg = self.protocol.commit_message();
        self.run_tx_boundary(msg).await?;
        self.in_tx = false;
        Ok(())
    }

    pub(crate) async fn rollback_tx(&mut self) -> Result<(), BoltError> {
        if !self.in_tx {
            return Err(BoltError::Usage("no open transaction".to_string()));
        }
        let msg = self.protocol.rollback_message();
        self.run_tx_boundary(msg).await?;
        self.in_tx = false;
        Ok(())
    }

    /// Sends a BEGIN/COMMIT/ROLLBACK boundary. Legacy versions express these
    /// as RUN statements, which must be chased with PULL_ALL and answered by
    /// two SUCCESSes.
    async fn run_tx_boundary(&mut self, msg: Request) -> Result<(), BoltError> {
        self.send(&msg).await?;
        if self.protocol.uses_legacy_tx() {
            let pull = self.protocol.pull_message();
            self.send(&pull).await?;
            self.consume_success().await?;
            self.consume_success().await?;
        } else {
            self.consume_success().await?;
        }
        Ok(())
    }

    /// Pool-internal recovery primitive. RESET exists in every version and
    /// clears any server-side failure state, aborting open work; it is also
    /// the escalation path when ACK_FAILURE itself is rejected.
    pub async fn reset(&mut self) -> Result<(), BoltError> {
        self.send(&Request::Reset).await?;
        loop {
            match self.recv().await? {
                Response::Ignored => continue,
                Response::Success { .. } => {
                    self.stream_state = StreamState::None;
                    self.in_tx = false;
                    return Ok(());
                },
                Response::Failure { metadata } => {
                    let err = failure_to_error(&metadata);
                    warn!(error = %err, "reset failed, closing connection");
                    self.fail_fatally();
                    return Err(err);
                },
                other => {
                    self.fail_fatally();
                    return Err(BoltError::Protocol(format!(
                        "unexpected {} while resetting",
                        other.name()
                    )));
                },
            }
        }
    }

    /// Pool hook: rolls back an abandoned transaction and drains any
    /// abandoned result stream, returning the connection to Ready.
    pub async fn make_idle(&mut self) -> Result<(), BoltError> {
        if self.stream_state == StreamState::Streaming {
            loop {
                match self.consume().await? {
                    Response::Record { .. } => continue,
                    Response::Success { .. } => break,
                    other => {
                        self.fail_fatally();
                        return Err(BoltError::Protocol(format!(
                            "unexpected {} while draining a stream",
                            other.name()
                        )));
                    },
                }
            }
            self.stream_state = StreamState::None;
        }

        if self.in_tx {
            self.rollback_tx().await?;
        }
        Ok(())
    }

    /// Closes the connection, hinting GOODBYE first where the version has
    /// one. Safe to call twice.
    pub async fn close(&mut self) -> Result<(), BoltError> {
        if self.closed {
            return Ok(());
        }

        if let Some(goodbye) = self.protocol.goodbye_message() {
            // Best effort; the server does not answer GOODBYE.
            if let Err(e) = self.send(&goodbye).await {
                debug!(error = %e, "goodbye failed during close");
            }
        }

        let _ = self.shutdown_stream().await;
        self.closed = true;
        Ok(())
    }

    async fn shutdown_stream(&mut self) -> std::io::Result<()> {
        self.stream.shutdown().await
    }

    fn fail_fatally(&mut self) {
        self.stream_state = StreamState::None;
        self.in_tx = false;
        self.closed = true;
    }

    fn ensure_ready(&self, database: &str) -> Result<(), BoltError> {
        if self.closed {
            return Err(BoltError::Usage(
                "operation on a closed connection".to_string(),
            ));
        }
        if self.stream_state != StreamState::None {
            return Err(BoltError::Usage(
                "a result stream is already open on this connection".to_string(),
            ));
        }
        if !database.is_empty() && !self.protocol.supports_multi_database() {
            return Err(BoltError::Usage(format!(
                "bolt protocol version {} does not have multi database support",
                self.protocol.version()
            )));
        }
        Ok(())
    }

    /// Frames and writes one request.
    pub(crate) async fn send(&mut self, req: &Request) -> Result<(), BoltError> {
        if self.closed {
            return Err(BoltError::Usage(
                "operation on a closed connection".to_string(),
            ));
        }

        let payload = req.to_payload()?;
        let framed = frame_message(&payload, self.chunk_size)?;
        debug!(message = req.name(), bytes = framed.len(), "SEND");

        let res = io_with_timeout(
            "write message",
            self.stream.write_all(&framed),
            self.timeout,
        )
        .await;
        if let Err(e) = res {
            self.fail_fatally();
            return Err(e);
        }
        Ok(())
    }

    /// Reads and parses one response, without failure handling.
    pub(crate) async fn recv(&mut self) -> Result<Response, BoltError> {
        let payload = match io_with_timeout(
            "read message",
            read_message(&mut self.stream),
            self.timeout,
        )
        .await
        {
            Ok(p) => p,
            Err(e) => {
                self.fail_fatally();
                return Err(e);
            },
        };

        match Response::from_payload(&payload) {
            Ok(resp) => {
                debug!(message = resp.name(), "RECV");
                Ok(resp)
            },
            Err(e) => {
                self.fail_fatally();
                Err(e.into())
            },
        }
    }

    /// Reads one response; a FAILURE is acknowledged on the wire and then
    /// surfaced as an error, leaving the connection Ready again.
    pub(crate) async fn consume(&mut self) -> Result<Response, BoltError> {
        match self.recv().await? {
            Response::Failure { metadata } => {
                let err = failure_to_error(&metadata);
                warn!(error = %err, "server failure");
                self.recover().await?;
                Err(err)
            },
            other => Ok(other),
        }
    }

    pub(crate) async fn consume_success(
        &mut self,
    ) -> Result<HashMap<String, Value>, BoltError> {
        match self.consume().await? {
            Response::Success { metadata } => Ok(metadata),
            other => {
                self.fail_fatally();
                Err(BoltError::Protocol(format!(
                    "unexpected response {}, expected SUCCESS",
                    other.name()
                )))
            },
        }
    }

    /// Clears the server's failure state. IGNOREDs queued behind the failure
    /// are swallowed. A FAILURE answering ACK_FAILURE escalates to RESET
    /// once; a FAILURE answering RESET is fatal.
    async fn recover(&mut self) -> Result<(), BoltError> {
        self.stream_state = StreamState::None;
        self.in_tx = false;

        let ack = self.protocol.recovery_message();
        let acked_with_reset = matches!(ack, Request::Reset);
        self.send(&ack).await?;

        loop {
            match self.recv().await? {
                Response::Ignored => continue,
                Response::Success { .. } => return Ok(()),
                Response::Failure { metadata } => {
                    let err = failure_to_error(&metadata);
                    if acked_with_reset {
                        warn!(error = %err, "reset rejected, closing connection");
                        self.fail_fatally();
                        return Err(err);
                    }
                    warn!(error = %err, "ack rejected, escalating to reset");
                    return self.reset().await;
                },
                other => {
                    self.fail_fatally();
                    return Err(BoltError::Protocol(format!(
                        "unexpected {} while acknowledging a failure",
                        other.name()
                    )));
                },
            }
        }
    }
}

/// Lifts a FAILURE metadata map into the error it represents.
pub(crate) fn failure_to_error(metadata: &HashMap<String, Value>) -> BoltError {
    BoltError::ServerFailure {
        code: metadata_string(metadata, "code"),
        message: metadata_string(metadata, "message"),
    }
}
