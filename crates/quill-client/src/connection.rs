use crate::config::ClientConfig;
use crate::correlation::InFlight;
use crate::transport::{BoxedStream, Connector, TcpConnector};
use metrics::counter;
use quill_core::consistency::ConsistencyLevel;
use quill_core::error::ClientError;
use quill_core::types::Endpoint;
use quill_protocol::error::ProtocolError;
use quill_protocol::frame::{read_frame, write_frame, Frame, EVENT_STREAM};
use quill_protocol::messages::{QueryRequest, Request, Response, ResultBody, CQL_VERSION_KEY};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CQL_VERSION: &str = "3.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Active,
    Paused,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
            ConnectionState::Paused => "paused",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub cql_version: String,
    /// Bounds both the transport connect and each handshake exchange.
    pub connect_timeout: Duration,
    /// Consecutive malformed or uncorrelated responses tolerated before the
    /// connection is closed.
    pub max_protocol_errors: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            cql_version: DEFAULT_CQL_VERSION.to_string(),
            connect_timeout: Duration::from_secs(5),
            max_protocol_errors: 3,
        }
    }
}

/// A session with one node. Clones share the session; all of them observe
/// the same state and in-flight table.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    endpoint: Endpoint,
    keyspace: String,
    options: ConnectionOptions,
    connector: Box<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    // Only read or written inside `state.send_if_modified`, so it cannot
    // race with a transition.
    pause_requested: AtomicBool,
    pub(crate) in_flight: InFlight,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    protocol_strikes: AtomicU32,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Connection {
    /// Builds a connection over TCP without touching the network; the first
    /// `execute` (or `open`) performs the handshake.
    pub fn new(endpoint: Endpoint, keyspace: impl Into<String>) -> Self {
        Self::with_connector(endpoint, keyspace, ConnectionOptions::default(), TcpConnector)
    }

    pub fn with_connector(
        endpoint: Endpoint,
        keyspace: impl Into<String>,
        options: ConnectionOptions,
        connector: impl Connector,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            shared: Arc::new(Shared {
                endpoint,
                keyspace: keyspace.into(),
                options,
                connector: Box::new(connector),
                state,
                pause_requested: AtomicBool::new(false),
                in_flight: InFlight::new(),
                outbound: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
                protocol_strikes: AtomicU32::new(0),
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_connector(
            config.endpoint.clone(),
            config.keyspace.clone(),
            config.connection_options(),
            TcpConnector,
        )
    }

    /// Connects and completes the handshake before returning.
    pub async fn connect(endpoint: Endpoint, keyspace: impl Into<String>) -> Result<Self, ClientError> {
        let connection = Self::new(endpoint, keyspace);
        connection.open().await?;
        Ok(connection)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    pub fn keyspace(&self) -> &str {
        &self.shared.keyspace
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Requests sent whose responses have not arrived yet.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.len()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Runs the handshake if nobody has yet and waits for it to settle.
    /// Resolves once the connection is active or paused.
    pub async fn open(&self) -> Result<(), ClientError> {
        self.settle(true).await
    }

    /// Waits until requests may be written: active, connecting first if the
    /// connection was never opened.
    pub(crate) async fn ready(&self) -> Result<(), ClientError> {
        self.settle(false).await
    }

    async fn settle(&self, accept_paused: bool) -> Result<(), ClientError> {
        let mut rx = self.shared.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ConnectionState::Active => return Ok(()),
                ConnectionState::Paused if accept_paused => return Ok(()),
                ConnectionState::Closed => return Err(ClientError::ConnectionClosed),
                ConnectionState::Uninitialized => self.establish().await?,
                ConnectionState::Connecting | ConnectionState::Paused => {
                    if rx.changed().await.is_err() {
                        return Err(ClientError::ConnectionClosed);
                    }
                }
            }
        }
    }

    /// Stops new requests from being written. Requests already on the wire
    /// still complete. Before the handshake finishes this only records the
    /// request, and the connection lands in paused instead of active.
    pub fn pause(&self) {
        let shared = &self.shared;
        let changed = shared.state.send_if_modified(|state| match *state {
            ConnectionState::Active => {
                *state = ConnectionState::Paused;
                true
            }
            ConnectionState::Uninitialized | ConnectionState::Connecting => {
                shared.pause_requested.store(true, Ordering::SeqCst);
                false
            }
            ConnectionState::Paused | ConnectionState::Closed => false,
        });
        if changed {
            debug!(endpoint = %shared.endpoint, "connection paused");
        }
    }

    pub fn resume(&self) {
        let shared = &self.shared;
        let changed = shared.state.send_if_modified(|state| {
            shared.pause_requested.store(false, Ordering::SeqCst);
            if *state == ConnectionState::Paused {
                *state = ConnectionState::Active;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(endpoint = %shared.endpoint, "connection resumed");
        }
    }

    /// Closes the session. Every in-flight request and every later call
    /// fails with `ConnectionClosed`. Idempotent.
    pub fn close(&self) {
        self.shared.shutdown(ClientError::ConnectionClosed);
    }

    async fn establish(&self) -> Result<(), ClientError> {
        let claimed = self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Uninitialized {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Ok(());
        }
        let shared = &self.shared;
        info!(endpoint = %shared.endpoint, keyspace = %shared.keyspace, "connecting");
        counter!("quill_connect_attempts_total").increment(1);

        if let Err(err) = self.handshake().await {
            error!(endpoint = %shared.endpoint, "handshake failed: {err}");
            counter!("quill_handshake_failures_total").increment(1);
            shared.shutdown(err.clone());
            return Err(err);
        }

        let landed = shared.state.send_if_modified(|state| {
            if *state != ConnectionState::Connecting {
                return false;
            }
            *state = if shared.pause_requested.swap(false, Ordering::SeqCst) {
                ConnectionState::Paused
            } else {
                ConnectionState::Active
            };
            true
        });
        if !landed {
            // Closed while the handshake was running.
            shared.shutdown(ClientError::ConnectionClosed);
            return Err(ClientError::ConnectionClosed);
        }
        info!(endpoint = %shared.endpoint, state = %self.state(), "connection established");
        Ok(())
    }

    async fn handshake(&self) -> Result<(), ClientError> {
        let shared = &self.shared;
        let deadline = shared.options.connect_timeout;
        let stream = tokio::time::timeout(deadline, shared.connector.connect(&shared.endpoint))
            .await
            .map_err(|_| ClientError::Handshake(format!("connect timed out after {deadline:?}")))?
            .map_err(|err| ClientError::Handshake(format!("connect: {err}")))?;
        self.spawn_io(stream);

        let mut options = HashMap::new();
        options.insert(CQL_VERSION_KEY.to_string(), shared.options.cql_version.clone());
        match self.handshake_step(Request::Startup { options }).await? {
            Response::Ready => {}
            Response::Authenticate { authenticator } => {
                return Err(ClientError::Handshake(format!(
                    "node requires authentication ({authenticator})"
                )));
            }
            other => return Err(unexpected_handshake_reply("STARTUP", &other)),
        }

        if shared.keyspace.is_empty() {
            return Ok(());
        }
        if !is_identifier(&shared.keyspace) {
            return Err(ClientError::Handshake(format!(
                "invalid keyspace name {:?}",
                shared.keyspace
            )));
        }
        let select = Request::Query(QueryRequest {
            query: format!("USE {}", shared.keyspace),
            consistency: ConsistencyLevel::One,
            values: Vec::new(),
        });
        match self.handshake_step(select).await? {
            Response::Result(ResultBody::SetKeyspace(_)) => Ok(()),
            other => Err(unexpected_handshake_reply("USE", &other)),
        }
    }

    async fn handshake_step(&self, request: Request) -> Result<Response, ClientError> {
        let deadline = self.shared.options.connect_timeout;
        let frame = tokio::time::timeout(deadline, self.shared.round_trip(request))
            .await
            .map_err(|_| ClientError::Handshake(format!("no reply within {deadline:?}")))?
            .map_err(|err| ClientError::Handshake(err.to_string()))?;
        let response = Response::decode(frame.opcode, frame.body)
            .map_err(|err| ClientError::Handshake(err.to_string()))?;
        if let Response::Error { code, message } = response {
            return Err(ClientError::Handshake(format!("{code:#06x}: {message}")));
        }
        Ok(response)
    }

    fn spawn_io(&self, stream: BoxedStream) {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        *locked(&self.shared.outbound) = Some(tx);
        let reader = tokio::spawn(read_loop(Arc::downgrade(&self.shared), read_half));
        let writer = tokio::spawn(write_loop(Arc::downgrade(&self.shared), write_half, rx));
        locked(&self.shared.tasks).extend([reader, writer]);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.shared.endpoint)
            .field("keyspace", &self.shared.keyspace)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    pub(crate) fn is_closed(&self) -> bool {
        *self.state.borrow() == ConnectionState::Closed
    }

    /// Sends `request` on a fresh stream id and waits for the frame that
    /// carries the same id back.
    pub(crate) async fn round_trip(&self, request: Request) -> Result<Frame, ClientError> {
        let (tx, rx) = oneshot::channel();
        let stream = self.in_flight.register(tx)?;
        if self.is_closed() {
            self.in_flight.cancel(stream);
            return Err(ClientError::ConnectionClosed);
        }
        let frame = request.into_frame(stream);
        let queued = locked(&self.outbound)
            .as_ref()
            .map(|outbound| outbound.send(frame).is_ok())
            .unwrap_or(false);
        if !queued {
            self.in_flight.cancel(stream);
            return Err(ClientError::ConnectionClosed);
        }
        rx.await.unwrap_or(Err(ClientError::ConnectionClosed))
    }

    pub(crate) fn record_success(&self) {
        self.protocol_strikes.store(0, Ordering::SeqCst);
    }

    pub(crate) fn record_protocol_error(&self) {
        counter!("quill_protocol_errors_total").increment(1);
        let strikes = self.protocol_strikes.fetch_add(1, Ordering::SeqCst) + 1;
        if strikes >= self.options.max_protocol_errors {
            warn!(endpoint = %self.endpoint, strikes, "too many protocol errors, closing");
            self.shutdown(ClientError::ConnectionLost(format!(
                "{strikes} consecutive protocol errors"
            )));
        }
    }

    /// Latches the connection closed, stops the I/O tasks and fails every
    /// in-flight request with `reason`.
    pub(crate) fn shutdown(&self, reason: ClientError) {
        let changed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
        locked(&self.outbound).take();
        for task in locked(&self.tasks).drain(..) {
            task.abort();
        }
        let failed = self.in_flight.fail_all(&reason);
        if changed {
            counter!("quill_connections_closed_total").increment(1);
            info!(endpoint = %self.endpoint, failed, "connection closed: {reason}");
        }
    }

    fn dispatch(&self, frame: Frame) {
        if frame.stream == EVENT_STREAM {
            debug!(endpoint = %self.endpoint, opcode = ?frame.opcode, "ignoring pushed event");
            return;
        }
        let stream = frame.stream;
        if !self.in_flight.complete(frame) {
            warn!(endpoint = %self.endpoint, stream, "response for unknown stream id");
            self.record_protocol_error();
        }
    }
}

async fn read_loop(shared: Weak<Shared>, mut read_half: ReadHalf<BoxedStream>) {
    loop {
        let result = read_frame(&mut read_half).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match result {
            Ok(frame) => shared.dispatch(frame),
            Err(err) => {
                let reason = match err {
                    ProtocolError::Io(err) => ClientError::TransportReset(err.to_string()),
                    other => ClientError::ConnectionLost(other.to_string()),
                };
                shared.shutdown(reason);
                return;
            }
        }
    }
}

async fn write_loop(
    shared: Weak<Shared>,
    mut write_half: WriteHalf<BoxedStream>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(err) = write_frame(&mut write_half, &frame).await {
            if let Some(shared) = shared.upgrade() {
                shared.shutdown(ClientError::TransportReset(err.to_string()));
            }
            return;
        }
    }
    let _ = write_half.shutdown().await;
}

fn unexpected_handshake_reply(step: &str, response: &Response) -> ClientError {
    ClientError::Handshake(format!(
        "unexpected {:?} reply to {step}",
        response.opcode()
    ))
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Drop for Shared {
    fn drop(&mut self) {
        for task in locked(&self.tasks).drain(..) {
            task.abort();
        }
    }
}
