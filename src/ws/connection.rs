#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use backoff::backoff::{Backoff as _, Constant};
use futures::{SinkExt as _, StreamExt as _};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::{CancellationToken, DropGuard};
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::packet::{self, Handshake, PONG, Packet, ROOT_NAMESPACE};
use super::traits::EventParser;
use crate::{Result, error::Error};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for incoming messages.
const BROADCAST_CAPACITY: usize = 1024;

/// Broadcast channel capacity for `connect_error` diagnostics.
const CONNECT_ERROR_CAPACITY: usize = 16;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`Connection`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a connection left the connected state.
///
/// The string forms match the reasons reported by Socket.IO clients.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum DisconnectReason {
    /// The server disconnected the namespace on purpose
    #[strum(serialize = "io server disconnect")]
    ServerDisconnect,
    /// The local side closed the connection
    #[strum(serialize = "io client disconnect")]
    ClientDisconnect,
    /// No packet arrived within `pingInterval + pingTimeout`
    #[strum(serialize = "ping timeout")]
    PingTimeout,
    /// The transport was closed without a Socket.IO disconnect
    #[strum(serialize = "transport close")]
    TransportClose,
    /// The transport failed
    #[strum(serialize = "transport error")]
    TransportError,
    /// Every allowed reconnection attempt failed
    #[strum(serialize = "reconnect failed")]
    ReconnectFailed,
}

impl DisconnectReason {
    /// Disconnects initiated on purpose by either endpoint.
    #[must_use]
    pub const fn is_deliberate(self) -> bool {
        matches!(self, Self::ServerDisconnect | Self::ClientDisconnect)
    }

    /// Reasons after which the connection never reconnects on its own.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::ServerDisconnect | Self::ClientDisconnect | Self::ReconnectFailed
        )
    }
}

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected {
        /// Why the connection ended, `None` before the first attempt.
        ///
        /// After a dropped session this holds the drop reason until the
        /// first reconnection attempt starts.
        reason: Option<DisconnectReason>,
    },
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Waiting before the next attempt
    Reconnecting {
        /// Number of the upcoming attempt
        attempt: u32,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if the connection has stopped for good.
    ///
    /// A dropped connection reports `Disconnected` with its reason while it
    /// waits to reconnect; that state is not final.
    #[must_use]
    pub const fn is_final(self) -> bool {
        match self {
            Self::Disconnected {
                reason: Some(reason),
            } => reason.is_final(),
            _ => false,
        }
    }
}

/// A failed handshake, published without changing [`ConnectionState`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectError {
    /// Consecutive failure count including this one
    pub attempt: u32,
    /// Human-readable failure description
    pub message: String,
}

/// Resolved WebSocket URL and Socket.IO namespace for a backend address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    namespace: String,
}

impl Endpoint {
    /// Resolve `endpoint` into the Engine.IO WebSocket URL served at `path`.
    ///
    /// `http`/`https` map to `ws`/`wss`. A non-root path on `endpoint` names
    /// the Socket.IO namespace, e.g. `https://host/alerts` joins `/alerts`.
    pub fn parse(endpoint: &str, path: &str) -> Result<Self> {
        let mut url = Url::parse(endpoint.trim())?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::validation(format!(
                    "unsupported endpoint scheme `{other}`"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::validation(format!("cannot use scheme `{scheme}`")))?;

        let namespace = match url.path().trim_end_matches('/') {
            "" => ROOT_NAMESPACE.to_owned(),
            nsp => nsp.to_owned(),
        };

        url.set_path(path);
        url.query_pairs_mut()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
        url.set_fragment(None);

        Ok(Self { url, namespace })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Senders shared between the handles and the background task.
struct Channels<M> {
    state_tx: watch::Sender<ConnectionState>,
    broadcast_tx: broadcast::Sender<M>,
    error_tx: broadcast::Sender<ConnectError>,
    cancel: CancellationToken,
}

impl<M> Channels<M> {
    /// Publish `state` unless the connection was closed locally.
    ///
    /// The cancellation check runs under the watch lock, so a state written by
    /// [`Connection::close`] is never overwritten by the background task.
    fn publish(&self, state: ConnectionState) -> bool {
        let mut published = false;
        self.state_tx.send_if_modified(|current| {
            if self.cancel.is_cancelled() {
                return false;
            }
            published = true;
            let changed = *current != state;
            *current = state;
            changed
        });
        published
    }
}

impl<M> Clone for Channels<M> {
    fn clone(&self) -> Self {
        Self {
            state_tx: self.state_tx.clone(),
            broadcast_tx: self.broadcast_tx.clone(),
            error_tx: self.error_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Handle to one live real-time connection.
///
/// The connection runs in a background task that handles:
/// - the Engine.IO / Socket.IO handshake, with the credential in the auth payload
/// - automatic reconnection with a fixed delay and bounded attempts
/// - liveness monitoring via the server's ping schedule
/// - broadcasting decoded events to any number of subscribers
///
/// Handles are cheap to clone. The background task stops when [`Connection::close`]
/// is called or when the last handle is dropped.
///
/// # Example
///
/// ```ignore
/// let endpoint = Endpoint::parse("https://api.example.com", "/socket.io/")?;
/// let connection = Connection::new(endpoint, auth, Config::default(), parser)?;
///
/// let mut rx = connection.subscribe();
/// while let Ok(event) = rx.recv().await {
///     println!("Received: {event:?}");
/// }
/// ```
pub struct Connection<M> {
    id: ConnectionId,
    channels: Channels<M>,
    state_rx: watch::Receiver<ConnectionState>,
    _guard: Arc<DropGuard>,
}

impl<M> Clone for Connection<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            channels: self.channels.clone(),
            state_rx: self.state_rx.clone(),
            _guard: Arc::clone(&self._guard),
        }
    }
}

impl<M> Debug for Connection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &*self.state_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl<M> Connection<M>
where
    M: Debug + Clone + Send + 'static,
{
    /// Create a new connection and start the connection loop.
    ///
    /// Returns immediately; the handshake completes in the background, so the
    /// returned handle is usually still [`ConnectionState::Connecting`].
    /// Must be called from within a Tokio runtime.
    pub fn new<P: EventParser<M>>(
        endpoint: Endpoint,
        auth: Value,
        config: Config,
        parser: P,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_e| {
            Error::validation("a real-time connection must be created inside a Tokio runtime")
        })?;

        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (error_tx, _) = broadcast::channel(CONNECT_ERROR_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected { reason: None });
        let cancel = CancellationToken::new();

        let channels = Channels {
            state_tx,
            broadcast_tx,
            error_tx,
            cancel: cancel.clone(),
        };
        let id = ConnectionId::next();

        let task_channels = channels.clone();
        runtime.spawn(async move {
            Self::connection_loop(id, endpoint, auth, config, parser, task_channels).await;
        });

        Ok(Self {
            id,
            channels,
            state_rx,
            _guard: Arc::new(cancel.drop_guard()),
        })
    }

    /// Main connection loop with automatic reconnection.
    async fn connection_loop<P: EventParser<M>>(
        id: ConnectionId,
        endpoint: Endpoint,
        auth: Value,
        config: Config,
        parser: P,
        channels: Channels<M>,
    ) {
        let mut failures = 0_u32;
        let mut backoff: Constant = config.reconnect.clone().into();

        loop {
            if !channels.publish(ConnectionState::Connecting) {
                break;
            }

            let outcome = tokio::select! {
                biased;
                () = channels.cancel.cancelled() => break,
                outcome = Self::establish(&endpoint, &auth, &config) => outcome,
            };

            let (reason, dropped) = match outcome {
                Ok((ws_stream, handshake)) => {
                    failures = 0;
                    backoff.reset();

                    if !channels.publish(ConnectionState::Connected {
                        since: Instant::now(),
                    }) {
                        Self::shutdown(ws_stream, &endpoint).await;
                        break;
                    }

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        connection = %id,
                        namespace = %endpoint.namespace(),
                        sid = %handshake.sid,
                        "Real-time connection established"
                    );

                    let reason =
                        Self::handle_connection(ws_stream, &endpoint, &handshake, &parser, &channels)
                            .await;

                    #[cfg(feature = "tracing")]
                    tracing::info!(connection = %id, %reason, "Real-time connection ended");

                    (reason, true)
                }
                Err(e) => {
                    failures = failures.saturating_add(1);

                    #[cfg(feature = "tracing")]
                    tracing::warn!(connection = %id, attempt = failures, error = %e, "Unable to connect");

                    _ = channels.error_tx.send(ConnectError {
                        attempt: failures,
                        message: e.to_string(),
                    });
                    (DisconnectReason::TransportError, false)
                }
            };

            match reason {
                // State was already published by `close`
                DisconnectReason::ClientDisconnect => break,
                DisconnectReason::ServerDisconnect => {
                    channels.publish(ConnectionState::Disconnected {
                        reason: Some(reason),
                    });
                    break;
                }
                _ => {}
            }

            if dropped || !config.reconnect.enabled {
                // A dropped session stays `Disconnected` with its reason until the next attempt.
                let published = channels.publish(ConnectionState::Disconnected {
                    reason: Some(reason),
                });
                if !published || !config.reconnect.enabled {
                    break;
                }
            } else {
                if config.reconnect.exhausted(failures) {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(connection = %id, failures, "Giving up after repeated connection failures");

                    channels.publish(ConnectionState::Disconnected {
                        reason: Some(DisconnectReason::ReconnectFailed),
                    });
                    break;
                }

                if !channels.publish(ConnectionState::Reconnecting {
                    attempt: failures.saturating_add(1),
                }) {
                    break;
                }
            }

            let delay = backoff.next_backoff().unwrap_or(config.reconnect.delay);
            tokio::select! {
                biased;
                () = channels.cancel.cancelled() => break,
                () = sleep(delay) => {}
            }
        }

        #[cfg(not(feature = "tracing"))]
        let _ = id;
    }

    /// Open the WebSocket and complete the Engine.IO and Socket.IO handshakes.
    async fn establish(
        endpoint: &Endpoint,
        auth: &Value,
        config: &Config,
    ) -> Result<(WsStream, Handshake)> {
        let attempt = open(endpoint, auth);

        match timeout(config.handshake_timeout, attempt).await {
            Ok(result) => result,
            Err(_elapsed) => Err(WsError::Timeout.into()),
        }
    }

    /// Handle an established connection until it ends, returning why it ended.
    async fn handle_connection<P: EventParser<M>>(
        ws_stream: WsStream,
        endpoint: &Endpoint,
        handshake: &Handshake,
        parser: &P,
        channels: &Channels<M>,
    ) -> DisconnectReason {
        let (mut write, mut read) = ws_stream.split();

        let liveness = Duration::from_millis(
            handshake
                .ping_interval
                .saturating_add(handshake.ping_timeout),
        );
        let watchdog = sleep(liveness);
        tokio::pin!(watchdog);

        loop {
            tokio::select! {
                biased;

                () = channels.cancel.cancelled() => {
                    let disconnect = packet::encode_disconnect(endpoint.namespace());
                    _ = write.send(Message::Text(disconnect.into())).await;
                    _ = write.send(Message::Close(None)).await;
                    return DisconnectReason::ClientDisconnect;
                }

                () = &mut watchdog => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Heartbeat timeout: no packet received within {liveness:?}");
                    return DisconnectReason::PingTimeout;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            watchdog.as_mut().reset(tokio::time::Instant::now() + liveness);

                            #[cfg(feature = "tracing")]
                            tracing::trace!(text = %text.as_str(), "Received WebSocket text message");

                            match packet::decode(text.as_str()) {
                                Ok(Packet::Ping) => {
                                    if write.send(Message::Text(PONG.into())).await.is_err() {
                                        return DisconnectReason::TransportError;
                                    }
                                }
                                Ok(Packet::Event { namespace, name, args, .. })
                                    if namespace == endpoint.namespace() =>
                                {
                                    dispatch(parser, &channels.broadcast_tx, &name, args);
                                }
                                Ok(Packet::Disconnect { namespace }) if namespace == endpoint.namespace() => {
                                    return DisconnectReason::ServerDisconnect;
                                }
                                Ok(Packet::Close) => return DisconnectReason::TransportClose,
                                Ok(Packet::Binary) => {
                                    #[cfg(feature = "tracing")]
                                    tracing::debug!("Ignoring Socket.IO packet with binary attachments");
                                }
                                Ok(_) => {
                                    // Acks, noops and other namespaces carry nothing for us.
                                }
                                Err(e) => {
                                    #[cfg(feature = "tracing")]
                                    tracing::warn!(text = %text.as_str(), error = %e, "Failed to decode packet");
                                    #[cfg(not(feature = "tracing"))]
                                    let _ = &e;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return DisconnectReason::TransportClose,
                        Some(Ok(_)) => {
                            // Binary frames and WebSocket-level ping/pong are not part of Engine.IO text framing.
                        }
                        Some(Err(e)) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %e, "WebSocket read failed");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &e;
                            return DisconnectReason::TransportError;
                        }
                    }
                }
            }
        }
    }

    /// Close a socket that finished its handshake after the handle was closed.
    async fn shutdown(mut ws_stream: WsStream, endpoint: &Endpoint) {
        let disconnect = packet::encode_disconnect(endpoint.namespace());
        _ = ws_stream.send(Message::Text(disconnect.into())).await;
        _ = ws_stream.close(None).await;
    }

    /// Process-unique id of this connection instance.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Terminate the connection and stop any pending reconnection.
    ///
    /// The state becomes [`DisconnectReason::ClientDisconnect`] before this
    /// returns, unless the connection had already stopped for good. A connected
    /// socket is sent a Socket.IO disconnect and closed in the background. Calling this more than once is harmless.
    pub fn close(&self) {
        self.channels.cancel.cancel();
        self.channels.state_tx.send_if_modified(|state| {
            if state.is_final() {
                return false;
            }
            *state = ConnectionState::Disconnected {
                reason: Some(DisconnectReason::ClientDisconnect),
            };
            true
        });
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can
    /// receive messages concurrently without blocking each other.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<M> {
        self.channels.broadcast_tx.subscribe()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.channels.state_tx.subscribe()
    }

    /// Subscribe to failed handshake diagnostics.
    #[must_use]
    pub fn connect_errors(&self) -> broadcast::Receiver<ConnectError> {
        self.channels.error_tx.subscribe()
    }
}

fn dispatch<M, P>(parser: &P, broadcast_tx: &broadcast::Sender<M>, name: &str, args: Vec<Value>)
where
    M: Debug,
    P: EventParser<M>,
{
    match parser.parse(name, args) {
        Ok(Some(message)) => {
            #[cfg(feature = "tracing")]
            tracing::trace!(?message, "Parsed real-time event");
            _ = broadcast_tx.send(message);
        }
        Ok(None) => {}
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(event = %name, error = %e, "Failed to parse real-time event");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }
    }
}

async fn open(endpoint: &Endpoint, auth: &Value) -> Result<(WsStream, Handshake)> {
    let (mut ws_stream, _) = connect_async(endpoint.url().as_str()).await?;

    let handshake = loop {
        match next_packet(&mut ws_stream).await? {
            Packet::Open(handshake) => break handshake,
            Packet::Noop => {}
            other => {
                return Err(WsError::InvalidPacket(format!(
                    "expected engine open, got {other:?}"
                ))
                .into());
            }
        }
    };

    let connect = packet::encode_connect(endpoint.namespace(), auth);
    ws_stream.send(Message::Text(connect.into())).await?;

    loop {
        match next_packet(&mut ws_stream).await? {
            Packet::Connect { namespace, .. } if namespace == endpoint.namespace() => {
                return Ok((ws_stream, handshake));
            }
            Packet::ConnectError { namespace, message } if namespace == endpoint.namespace() => {
                return Err(WsError::ConnectRejected(message).into());
            }
            Packet::Ping => ws_stream.send(Message::Text(PONG.into())).await?,
            Packet::Close => return Err(WsError::ConnectionClosed.into()),
            _ => {}
        }
    }
}

async fn next_packet(ws_stream: &mut WsStream) -> Result<Packet> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(packet::decode(text.as_str())?),
            Some(Ok(Message::Close(_))) | None => return Err(WsError::ConnectionClosed.into()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}
