#![expect(
    clippy::module_name_repetitions,
    reason = "ConnectionManager and ConnectionIdentity read better with their full names"
)]

use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use super::client::Client;
use crate::Result;
use crate::auth::Credential;
use crate::error::Error;
use crate::ws::config::Config;
use crate::ws::connection::{ConnectionId, ConnectionState};

/// The settings a connection was opened with.
///
/// Two identities are equal when the endpoints are byte-equal and the
/// credentials are both absent or both present with the same secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    endpoint: String,
    credential: Option<Credential>,
}

impl ConnectionIdentity {
    #[must_use]
    pub fn new<S: Into<String>>(endpoint: S, credential: Option<Credential>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

/// What the manager does when its current connection is disconnected on
/// purpose ("io server disconnect" or "io client disconnect").
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectPolicy {
    /// Log the disconnect and keep the stored identity. The next
    /// [`ConnectionManager::acquire`] sees a dead connection and replaces it.
    #[default]
    Observe,
    /// Forget the stored identity as well.
    ClearIdentity,
}

/// A connection handle the manager can supervise.
pub trait Link: Clone + Send + Sync + 'static {
    fn connection_id(&self) -> ConnectionId;

    /// Whether the handshake completed and the connection is still up.
    fn connected(&self) -> bool;

    /// Stop the connection and any pending reconnection. Must not block.
    fn terminate(&self);

    fn watch_state(&self) -> watch::Receiver<ConnectionState>;
}

/// Opens connections for a [`ConnectionManager`].
pub trait Connector: Send + Sync + 'static {
    type Handle: Link;

    fn connect(&self, identity: &ConnectionIdentity) -> Result<Self::Handle>;
}

/// Opens Socket.IO connections with a fixed [`Config`].
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct SocketConnector {
    config: Config,
}

impl SocketConnector {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Connector for SocketConnector {
    type Handle = Client;

    fn connect(&self, identity: &ConnectionIdentity) -> Result<Client> {
        Client::connect(identity.clone(), self.config.clone())
    }
}

struct Slot<H> {
    current: Option<H>,
    identity: Option<ConnectionIdentity>,
}

impl<H: Link> Slot<H> {
    /// Apply a state change reported by connection `id`.
    ///
    /// Returns `false` once `id` is no longer the current connection, after
    /// which its reports are ignored.
    fn observe(&mut self, id: ConnectionId, state: ConnectionState, policy: DisconnectPolicy) -> bool {
        if self.current.as_ref().map(Link::connection_id) != Some(id) {
            #[cfg(feature = "tracing")]
            tracing::debug!(connection = %id, ?state, "Ignoring state change of superseded connection");
            return false;
        }

        if let ConnectionState::Disconnected {
            reason: Some(reason),
        } = state
        {
            if reason.is_deliberate() {
                #[cfg(feature = "tracing")]
                tracing::info!(connection = %id, %reason, ?policy, "Telemetry connection disconnected");

                if policy == DisconnectPolicy::ClearIdentity {
                    self.identity = None;
                }
            } else {
                #[cfg(feature = "tracing")]
                tracing::warn!(connection = %id, %reason, "Telemetry connection lost");
            }
        }

        true
    }

    fn take(&mut self) -> Option<H> {
        self.identity = None;
        self.current.take()
    }
}

/// Owns at most one live telemetry connection and decides when to reuse it.
///
/// [`acquire`](Self::acquire) reuses the current connection only while it is
/// connected and was opened with the same endpoint and credential; otherwise
/// the old connection is closed before a new one is opened.
/// [`release`](Self::release) closes it and forgets the identity.
///
/// A process-wide instance is available from [`ConnectionManager::shared`].
///
/// # Example
///
/// ```rust, no_run
/// use floodwatch_client::auth::Credential;
/// use floodwatch_client::telemetry::{ConnectionManager, DisconnectPolicy};
///
/// # async fn example() -> floodwatch_client::Result<()> {
/// let manager = ConnectionManager::new().with_disconnect_policy(DisconnectPolicy::ClearIdentity);
///
/// let client = manager.acquire("https://api.floodwatch.example", Some(Credential::new("jwt")))?;
/// let mut alerts = Box::pin(client.subscribe_flood_alerts());
///
/// // Once `client` is connected, the same identity gets the same connection back.
/// let again = manager.acquire("https://api.floodwatch.example", Some(Credential::new("jwt")))?;
///
/// // Signing out
/// manager.release();
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<C: Connector = SocketConnector> {
    connector: C,
    policy: DisconnectPolicy,
    slot: Arc<Mutex<Slot<C::Handle>>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// A manager whose connections reconnect up to 5 times, 3 seconds apart.
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(SocketConnector::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_connector(SocketConnector::new(config))
    }

    /// The process-wide manager, created with default settings on first use.
    #[must_use]
    pub fn shared() -> &'static ConnectionManager {
        static SHARED: LazyLock<ConnectionManager> = LazyLock::new(ConnectionManager::new);
        &SHARED
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// A manager that opens connections through `connector`.
    #[must_use]
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            policy: DisconnectPolicy::default(),
            slot: Arc::new(Mutex::new(Slot {
                current: None,
                identity: None,
            })),
        }
    }

    #[must_use]
    pub fn with_disconnect_policy(mut self, policy: DisconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn disconnect_policy(&self) -> DisconnectPolicy {
        self.policy
    }

    /// Return a handle to a connection for `endpoint` and `credential`.
    ///
    /// The current connection is reused if it is connected and was opened with
    /// the same identity. In every other case, including a connection that is
    /// still handshaking, the current connection is closed and a new one is
    /// opened. Never waits for the network.
    ///
    /// # Errors
    ///
    /// An empty `endpoint` is a configuration error and opens nothing. The
    /// connector's errors (an unparsable URL, no Tokio runtime) are returned
    /// as-is; the previous connection is closed by then.
    pub fn acquire(&self, endpoint: &str, credential: Option<Credential>) -> Result<C::Handle> {
        if endpoint.trim().is_empty() {
            return Err(Error::missing_config(crate::SOCKET_URL_VAR));
        }

        let identity = ConnectionIdentity::new(endpoint, credential);
        let mut slot = lock(&self.slot);

        if let Some(current) = &slot.current
            && current.connected()
            && slot.identity.as_ref() == Some(&identity)
        {
            return Ok(current.clone());
        }

        if let Some(previous) = slot.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!(connection = %previous.connection_id(), "Closing superseded telemetry connection");
            previous.terminate();
        }

        let handle = self.connector.connect(&identity)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            connection = %handle.connection_id(),
            endpoint = %identity.endpoint(),
            authenticated = identity.credential().is_some(),
            "Opening telemetry connection"
        );

        slot.current = Some(handle.clone());
        slot.identity = Some(identity);
        drop(slot);

        self.watch(&handle);

        Ok(handle)
    }

    /// Close the current connection, if any, and forget its identity.
    ///
    /// Safe to call repeatedly.
    pub fn release(&self) {
        let previous = lock(&self.slot).take();

        if let Some(previous) = previous {
            #[cfg(feature = "tracing")]
            tracing::info!(connection = %previous.connection_id(), "Releasing telemetry connection");
            previous.terminate();
        }
    }

    /// The identity of the current connection.
    #[must_use]
    pub fn identity(&self) -> Option<ConnectionIdentity> {
        lock(&self.slot).identity.clone()
    }

    /// The current connection, whatever its state.
    #[must_use]
    pub fn current(&self) -> Option<C::Handle> {
        lock(&self.slot).current.clone()
    }

    /// Apply the disconnect policy to `handle` until it is superseded.
    fn watch(&self, handle: &C::Handle) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let slot: Weak<Mutex<Slot<C::Handle>>> = Arc::downgrade(&self.slot);
        let id = handle.connection_id();
        let policy = self.policy;
        let mut states = handle.watch_state();

        runtime.spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                let Some(shared) = slot.upgrade() else {
                    break;
                };

                let current = lock(&shared).observe(id, state, policy);
                if !current {
                    break;
                }
                // Dropped sessions report `Disconnected` too while they wait to reconnect.
                if state.is_final() {
                    break;
                }
            }
        });
    }
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = lock(&self.slot);
        f.debug_struct("ConnectionManager")
            .field("policy", &self.policy)
            .field("identity", &slot.identity)
            .field(
                "current",
                &slot.current.as_ref().map(Link::connection_id),
            )
            .finish_non_exhaustive()
    }
}

fn lock<H>(slot: &Mutex<Slot<H>>) -> MutexGuard<'_, Slot<H>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
