use std::sync::Arc;

use async_stream::{stream, try_stream};
use futures::{Stream, StreamExt as _};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use super::manager::{ConnectionIdentity, Link};
use super::types::response::{
    CriticalWaterQualityAlert, Device, DeviceStatusUpdate, FloodAlert, RainfallUpdate,
    RapidRiseAlert, SensorData, TelemetryEvent, WaterQualityUpdate,
};
use crate::Result;
use crate::ws::config::Config;
use crate::ws::connection::{ConnectError, Connection, ConnectionId, ConnectionState, Endpoint};
use crate::ws::{EventParser, HandshakeAuth as _, WsError};

/// Decodes Socket.IO events into [`TelemetryEvent`]s.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryParser;

impl EventParser<TelemetryEvent> for TelemetryParser {
    fn parse(&self, name: &str, args: Vec<Value>) -> Result<Option<TelemetryEvent>> {
        TelemetryEvent::parse(name, args).map(Some)
    }
}

/// Handle to a live telemetry connection.
///
/// Obtained from [`ConnectionManager::acquire`](super::ConnectionManager::acquire).
/// Clones share the same underlying connection; every `subscribe_*` call
/// returns an independent stream.
///
/// # Example
///
/// ```rust, no_run
/// use floodwatch_client::telemetry::ConnectionManager;
/// use futures::StreamExt as _;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = ConnectionManager::shared().acquire("https://api.floodwatch.example", None)?;
///
///     let stream = client.subscribe_flood_alerts();
///     let mut stream = Box::pin(stream);
///
///     while let Some(alert) = stream.next().await {
///         let alert = alert?;
///         println!("{}: {}", alert.device_id, alert.message);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    identity: ConnectionIdentity,
    connection: Connection<TelemetryEvent>,
}

impl Client {
    /// Open a connection for `identity`, outside of any manager.
    ///
    /// The handshake runs in the background; check [`Client::connection_state`]
    /// or [`Client::subscribe_state`] to follow it.
    pub fn connect(identity: ConnectionIdentity, config: Config) -> Result<Self> {
        let endpoint = Endpoint::parse(identity.endpoint(), &config.path)?;
        let auth = identity.credential().auth_payload();
        let connection = Connection::new(endpoint, auth, config, TelemetryParser)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                identity,
                connection,
            }),
        })
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.connection.id()
    }

    /// The endpoint and credential this connection was opened with.
    #[must_use]
    pub fn identity(&self) -> &ConnectionIdentity {
        &self.inner.identity
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Disconnect without going through the manager.
    ///
    /// Prefer [`ConnectionManager::release`](super::ConnectionManager::release),
    /// which also forgets the stored identity.
    pub fn close(&self) {
        self.inner.connection.close();
    }

    /// Stream every decoded event, including unrecognized ones.
    ///
    /// Yields [`WsError::Lagged`] if this subscriber falls more than the
    /// channel capacity behind, then continues with the newest events.
    pub fn subscribe_events(&self) -> impl Stream<Item = Result<TelemetryEvent>> {
        let mut rx = self.inner.connection.subscribe();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Telemetry subscription lagged, missed {n} events");
                        Err(WsError::Lagged { count: n })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    pub fn subscribe_sensor_data(&self) -> impl Stream<Item = Result<SensorData>> {
        self.filtered(|event| match event {
            TelemetryEvent::SensorData(data) => Some(data),
            _ => None,
        })
    }

    pub fn subscribe_flood_alerts(&self) -> impl Stream<Item = Result<FloodAlert>> {
        self.filtered(|event| match event {
            TelemetryEvent::FloodAlert(alert) => Some(alert),
            _ => None,
        })
    }

    pub fn subscribe_rapid_rise_alerts(&self) -> impl Stream<Item = Result<RapidRiseAlert>> {
        self.filtered(|event| match event {
            TelemetryEvent::RapidRiseAlert(alert) => Some(alert),
            _ => None,
        })
    }

    pub fn subscribe_rainfall_updates(&self) -> impl Stream<Item = Result<RainfallUpdate>> {
        self.filtered(|event| match event {
            TelemetryEvent::RainfallUpdate(update) => Some(update),
            _ => None,
        })
    }

    /// Stream full device records sent after a device is edited.
    pub fn subscribe_device_updates(&self) -> impl Stream<Item = Result<Device>> {
        self.filtered(|event| match event {
            TelemetryEvent::DeviceUpdated(device) => Some(device),
            _ => None,
        })
    }

    /// Stream online/offline transitions of devices.
    pub fn subscribe_device_status(&self) -> impl Stream<Item = Result<DeviceStatusUpdate>> {
        self.filtered(|event| match event {
            TelemetryEvent::DeviceStatus(status) => Some(status),
            _ => None,
        })
    }

    pub fn subscribe_water_quality(&self) -> impl Stream<Item = Result<WaterQualityUpdate>> {
        self.filtered(|event| match event {
            TelemetryEvent::WaterQuality(update) => Some(update),
            _ => None,
        })
    }

    pub fn subscribe_critical_water_quality_alerts(
        &self,
    ) -> impl Stream<Item = Result<CriticalWaterQualityAlert>> {
        self.filtered(|event| match event {
            TelemetryEvent::CriticalWaterQualityAlert(alert) => Some(alert),
            _ => None,
        })
    }

    /// Stream connection state changes, starting with the current state.
    ///
    /// Intermediate states may be skipped if they change faster than the
    /// stream is polled; the latest state is always delivered.
    pub fn subscribe_state(&self) -> impl Stream<Item = ConnectionState> {
        let mut rx = self.inner.connection.state_receiver();

        stream! {
            let current = *rx.borrow_and_update();
            yield current;

            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                yield state;
            }
        }
    }

    /// Stream failed handshake attempts.
    ///
    /// These do not change [`Client::connection_state`] on their own.
    pub fn subscribe_connect_errors(&self) -> impl Stream<Item = Result<ConnectError>> {
        let mut rx = self.inner.connection.connect_errors();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(error) => yield error,
                    Err(RecvError::Lagged(n)) => Err(WsError::Lagged { count: n })?,
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    fn filtered<T>(
        &self,
        pick: fn(TelemetryEvent) -> Option<T>,
    ) -> impl Stream<Item = Result<T>> {
        self.subscribe_events().filter_map(move |event| async move {
            match event {
                Ok(event) => pick(event).map(Ok),
                Err(e) => Some(Err(e)),
            }
        })
    }
}

impl Link for Client {
    fn connection_id(&self) -> ConnectionId {
        self.id()
    }

    fn connected(&self) -> bool {
        self.is_connected()
    }

    fn terminate(&self) {
        self.close();
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt as _;
    use serde_json::json;

    use super::*;
    use crate::auth::Credential;

    #[test]
    fn parser_keeps_unknown_events() {
        let event = TelemetryParser
            .parse("ping_stats", vec![json!({"rtt": 12})])
            .unwrap();

        assert!(matches!(event, Some(TelemetryEvent::Other { .. })));
    }

    #[tokio::test]
    async fn connect_rejects_invalid_endpoint() {
        let identity = ConnectionIdentity::new("not a url", None);

        Client::connect(identity, Config::default()).unwrap_err();
    }

    #[tokio::test]
    async fn close_publishes_client_disconnect() {
        let identity =
            ConnectionIdentity::new("http://127.0.0.1:9", Some(Credential::new("token")));
        let client = Client::connect(identity.clone(), Config::default()).unwrap();
        assert_eq!(client.identity(), &identity);

        let mut states = Box::pin(client.subscribe_state());
        let first = states.next().await.unwrap();
        assert!(!first.is_connected(), "handshake cannot have completed yet");

        client.close();

        assert_eq!(
            client.connection_state(),
            ConnectionState::Disconnected {
                reason: Some(crate::ws::connection::DisconnectReason::ClientDisconnect)
            }
        );
    }
}
