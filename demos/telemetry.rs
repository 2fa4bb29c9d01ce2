//! Live telemetry monitor.
//!
//! Connects to the endpoint in `FLOODWATCH_SOCKET_URL`, prints connection
//! state changes and alerts, and shows that acquiring the same identity twice
//! reuses the connection.
//!
//! Run with tracing enabled:
//! ```sh
//! FLOODWATCH_SOCKET_URL=http://localhost:5000 FLOODWATCH_TOKEN=... \
//!     RUST_LOG=info cargo run --example telemetry --features tracing
//! ```

use std::time::Duration;

use floodwatch_client::auth::Credential;
use floodwatch_client::endpoint_from_env;
use floodwatch_client::telemetry::{ConnectionManager, TelemetryEvent};
use futures::StreamExt as _;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint = endpoint_from_env()?;
    let credential = std::env::var("FLOODWATCH_TOKEN").ok().map(Credential::new);

    let manager = ConnectionManager::shared();
    let client = manager.acquire(&endpoint, credential.clone())?;

    let mut states = Box::pin(client.subscribe_state());
    tokio::spawn(async move {
        while let Some(state) = states.next().await {
            info!(?state, "connection state");
        }
    });

    let mut errors = Box::pin(client.subscribe_connect_errors());
    tokio::spawn(async move {
        while let Some(Ok(error)) = errors.next().await {
            warn!(attempt = error.attempt, message = %error.message, "connect_error");
        }
    });

    let mut events = Box::pin(client.subscribe_events());
    while let Ok(Some(event)) = timeout(Duration::from_secs(60), events.next()).await {
        match event {
            Ok(TelemetryEvent::FloodAlert(alert)) => {
                warn!(device = %alert.device_id, level = alert.water_level, active = alert.active(), "{}", alert.message);
            }
            Ok(TelemetryEvent::CriticalWaterQualityAlert(alert)) => {
                warn!(device = %alert.device_id, parameter = ?alert.critical_parameter, "{}", alert.message);
            }
            Ok(TelemetryEvent::SensorData(reading)) => {
                info!(device = %reading.device_id, level = ?reading.water_level(), "reading");
            }
            Ok(other) => info!(event = other.name(), device = ?other.device_id(), "event"),
            Err(e) => warn!(error = %e, "stream error"),
        }

        let again = manager.acquire(&endpoint, credential.clone())?;
        if again.id() != client.id() {
            info!(old = %client.id(), new = %again.id(), "connection was replaced");
            break;
        }
    }

    manager.release();
    Ok(())
}
