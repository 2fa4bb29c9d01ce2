//! Real-time telemetry from the flood-monitoring backend.
//!
//! The backend pushes sensor readings, alerts and device changes over a
//! Socket.IO connection. [`ConnectionManager`] keeps at most one such
//! connection alive and hands out [`Client`] handles to it; a connection is
//! reused only while it is connected and the endpoint and credential are
//! unchanged.
//!
//! # Events
//!
//! | Event | Stream |
//! |---|---|
//! | `new_sensor_data` | [`Client::subscribe_sensor_data`] |
//! | `flood_alert` | [`Client::subscribe_flood_alerts`] |
//! | `rapid_rise_alert` | [`Client::subscribe_rapid_rise_alerts`] |
//! | `rainfall_update` | [`Client::subscribe_rainfall_updates`] |
//! | `device_updated` | [`Client::subscribe_device_updates`] |
//! | `device_status_update` | [`Client::subscribe_device_status`] |
//! | `water_quality_update` | [`Client::subscribe_water_quality`] |
//! | `critical_water_quality_alert` | [`Client::subscribe_critical_water_quality_alerts`] |
//!
//! [`Client::subscribe_events`] yields all of them, plus any event this crate
//! does not know as [`TelemetryEvent::Other`].
//!
//! # Example
//!
//! ```rust, no_run
//! use floodwatch_client::auth::Credential;
//! use floodwatch_client::telemetry::ConnectionManager;
//! use futures::StreamExt as _;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let endpoint = floodwatch_client::endpoint_from_env()?;
//!     let client = ConnectionManager::shared().acquire(&endpoint, Some(Credential::new("jwt")))?;
//!
//!     let mut readings = Box::pin(client.subscribe_sensor_data());
//!     while let Some(reading) = readings.next().await {
//!         let reading = reading?;
//!         println!("{} -> {:?} cm", reading.device_id, reading.water_level());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod manager;
pub mod types;

pub use client::{Client, TelemetryParser};
pub use manager::{
    ConnectionIdentity, ConnectionManager, Connector, DisconnectPolicy, Link, SocketConnector,
};
pub use types::TelemetryEvent;
