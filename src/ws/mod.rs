//! Socket.IO transport.
//!
//! A [`Connection`] owns one WebSocket speaking Engine.IO v4 / Socket.IO v5
//! and runs it in a background task: handshake, heartbeat replies, liveness
//! watchdog and fixed-delay reconnection. Decoded events are handed to an
//! [`EventParser`] and broadcast to subscribers.
//!
//! # Example
//!
//! ```ignore
//! let endpoint = Endpoint::parse("https://api.floodwatch.example", "/socket.io/")?;
//! let connection = Connection::new(endpoint, json!({}), Config::default(), MyParser)?;
//! let mut events = connection.subscribe();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod packet;
pub mod traits;

pub use connection::Connection;
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
