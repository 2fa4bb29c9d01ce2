//! Re-exported types from external crates for convenience.
//!
//! Event timestamps are exposed as these types, so users don't need to add
//! `chrono` to their `Cargo.toml` to name them.

/// Date and time types for event timestamps.
pub use chrono::{DateTime, Utc};
