//! Account API client.
//!
//! Covers the unauthenticated account endpoints of the flood-monitoring
//! backend.
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/auth/request-password-reset` | POST | Email a password reset link |
//!
//! # Example
//!
//! ```no_run
//! use floodwatch_client::account::{Client, types::PasswordResetRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("https://api.floodwatch.example")?;
//!
//! let request = PasswordResetRequest::builder().email("operator@example.com").build();
//! let response = client.request_password_reset(&request).await?;
//! println!("{}", response.message);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod types;

pub use client::Client;
