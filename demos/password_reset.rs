//! Request a password reset email.
//!
//! ```sh
//! FLOODWATCH_API_URL=http://localhost:5000 RUST_LOG=debug \
//!     cargo run --example password_reset --features tracing -- operator@example.com
//! ```

use floodwatch_client::account::Client;
use floodwatch_client::account::types::PasswordResetRequest;
use floodwatch_client::error::Status;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let email = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: password_reset <email>"))?;

    let client = Client::from_env()?;
    let request = PasswordResetRequest::builder().email(email).build();

    match client.request_password_reset(&request).await {
        Ok(response) => info!(message = %response.message, "reset requested"),
        Err(e) => match e.downcast_ref::<Status>() {
            Some(status) => error!(status = %status.status_code, message = %status.message, "reset refused"),
            None => error!(error = %e, "reset request failed"),
        },
    }

    Ok(())
}
