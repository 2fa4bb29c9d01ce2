use bon::Builder;
use serde::{Deserialize, Serialize};

/// Ask the backend to email a password reset link.
///
/// # Example
///
/// ```
/// use floodwatch_client::account::types::PasswordResetRequest;
///
/// let request = PasswordResetRequest::builder().email("operator@example.com").build();
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Builder)]
#[builder(on(String, into))]
pub struct PasswordResetRequest {
    pub email: String,
}

/// The backend's confirmation, meant to be shown to the user as-is.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct PasswordResetResponse {
    pub message: String,
}
