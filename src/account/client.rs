use reqwest::{
    Client as ReqwestClient, Method,
    header::{HeaderMap, HeaderValue},
};
use url::Url;

use super::types::{PasswordResetRequest, PasswordResetResponse};
use crate::Result;
use crate::error::Error;

/// Client for the account endpoints of the backend HTTP API.
#[derive(Clone, Debug)]
pub struct Client {
    host: Url,
    client: ReqwestClient,
}

impl Client {
    /// Creates a new account API client for `host`.
    ///
    /// A path on `host` is kept as a prefix, e.g. `https://host/backend`
    /// sends requests to `https://host/backend/api/...`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host URL is invalid or the HTTP client fails to build.
    pub fn new(host: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();

        headers.insert("User-Agent", HeaderValue::from_static("floodwatch_client"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = ReqwestClient::builder().default_headers(headers).build()?;

        let mut host = Url::parse(host.trim())?;
        if !host.path().ends_with('/') {
            let path = format!("{}/", host.path());
            host.set_path(&path);
        }

        Ok(Self { host, client })
    }

    /// Creates a client for the host named by [`API_URL_VAR`](crate::API_URL_VAR).
    ///
    /// # Errors
    ///
    /// Returns a [`Configuration`](crate::error::Kind::Configuration) error if
    /// the variable is unset or empty.
    pub fn from_env() -> Result<Client> {
        let host = crate::non_empty_var(crate::API_URL_VAR)?;
        Self::new(&host)
    }

    /// Returns the host URL for the client.
    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    /// Request a password reset email.
    ///
    /// The backend answers with a message for the user on success and on
    /// failure. A non-2xx status is an error of kind
    /// [`Status`](crate::error::Kind::Status) whose
    /// [`message`](crate::error::Status::message) is that text, whatever the
    /// body says.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty email without contacting the
    /// backend.
    pub async fn request_password_reset(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<PasswordResetResponse> {
        if request.email.trim().is_empty() {
            return Err(Error::validation("email must not be empty"));
        }

        let request = self
            .client
            .request(
                Method::POST,
                self.host.join("api/auth/request-password-reset")?,
            )
            .json(request)
            .build()?;

        crate::request(&self.client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_gets_trailing_slash() {
        let client = Client::new("https://api.floodwatch.example/backend").unwrap();

        assert_eq!(
            client.host().join("api/auth/request-password-reset").unwrap().as_str(),
            "https://api.floodwatch.example/backend/api/auth/request-password-reset"
        );
    }

    #[test]
    fn invalid_host_is_rejected() {
        let error = Client::new("api.floodwatch.example").unwrap_err();

        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }

    #[tokio::test]
    async fn empty_email_is_rejected_locally() {
        let client = Client::new("http://127.0.0.1:9").unwrap();
        let request = PasswordResetRequest::builder().email("  ").build();

        let error = client.request_password_reset(&request).await.unwrap_err();

        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }
}
