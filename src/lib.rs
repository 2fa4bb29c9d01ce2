#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod account;
pub mod auth;
pub mod error;
pub(crate) mod serde_helpers;
pub mod telemetry;
pub mod types;
pub mod ws;

use reqwest::{Request, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable holding the real-time telemetry endpoint.
pub const SOCKET_URL_VAR: &str = "FLOODWATCH_SOCKET_URL";

/// Environment variable holding the backend HTTP API base URL.
pub const API_URL_VAR: &str = "FLOODWATCH_API_URL";

/// Read the telemetry endpoint from [`SOCKET_URL_VAR`].
///
/// # Errors
///
/// Returns a [`Configuration`](error::Kind::Configuration) error when the
/// variable is unset or blank, so callers never attempt a connection without
/// an endpoint.
pub fn endpoint_from_env() -> Result<String> {
    non_empty_var(SOCKET_URL_VAR)
}

pub(crate) fn non_empty_var(name: &'static str) -> Result<String> {
    non_empty(name, std::env::var(name).ok())
}

fn non_empty(name: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(Error::missing_config(name)),
    }
}

/// Error body returned by the backend alongside non-2xx statuses.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "debug",
        skip(client, request),
        fields(
            method = %request.method(),
            path = request.url().path(),
            status_code
        )
    )
)]
async fn request<Response: DeserializeOwned>(
    client: &reqwest::Client,
    request: Request,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    let response = client.execute(request).await?;
    let status_code = response.status();

    #[cfg(feature = "tracing")]
    tracing::Span::current().record("status_code", status_code.as_u16());

    if !status_code.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text).map_or(text, |body| body.message);

        #[cfg(feature = "tracing")]
        tracing::warn!(
            status = %status_code,
            method = %method,
            path = %path,
            message = %message,
            "API request failed"
        );

        return Err(Error::status(status_code, method, path, message));
    }

    let json_value = response.json::<serde_json::Value>().await?;
    let response_data: Option<Response> = serde_helpers::deserialize_with_warnings(json_value)?;

    if let Some(response) = response_data {
        Ok(response)
    } else {
        #[cfg(feature = "tracing")]
        tracing::warn!(method = %method, path = %path, "API returned an empty body");
        Err(Error::status(
            StatusCode::NOT_FOUND,
            method,
            path,
            "Unable to find requested resource",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn non_empty_trims_value() {
        let value = non_empty(SOCKET_URL_VAR, Some(" https://api.floodwatch.example ".to_owned()));

        assert_eq!(value.unwrap(), "https://api.floodwatch.example");
    }

    #[test]
    fn missing_or_blank_value_is_configuration_error() {
        for value in [None, Some(String::new()), Some("  ".to_owned())] {
            let error = non_empty(SOCKET_URL_VAR, value).unwrap_err();

            assert_eq!(error.kind(), Kind::Configuration);
            assert!(
                error.to_string().contains(SOCKET_URL_VAR),
                "error should name the variable"
            );
        }
    }
}
