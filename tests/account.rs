#![allow(clippy::unwrap_used, reason = "tests can panic on unwrap")]

mod password_reset {
    use floodwatch_client::account::{
        Client,
        types::{PasswordResetRequest, PasswordResetResponse},
    };
    use floodwatch_client::error::{Kind, Status};
    use httpmock::{Method::POST, MockServer};
    use reqwest::StatusCode;
    use serde_json::json;

    fn request() -> PasswordResetRequest {
        PasswordResetRequest::builder()
            .email("operator@example.com")
            .build()
    }

    #[tokio::test]
    async fn request_password_reset_should_succeed() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/request-password-reset")
                .header("Content-Type", "application/json")
                .json_body(json!({ "email": "operator@example.com" }));
            then.status(StatusCode::OK).json_body(json!({
                "message": "If that email is registered, a reset link has been sent."
            }));
        });

        let response = client.request_password_reset(&request()).await?;

        let expected = PasswordResetResponse::builder()
            .message("If that email is registered, a reset link has been sent.")
            .build();
        assert_eq!(response, expected);
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn host_path_is_kept_as_prefix() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.url("/backend"))?;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/backend/api/auth/request-password-reset");
            then.status(StatusCode::OK)
                .json_body(json!({ "message": "sent" }));
        });

        client.request_password_reset(&request()).await?;
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn failure_surfaces_server_message() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/auth/request-password-reset");
            then.status(StatusCode::TOO_MANY_REQUESTS)
                .json_body(json!({ "message": "Too many reset requests, try again later" }));
        });

        let err = client.request_password_reset(&request()).await.unwrap_err();

        assert_eq!(err.kind(), Kind::Status);
        let status = err.downcast_ref::<Status>().unwrap();
        assert_eq!(status.status_code, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status.message, "Too many reset requests, try again later");
        assert_eq!(status.path, "/api/auth/request-password-reset");
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn failure_with_success_shaped_body_is_still_an_error() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        server.mock(|when, then| {
            when.method(POST).path("/api/auth/request-password-reset");
            then.status(StatusCode::BAD_REQUEST)
                .json_body(json!({ "message": "Reset link sent" }));
        });

        let err = client.request_password_reset(&request()).await.unwrap_err();

        let status = err.downcast_ref::<Status>().unwrap();
        assert_eq!(status.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(status.message, "Reset link sent");

        Ok(())
    }

    #[tokio::test]
    async fn failure_without_json_keeps_raw_text() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        server.mock(|when, then| {
            when.method(POST).path("/api/auth/request-password-reset");
            then.status(StatusCode::BAD_GATEWAY).body("upstream unavailable");
        });

        let err = client.request_password_reset(&request()).await.unwrap_err();

        let status = err.downcast_ref::<Status>().unwrap();
        assert_eq!(status.status_code, StatusCode::BAD_GATEWAY);
        assert_eq!(status.message, "upstream unavailable");

        Ok(())
    }
}
