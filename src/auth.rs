//! Session credentials presented to the telemetry backend.
//!
//! Credentials are issued by an external session provider; this crate never
//! mints or refreshes them, it only carries them into the connection handshake.

/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};

/// Opaque session token used to authenticate the real-time connection.
///
/// The value is redacted from `Debug` output. Two credentials are equal when
/// their secret values are byte-equal.
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
}

impl Credential {
    #[must_use]
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }

    /// Returns the token.
    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token)
            .finish()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
    }
}

impl Eq for Credential {}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let credential = Credential::new("super-secret-jwt");
        let rendered = format!("{credential:?}");

        assert!(!rendered.contains("super-secret-jwt"), "token leaked: {rendered}");
    }

    #[test]
    fn equality_compares_secret_values() {
        assert_eq!(Credential::new("a"), Credential::from("a"));
        assert_ne!(Credential::new("a"), Credential::from("b".to_owned()));
    }
}
