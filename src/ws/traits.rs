//! Core traits for generic real-time connection infrastructure.

use secrecy::ExposeSecret as _;
use serde_json::{Map, Value};

use crate::auth::Credential;

/// Event parser trait for converting decoded Socket.IO events into messages.
///
/// The transport takes care of framing; implementors only see the event name
/// and its JSON arguments.
///
/// # Example
///
/// ```ignore
/// pub struct NameOnly;
///
/// impl EventParser<String> for NameOnly {
///     fn parse(&self, name: &str, _args: Vec<Value>) -> crate::Result<Option<String>> {
///         Ok(Some(name.to_owned()))
///     }
/// }
/// ```
pub trait EventParser<M>: Send + Sync + 'static {
    /// Parse one inbound event.
    ///
    /// May return `None` if the event is filtered out.
    fn parse(&self, name: &str, args: Vec<Value>) -> crate::Result<Option<M>>;
}

/// Builds the authentication payload carried by the Socket.IO `CONNECT` packet.
pub trait HandshakeAuth {
    fn auth_payload(&self) -> Value;
}

impl HandshakeAuth for Option<&Credential> {
    /// `{"token": "<value>"}`, or `{}` when there is no credential.
    fn auth_payload(&self) -> Value {
        let mut auth = Map::new();
        if let Some(credential) = self {
            auth.insert(
                "token".to_owned(),
                Value::String(credential.token().expose_secret().to_owned()),
            );
        }
        Value::Object(auth)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn auth_payload_carries_token() {
        let credential = Credential::new("jwt-123");

        assert_eq!(Some(&credential).auth_payload(), json!({"token": "jwt-123"}));
    }

    #[test]
    fn auth_payload_omits_absent_token() {
        let credential: Option<&Credential> = None;

        assert_eq!(credential.auth_payload(), json!({}));
    }
}
