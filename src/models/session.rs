use serde::{Deserialize, Serialize};

/// The payload carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The subject identity, keying the credential store.
    pub email: String,
    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

/// The subject a request was authorized for.
///
/// Inserted into the request extensions by the session gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject: String,
}
