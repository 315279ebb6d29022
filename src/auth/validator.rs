//! Two-phase bearer token validation.
//!
//! A token is accepted only when it verifies under the service key **and**
//! equals the token currently stored for its subject. Issuing a newer token
//! for the same subject therefore revokes every older one, expired or not.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::{
    auth::store::CredentialStore,
    error::{json_response, message_body},
    models::session::{AuthenticatedUser, Claims},
};

const BEARER_PREFIX: &str = "Bearer ";
const DEFAULT_VALIDATION_LEEWAY: u64 = 30;

/// Why a request was not authorized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization: Bearer` header.
    #[error("No token provided")]
    NoToken,
    /// Bad signature, malformed, expired, or superseded token.
    #[error("Invalid token")]
    InvalidToken,
    /// Verification failed for a reason other than the token itself.
    #[error("Server error")]
    ServerError,
    /// The session lookup failed.
    #[error("Database error")]
    StoreUnavailable,
}

impl AuthRejection {
    /// The status code the gate answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthRejection::NoToken => StatusCode::FORBIDDEN,
            AuthRejection::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthRejection::ServerError | AuthRejection::StoreUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        json_response(self.status(), message_body(&self.to_string()))
    }
}

/// Validates bearer tokens against the signing key and the credential store.
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    store: Arc<dyn CredentialStore>,
}

impl TokenValidator {
    /// Creates a new `TokenValidator` for HS256 tokens.
    ///
    /// # Arguments
    ///
    /// * `secret` - The shared signing secret.
    /// * `store` - The credential store holding the current token per subject.
    pub fn new(secret: &[u8], store: Arc<dyn CredentialStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = DEFAULT_VALIDATION_LEEWAY;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            store,
        }
    }

    /// Validates the raw `Authorization` header value.
    ///
    /// # Arguments
    ///
    /// * `header` - The header value, if present.
    ///
    /// # Returns
    ///
    /// The authorized subject, or the reason for rejection.
    pub async fn validate(
        &self,
        header: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthRejection> {
        let token = header
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthRejection::NoToken)?;

        let claims = self.verify(token)?;

        let stored = self
            .store
            .lookup_session_token(&claims.email)
            .await
            .map_err(|e| {
                tracing::error!("❌ Session lookup failed for {}: {}", claims.email, e);
                AuthRejection::StoreUnavailable
            })?;

        let Some(stored) = stored else {
            tracing::warn!("❌ No active session for {}", claims.email);
            return Err(AuthRejection::InvalidToken);
        };

        if !bool::from(stored.as_bytes().ct_eq(token.as_bytes())) {
            tracing::warn!("❌ Superseded token presented for {}", claims.email);
            return Err(AuthRejection::InvalidToken);
        }

        Ok(AuthenticatedUser {
            subject: claims.email,
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthRejection> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::MissingRequiredClaim(_)
                | ErrorKind::ExpiredSignature
                | ErrorKind::ImmatureSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidSubject
                | ErrorKind::MissingAlgorithm
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => {
                    tracing::warn!("❌ Token rejected: {}", e);
                    Err(AuthRejection::InvalidToken)
                }
                _ => {
                    tracing::error!("❌ Token verification error: {}", e);
                    Err(AuthRejection::ServerError)
                }
            },
        }
    }
}
