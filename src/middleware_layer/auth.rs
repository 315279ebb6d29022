use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// A middleware that requires a valid, current bearer token.
///
/// On success the `AuthenticatedUser` is inserted into the request
/// extensions; otherwise the wrapped handler is never run.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's `Response`, or the rejection response.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking bearer token...");

    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let verdict = state.validator.validate(authorization).await;

    match verdict {
        Ok(user) => {
            tracing::debug!("✅ User authenticated: {}", user.subject);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(rejection) => {
            tracing::warn!("❌ Request rejected: {}", rejection);
            rejection.into_response()
        }
    }
}
