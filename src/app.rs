use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use http::{header, HeaderValue, Method};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the application router.
///
/// # Arguments
///
/// * `state` - The application state.
///
/// # Returns
///
/// The `Router` serving every route with its layers.
pub fn router(state: AppState) -> Router {
    // Only the POST route is gated; other methods on /music keep their 405.
    let upload = post(handlers::music::upload_music)
        .route_layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_bearer,
        ));

    let routes = Router::new()
        .route("/music", get(handlers::music::list_music).merge(upload))
        .route(
            "/music/{language}/{filename}",
            get(handlers::music::stream_music),
        )
        .with_state(state.clone());

    routes
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(cors_layer(&state.config.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                }),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::RANGE,
        ])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ])
        .max_age(Duration::from_secs(86400))
}
