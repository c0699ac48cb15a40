// Library exports for Inkwell
// This allows integration tests to build the router in-process

pub mod assets;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router with request tracing and, when an origin is
/// configured, credentialed CORS for the browser front-end.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .merge(routes::auth::router())
        .merge(routes::posts::router())
        .merge(routes::comments::router())
        .merge(routes::users::router());

    let router = match cors_layer(state.config.server.cors_origin.as_deref()) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    match HeaderValue::from_str(origin) {
        Ok(value) => Some(
            CorsLayer::new()
                .allow_origin(value)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        ),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
            None
        }
    }
}
