//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{
    delete_user_handler, get_profile_handler, get_user_handler, health,
    list_permissions_handler, list_roles_handler, list_users_handler, ready, register_handler,
    revoke_handler, token_handler, update_profile_handler,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::webauthn::{begin_registration, finish_registration};

/// Errors raised while building the router
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Invalid rate limit settings: {per_sec} req/s, burst {burst}")]
    InvalidRateLimit { per_sec: u64, burst: u32 },
}

/// Create the application router with custom configuration
pub fn create_router(state: AppState, config: &Config) -> Result<Router, RouterError> {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_kb * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let api = Router::new()
        .route("/register", post(register_handler))
        .route("/token", post(token_handler))
        .route("/token/revoke", post(revoke_handler))
        .route("/profile", get(get_profile_handler).put(update_profile_handler))
        .route("/users", get(list_users_handler))
        .route("/users/{id}", get(get_user_handler).delete(delete_user_handler))
        .route("/roles", get(list_roles_handler))
        .route("/permissions", get(list_permissions_handler))
        .route("/webauthn/register/begin", post(begin_registration))
        .route("/webauthn/register/finish", post(finish_registration))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state);

    // Base router with common layers
    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .layer(cors)
        .layer(body_limit)
        .layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    let router = if config.rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_sec)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or(RouterError::InvalidRateLimit {
                per_sec: config.rate_limit_per_sec,
                burst: config.rate_limit_burst,
            })?;

        tracing::info!(
            "Rate limiting: {} req/s (burst: {})",
            config.rate_limit_per_sec,
            config.rate_limit_burst
        );
        router.layer(GovernorLayer::new(Arc::new(governor_conf)))
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        router
    };

    // Outermost: assign x-request-id, echo it on the response, then trace
    Ok(router
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
