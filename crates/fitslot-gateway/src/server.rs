// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use fitslot_booking::BookingService;
use fitslot_core::FitslotError;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Request bodies are small JSON documents; Daraja callbacks included.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<BookingService>,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Health state for unauthenticated endpoints.
    pub health: HealthState,
}

/// Gateway server configuration (mirrors GatewayConfig from fitslot-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the full application router.
///
/// - GET /health, GET /metrics, POST /v1/mpesa/callback (public)
/// - everything else under /v1 (bearer auth)
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    // Unauthenticated public routes (health + metrics for systemd and Prometheus).
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .route("/v1/mpesa/callback", post(handlers::post_mpesa_callback))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/bookings", post(handlers::post_booking))
        .route("/v1/bookings/{id}", get(handlers::get_booking))
        .route("/v1/bookings/{id}/cancel", post(handlers::cancel_booking))
        .route("/v1/bookings/{id}/missed", post(handlers::mark_missed))
        .route("/v1/bookings/{id}/complete", post(handlers::mark_completed))
        .route("/v1/bookings/{id}/pay", post(handlers::pay_booking))
        .route("/v1/bookings/{id}/confirm", post(handlers::confirm_booking))
        .route(
            "/v1/bookings/{id}/payments",
            get(handlers::get_payment_events),
        )
        .route(
            "/v1/slots/{id}/availability",
            get(handlers::get_availability),
        )
        .route("/v1/slots/{id}/bookings", get(handlers::get_slot_bookings))
        .route("/v1/slots", post(handlers::post_time_slot))
        .route("/v1/schedules", post(handlers::post_schedule))
        .route(
            "/v1/schedules/{id}/slots",
            get(handlers::get_schedule_slots),
        )
        .route(
            "/v1/schedules/{id}/groups",
            get(handlers::get_schedule_groups),
        )
        .route("/v1/sessions", post(handlers::post_session))
        .route("/v1/groups", post(handlers::post_group))
        .route(
            "/v1/groups/{id}/capacity",
            put(handlers::put_group_capacity),
        )
        .route("/v1/admin/reconcile", post(handlers::post_reconcile))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP server.
///
/// Serves until `cancel` fires, then lets in-flight requests finish.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), FitslotError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FitslotError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| FitslotError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3080,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("3080"));
    }
}
