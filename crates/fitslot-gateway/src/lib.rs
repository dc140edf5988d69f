// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the booking service.
//!
//! Exposes bookings, payments and catalogue administration as a JSON REST
//! API, plus the public M-Pesa callback, health and metrics endpoints.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

use std::sync::Arc;

use fitslot_booking::BookingService;
use fitslot_core::FitslotError;
use tokio_util::sync::CancellationToken;

pub use crate::auth::AuthConfig;
pub use crate::error::{ApiError, ApiJson, ErrorResponse};
pub use crate::server::{GatewayState, HealthState, ServerConfig, build_router};

/// Gateway configuration.
///
/// Mirrors `GatewayConfig` from `fitslot-config` to avoid a dependency on
/// the config crate from the gateway crate.
#[derive(Clone)]
pub struct GatewayOptions {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Bearer token for `/v1` routes.
    pub bearer_token: Option<String>,
    /// Optional Prometheus metrics render function for /metrics endpoint.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl std::fmt::Debug for GatewayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("prometheus_render", &self.prometheus_render.is_some())
            .finish()
    }
}

/// The HTTP front of a [`BookingService`].
pub struct Gateway {
    config: ServerConfig,
    state: GatewayState,
}

impl Gateway {
    pub fn new(options: GatewayOptions, service: Arc<BookingService>) -> Self {
        if options.bearer_token.is_none() {
            tracing::warn!("gateway.bearer_token is not set; all /v1 routes will return 401");
        }
        let state = GatewayState {
            service,
            auth: AuthConfig {
                bearer_token: options.bearer_token,
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: options.prometheus_render,
            },
        };
        Self {
            config: ServerConfig {
                host: options.host,
                port: options.port,
            },
            state,
        }
    }

    /// The router this gateway serves, for embedding or in-process tests.
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), FitslotError> {
        server::start_server(&self.config, self.state, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_debug_redacts_token() {
        let options = GatewayOptions {
            host: "0.0.0.0".into(),
            port: 3080,
            bearer_token: Some("hunter2".into()),
            prometheus_render: None,
        };
        let debug = format!("{options:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[redacted]"));
    }
}
