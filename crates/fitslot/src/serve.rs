// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fitslot serve` command implementation.
//!
//! Opens SQLite storage, attaches the M-Pesa verifier when enabled, installs
//! the Prometheus recorder, and serves the HTTP gateway until SIGINT/SIGTERM.

use std::sync::Arc;

use fitslot_booking::BookingService;
use fitslot_config::model::FitslotConfig;
use fitslot_core::{FitslotError, PluginAdapter, StorageAdapter};
use tracing::{debug, info, warn};

#[cfg(feature = "sqlite")]
use fitslot_storage::SqliteStorage;

#[cfg(feature = "gateway")]
use fitslot_gateway::{Gateway, GatewayOptions};

use crate::shutdown;

/// Open and migrate the configured database.
#[cfg(feature = "sqlite")]
pub async fn open_storage(config: &FitslotConfig) -> Result<Arc<SqliteStorage>, FitslotError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "sqlite"))]
compile_error!("fitslot requires the 'sqlite' feature for storage");

/// Assemble the booking service from config: storage, policy, and payments.
pub async fn build_service(config: &FitslotConfig) -> Result<BookingService, FitslotError> {
    let storage = open_storage(config).await?;
    let service = BookingService::new(storage, config.booking.clone())
        .with_studio_name(config.service.name.clone());

    #[cfg(feature = "mpesa")]
    let service = if config.mpesa.enabled {
        let client = fitslot_mpesa::MpesaClient::from_config(&config.mpesa)?;
        service.with_payments(Arc::new(client))
    } else {
        info!("M-Pesa payments disabled by configuration");
        service
    };

    #[cfg(not(feature = "mpesa"))]
    if config.mpesa.enabled {
        warn!("mpesa.enabled is set but this build has no M-Pesa support");
    }

    Ok(service)
}

/// Runs the `fitslot serve` command.
pub async fn run_serve(config: FitslotConfig) -> Result<(), FitslotError> {
    init_tracing(&config.service.log_level);

    info!(
        name = config.service.name.as_str(),
        database = config.storage.database_path.as_str(),
        "starting fitslot serve"
    );

    let service = Arc::new(build_service(&config).await?);

    // Initialize Prometheus metrics (if enabled and compiled in).
    #[cfg(feature = "prometheus")]
    let prometheus_adapter = if config.prometheus.enabled {
        match fitslot_prometheus::PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(adapter)
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    // Build Prometheus render function for gateway /metrics endpoint.
    #[cfg(feature = "prometheus")]
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus_adapter.as_ref().map(|adapter| {
            let handle = adapter.handle().clone();
            Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });
    #[cfg(not(feature = "prometheus"))]
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> = None;

    // Drift left by a crash between booking writes is corrected before serving.
    let drift = service.reconcile().await?;
    if !drift.is_empty() {
        info!(groups = drift.len(), "corrected group counts at startup");
    }

    let cancel = shutdown::install_signal_handler();

    {
        let mem_cancel = cancel.clone();
        tokio::spawn(async move {
            memory_monitor(mem_cancel).await;
        });
    }

    #[cfg(feature = "gateway")]
    {
        if config.gateway.enabled {
            // Fail-closed: refuse to start a gateway nobody can authenticate to.
            if config.gateway.bearer_token.is_none() {
                return Err(FitslotError::Config(
                    "gateway enabled but no authentication configured. Set gateway.bearer_token"
                        .to_string(),
                ));
            }
            let gateway = Gateway::new(
                GatewayOptions {
                    host: config.gateway.host.clone(),
                    port: config.gateway.port,
                    bearer_token: config.gateway.bearer_token.clone(),
                    prometheus_render,
                },
                service.clone(),
            );
            info!(
                host = config.gateway.host.as_str(),
                port = config.gateway.port,
                "gateway starting"
            );
            gateway.run(cancel.clone()).await?;
        } else {
            info!("gateway disabled by configuration; waiting for shutdown signal");
            cancel.cancelled().await;
        }
    }

    #[cfg(not(feature = "gateway"))]
    {
        let _ = prometheus_render;
        warn!("this build has no HTTP gateway; waiting for shutdown signal");
        cancel.cancelled().await;
    }

    // The gateway can also stop on its own; make sure background tasks follow.
    cancel.cancel();

    if let Some(verifier) = service.verifier() {
        if let Err(e) = verifier.shutdown().await {
            warn!(error = %e, "payment verifier shutdown failed");
        }
    }
    service.storage().close().await?;

    info!("fitslot serve shutdown complete");
    Ok(())
}

/// Background task that exports jemalloc heap and resident sizes every 5 seconds.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(cancel: tokio_util::sync::CancellationToken) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Stats are cached until the epoch advances.
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);

                #[cfg(feature = "prometheus")]
                {
                    fitslot_prometheus::set_memory_heap(allocated as f64);
                    fitslot_prometheus::set_memory_resident(resident as f64);
                }
                #[cfg(not(feature = "prometheus"))]
                let _ = (allocated, resident);
            }
            _ = cancel.cancelled() => {
                debug!("memory monitor shutting down");
                break;
            }
        }
    }
}

/// Stub memory monitor for MSVC (no jemalloc).
#[cfg(target_env = "msvc")]
async fn memory_monitor(cancel: tokio_util::sync::CancellationToken) {
    cancel.cancelled().await;
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` overrides the configured level when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fitslot={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> FitslotConfig {
        let mut config = FitslotConfig::default();
        config.storage.database_path = dir.path().join("serve.db").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn build_service_without_payments() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = config_in(&dir);

        let service = build_service(&config).await.unwrap();
        assert!(!service.payments_enabled());
        assert_eq!(
            service.storage().health_check().await.unwrap(),
            fitslot_core::HealthStatus::Healthy
        );
        service.storage().close().await.unwrap();
    }

    #[cfg(feature = "mpesa")]
    #[tokio::test]
    async fn build_service_rejects_incomplete_mpesa_credentials() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.mpesa.enabled = true;

        let err = build_service(&config).await.err().unwrap();
        assert!(matches!(err, FitslotError::Config(_)));
    }
}
