// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Fitslot booking service.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text through [`PrometheusAdapter::render`], which
//! the gateway exposes on `/metrics`.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use fitslot_core::FitslotError;

pub use recording::{
    record_booking, record_callback, record_capacity_rejection, record_drift_corrections,
    record_reservation_latency, record_transition, record_verification, set_memory_heap,
    set_memory_resident,
};

/// Prometheus metrics adapter holding the exporter's render handle.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, FitslotError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            FitslotError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
