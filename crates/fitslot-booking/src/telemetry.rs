// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric hooks. They compile to nothing without the `prometheus` feature.

#[cfg(feature = "prometheus")]
pub(crate) use fitslot_prometheus::{
    record_booking, record_callback, record_capacity_rejection, record_drift_corrections,
    record_reservation_latency, record_transition, record_verification,
};

#[cfg(not(feature = "prometheus"))]
pub(crate) use noop::*;

#[cfg(not(feature = "prometheus"))]
mod noop {
    pub(crate) fn record_booking(_outcome: &'static str) {}
    pub(crate) fn record_capacity_rejection(_scope: &str) {}
    pub(crate) fn record_transition(_to: &str) {}
    pub(crate) fn record_verification(_verdict: &'static str) {}
    pub(crate) fn record_callback(_outcome: &'static str) {}
    pub(crate) fn record_drift_corrections(_count: usize) {}
    pub(crate) fn record_reservation_latency(_seconds: f64) {}
}
