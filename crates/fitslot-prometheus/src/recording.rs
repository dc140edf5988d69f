// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these.
//! With no recorder installed every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Fitslot metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "fitslot_bookings_total",
        "Booking attempts by outcome (created, replayed, rejected, error)"
    );
    describe_counter!(
        "fitslot_capacity_rejections_total",
        "Booking attempts refused because a slot or group was full"
    );
    describe_counter!(
        "fitslot_booking_transitions_total",
        "Booking status changes by target status"
    );
    describe_counter!(
        "fitslot_payment_verifications_total",
        "Payment verification results by verdict"
    );
    describe_counter!(
        "fitslot_payment_callbacks_total",
        "Provider payment callbacks by outcome"
    );
    describe_counter!(
        "fitslot_group_drift_corrections_total",
        "Session groups whose stored count was corrected by reconciliation"
    );
    describe_histogram!(
        "fitslot_reservation_seconds",
        "Time spent reserving a seat, including the write transaction"
    );
    describe_gauge!("fitslot_memory_heap_bytes", "Heap bytes allocated (jemalloc)");
    describe_gauge!("fitslot_memory_resident_bytes", "Resident bytes (jemalloc)");
}

/// Record the outcome of a booking attempt.
pub fn record_booking(outcome: &'static str) {
    metrics::counter!("fitslot_bookings_total", "outcome" => outcome).increment(1);
}

/// Record a capacity rejection for `scope` ("time slot" or "session group").
pub fn record_capacity_rejection(scope: &str) {
    metrics::counter!("fitslot_capacity_rejections_total", "scope" => scope.replace(' ', "_"))
        .increment(1);
}

/// Record a booking status change.
pub fn record_transition(to: &str) {
    metrics::counter!("fitslot_booking_transitions_total", "to" => to.to_string()).increment(1);
}

/// Record a payment verification verdict.
pub fn record_verification(verdict: &'static str) {
    metrics::counter!("fitslot_payment_verifications_total", "verdict" => verdict).increment(1);
}

/// Record how a provider callback was applied.
pub fn record_callback(outcome: &'static str) {
    metrics::counter!("fitslot_payment_callbacks_total", "outcome" => outcome).increment(1);
}

/// Record groups corrected by a reconciliation pass.
pub fn record_drift_corrections(count: usize) {
    metrics::counter!("fitslot_group_drift_corrections_total").increment(count as u64);
}

/// Record reservation latency.
pub fn record_reservation_latency(seconds: f64) {
    metrics::histogram!("fitslot_reservation_seconds").record(seconds);
}

pub fn set_memory_heap(bytes: f64) {
    metrics::gauge!("fitslot_memory_heap_bytes").set(bytes);
}

pub fn set_memory_resident(bytes: f64) {
    metrics::gauge!("fitslot_memory_resident_bytes").set(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn helpers_reach_a_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_booking("created");
            record_booking("created");
            record_capacity_rejection("session group");
            record_verification("paid");
        });

        let text = handle.render();
        assert!(text.contains(r#"fitslot_bookings_total{outcome="created"} 2"#), "{text}");
        assert!(
            text.contains(r#"fitslot_capacity_rejections_total{scope="session_group"} 1"#),
            "{text}"
        );
        assert!(text.contains(r#"verdict="paid""#));
    }

    #[test]
    fn helpers_without_recorder_are_noops() {
        record_transition("cancelled");
        record_drift_corrections(3);
        record_reservation_latency(0.01);
    }
}
