// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The booking service: catalogue setup, reservations, and lifecycle changes.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use fitslot_config::model::BookingConfig;
use fitslot_core::types::{
    Booking, BookingStatus, GroupDrift, NewBooking, PaymentEvent, PaymentStatus, Reservation,
    Schedule, Session, SessionGroup, SlotAvailability, TimeSlot,
};
use fitslot_core::{FitslotError, PaymentVerifier, StorageAdapter};

use crate::requests::{NewGroup, NewSchedule, NewSession, NewTimeSlot};
use crate::telemetry;
use crate::validation::{normalize_new_booking, required_text, validate_date, validate_time_range};

/// Coordinates storage and payments for every booking operation.
///
/// Capacity decisions are made inside storage; this layer never reads a
/// count and writes based on it. Payment calls happen outside storage
/// transactions and their results are applied afterwards.
pub struct BookingService {
    pub(crate) storage: Arc<dyn StorageAdapter>,
    pub(crate) payments: Option<Arc<dyn PaymentVerifier>>,
    pub(crate) policy: BookingConfig,
    pub(crate) studio_name: String,
}

impl BookingService {
    /// Create a service without a payment provider.
    pub fn new(storage: Arc<dyn StorageAdapter>, policy: BookingConfig) -> Self {
        Self {
            storage,
            payments: None,
            policy,
            studio_name: "fitslot".to_string(),
        }
    }

    /// Attach the provider used to prompt and verify payments.
    pub fn with_payments(mut self, verifier: Arc<dyn PaymentVerifier>) -> Self {
        self.payments = Some(verifier);
        self
    }

    /// Studio name shown on payment prompts.
    pub fn with_studio_name(mut self, name: impl Into<String>) -> Self {
        self.studio_name = name.into();
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn payments_enabled(&self) -> bool {
        self.payments.is_some()
    }

    /// The attached payment provider, if any.
    pub fn verifier(&self) -> Option<&Arc<dyn PaymentVerifier>> {
        self.payments.as_ref()
    }

    pub(crate) fn payments(&self) -> Result<&Arc<dyn PaymentVerifier>, FitslotError> {
        self.payments.as_ref().ok_or_else(|| FitslotError::Payment {
            message: "payments are not configured".to_string(),
            source: None,
        })
    }

    // --- Catalogue ---

    pub async fn create_schedule(&self, request: NewSchedule) -> Result<Schedule, FitslotError> {
        validate_date(&request.date)?;
        let schedule = Schedule {
            id: new_id(),
            date: request.date,
            title: request
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            created_at: now(),
        };
        self.storage.create_schedule(&schedule).await?;
        info!(schedule_id = %schedule.id, date = %schedule.date, "schedule created");
        Ok(schedule)
    }

    pub async fn create_session(&self, request: NewSession) -> Result<Session, FitslotError> {
        let session = Session {
            id: new_id(),
            name: required_text("session name", &request.name)?,
            description: request.description.filter(|d| !d.trim().is_empty()),
            created_at: now(),
        };
        self.storage.create_session(&session).await?;
        info!(session_id = %session.id, name = %session.name, "session created");
        Ok(session)
    }

    /// Create a slot; capacity defaults to `booking.default_slot_capacity`.
    pub async fn create_time_slot(&self, request: NewTimeSlot) -> Result<TimeSlot, FitslotError> {
        validate_time_range(&request.start_time, &request.end_time)?;
        let capacity = positive_capacity(request.capacity, self.policy.default_slot_capacity)?;
        let slot = TimeSlot {
            id: new_id(),
            schedule_id: request.schedule_id,
            session_id: request.session_id,
            start_time: request.start_time,
            end_time: request.end_time,
            capacity,
            price_kes: request.price_kes,
            created_at: now(),
        };
        self.storage.create_time_slot(&slot).await?;
        info!(
            slot_id = %slot.id,
            schedule_id = %slot.schedule_id,
            start = %slot.start_time,
            capacity,
            "time slot created"
        );
        Ok(slot)
    }

    /// Create a group; capacity defaults to `booking.default_group_capacity`.
    pub async fn create_group(&self, request: NewGroup) -> Result<SessionGroup, FitslotError> {
        let capacity = positive_capacity(request.capacity, self.policy.default_group_capacity)?;
        let created_at = now();
        let group = SessionGroup {
            id: new_id(),
            schedule_id: request.schedule_id,
            name: required_text("group name", &request.name)?,
            capacity,
            current_count: 0,
            created_at: created_at.clone(),
            updated_at: created_at,
        };
        self.storage.create_group(&group).await?;
        info!(group_id = %group.id, schedule_id = %group.schedule_id, capacity, "group created");
        Ok(group)
    }

    /// Resize a group. Shrinking below its active bookings is refused.
    pub async fn set_group_capacity(
        &self,
        group_id: &str,
        capacity: u32,
    ) -> Result<SessionGroup, FitslotError> {
        let group = self.storage.set_group_capacity(group_id, capacity).await?;
        info!(group_id, capacity, active = group.current_count, "group capacity changed");
        Ok(group)
    }

    pub async fn time_slot(&self, slot_id: &str) -> Result<TimeSlot, FitslotError> {
        self.storage
            .get_time_slot(slot_id)
            .await?
            .ok_or_else(|| FitslotError::not_found("time slot", slot_id))
    }

    pub async fn list_time_slots(&self, schedule_id: &str) -> Result<Vec<TimeSlot>, FitslotError> {
        self.require_schedule(schedule_id).await?;
        self.storage.list_time_slots(schedule_id).await
    }

    pub async fn list_groups(&self, schedule_id: &str) -> Result<Vec<SessionGroup>, FitslotError> {
        self.require_schedule(schedule_id).await?;
        self.storage.list_groups(schedule_id).await
    }

    async fn require_schedule(&self, schedule_id: &str) -> Result<Schedule, FitslotError> {
        self.storage
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| FitslotError::not_found("schedule", schedule_id))
    }

    // --- Bookings ---

    /// Reserve a seat. Fails with `CapacityExceeded` when the slot or the
    /// chosen group is full, and with `DuplicateBooking` when the holder
    /// already has an active booking in the slot.
    #[instrument(skip_all, fields(slot_id = %request.time_slot_id))]
    pub async fn create_booking(&self, request: NewBooking) -> Result<Reservation, FitslotError> {
        let request = match normalize_new_booking(request, self.policy.allow_guest_bookings) {
            Ok(request) => request,
            Err(e) => {
                telemetry::record_booking("invalid");
                return Err(e);
            }
        };

        let started = Instant::now();
        let result = self.storage.reserve_booking(&request).await;
        telemetry::record_reservation_latency(started.elapsed().as_secs_f64());

        match &result {
            Ok(Reservation::Created(booking)) => {
                telemetry::record_booking("created");
                info!(booking_id = %booking.id, group_id = ?booking.group_id, "booking created");
            }
            Ok(Reservation::Replayed(booking)) => {
                telemetry::record_booking("replayed");
                debug!(booking_id = %booking.id, "idempotent booking replayed");
            }
            Err(FitslotError::CapacityExceeded { scope, id, capacity }) => {
                telemetry::record_booking("full");
                telemetry::record_capacity_rejection(&scope.to_string());
                info!(%scope, id = %id, capacity, "booking rejected: full");
            }
            Err(FitslotError::DuplicateBooking { existing_id }) => {
                telemetry::record_booking("duplicate");
                debug!(existing_id = %existing_id, "booking rejected: holder already booked");
            }
            Err(e) if e.is_client_error() => {
                telemetry::record_booking("rejected");
                debug!(error = %e, "booking rejected");
            }
            Err(e) => {
                telemetry::record_booking("error");
                warn!(error = %e, "booking failed");
            }
        }
        result
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, FitslotError> {
        self.storage
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| FitslotError::not_found("booking", booking_id))
    }

    pub async fn list_bookings(
        &self,
        slot_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, FitslotError> {
        self.time_slot(slot_id).await?;
        self.storage.list_bookings_for_slot(slot_id, status).await
    }

    /// Payment audit trail of a booking, oldest first.
    pub async fn payment_events(&self, booking_id: &str) -> Result<Vec<PaymentEvent>, FitslotError> {
        self.get_booking(booking_id).await?;
        self.storage.list_payment_events(booking_id).await
    }

    /// Cancel a booking and release its seat. A paid booking becomes `refund_due`.
    pub async fn cancel_booking(&self, booking_id: &str) -> Result<Booking, FitslotError> {
        let booking = self.transition(booking_id, BookingStatus::Cancelled).await?;
        if booking.payment_status == PaymentStatus::RefundDue {
            warn!(booking_id, reference = ?booking.payment_reference, "paid booking cancelled; refund due");
        }
        Ok(booking)
    }

    /// Record a no-show. The seat is released.
    pub async fn mark_missed(&self, booking_id: &str) -> Result<Booking, FitslotError> {
        self.transition(booking_id, BookingStatus::Missed).await
    }

    /// Mark a booking completed without a payment, e.g. cash at the door.
    pub async fn mark_completed(&self, booking_id: &str) -> Result<Booking, FitslotError> {
        self.transition(booking_id, BookingStatus::Completed).await
    }

    async fn transition(&self, booking_id: &str, to: BookingStatus) -> Result<Booking, FitslotError> {
        let booking = self.storage.transition_booking(booking_id, to, None).await?;
        telemetry::record_transition(&to.to_string());
        info!(booking_id, status = %to, "booking status changed");
        Ok(booking)
    }

    // --- Capacity views ---

    pub async fn availability(&self, slot_id: &str) -> Result<SlotAvailability, FitslotError> {
        self.storage.slot_availability(slot_id).await
    }

    /// Recompute stored group counts from bookings and report what was corrected.
    pub async fn reconcile(&self) -> Result<Vec<GroupDrift>, FitslotError> {
        let drift = self.storage.reconcile_group_counts().await?;
        telemetry::record_drift_corrections(drift.len());
        if drift.is_empty() {
            debug!("group counts consistent");
        } else {
            warn!(groups = drift.len(), "group counts corrected");
        }
        Ok(drift)
    }
}

fn positive_capacity(requested: Option<u32>, default: u32) -> Result<u32, FitslotError> {
    match requested.unwrap_or(default) {
        0 => Err(FitslotError::Validation(
            "capacity must be at least 1".to_string(),
        )),
        n => Ok(n),
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
