// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::FitslotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Booking, BookingStatus, GroupDrift, NewBooking, NewPaymentEvent, PaymentEvent, PaymentUpdate,
    Reservation, Schedule, Session, SessionGroup, SlotAvailability, TimeSlot,
};

/// Adapter for storage and persistence backends.
///
/// Implementations own the capacity invariant: [`reserve_booking`] and
/// [`transition_booking`] must check and write atomically so that no
/// interleaving of concurrent calls can leave a slot or group with more
/// active bookings than its capacity.
///
/// [`reserve_booking`]: StorageAdapter::reserve_booking
/// [`transition_booking`]: StorageAdapter::transition_booking
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), FitslotError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), FitslotError>;

    // --- Catalogue ---

    async fn create_schedule(&self, schedule: &Schedule) -> Result<(), FitslotError>;

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, FitslotError>;

    async fn create_session(&self, session: &Session) -> Result<(), FitslotError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, FitslotError>;

    async fn create_time_slot(&self, slot: &TimeSlot) -> Result<(), FitslotError>;

    async fn get_time_slot(&self, id: &str) -> Result<Option<TimeSlot>, FitslotError>;

    async fn list_time_slots(&self, schedule_id: &str) -> Result<Vec<TimeSlot>, FitslotError>;

    async fn create_group(&self, group: &SessionGroup) -> Result<(), FitslotError>;

    async fn get_group(&self, id: &str) -> Result<Option<SessionGroup>, FitslotError>;

    async fn list_groups(&self, schedule_id: &str) -> Result<Vec<SessionGroup>, FitslotError>;

    /// Changes a group's capacity; refused if it would drop below the active count.
    async fn set_group_capacity(
        &self,
        id: &str,
        capacity: u32,
    ) -> Result<SessionGroup, FitslotError>;

    // --- Bookings ---

    /// Atomically checks capacity and inserts a booking.
    async fn reserve_booking(&self, booking: &NewBooking) -> Result<Reservation, FitslotError>;

    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, FitslotError>;

    async fn find_booking_by_checkout(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Booking>, FitslotError>;

    /// Looks up the booking a payment receipt was applied to.
    async fn find_booking_by_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<Booking>, FitslotError>;

    async fn list_bookings_for_slot(
        &self,
        time_slot_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, FitslotError>;

    /// Moves a booking to `to`, optionally writing payment fields in the same transaction.
    ///
    /// Cancelling a paid booking without an explicit payment status marks it
    /// `refund_due`.
    async fn transition_booking(
        &self,
        id: &str,
        to: BookingStatus,
        payment: Option<PaymentUpdate>,
    ) -> Result<Booking, FitslotError>;

    /// Writes payment fields without touching the booking status.
    async fn update_payment(
        &self,
        id: &str,
        payment: &PaymentUpdate,
    ) -> Result<Booking, FitslotError>;

    /// Writes payment fields unless the payment is already `paid` or
    /// `refund_due`, in which case the stored booking is returned unchanged.
    ///
    /// The check and the write must be atomic with respect to
    /// [`transition_booking`](StorageAdapter::transition_booking).
    async fn update_payment_unless_settled(
        &self,
        id: &str,
        payment: &PaymentUpdate,
    ) -> Result<Booking, FitslotError>;

    async fn slot_availability(&self, time_slot_id: &str)
    -> Result<SlotAvailability, FitslotError>;

    /// Recomputes every group's `current_count` from its bookings.
    async fn reconcile_group_counts(&self) -> Result<Vec<GroupDrift>, FitslotError>;

    // --- Payment audit ---

    async fn record_payment_event(&self, event: &NewPaymentEvent) -> Result<i64, FitslotError>;

    async fn list_payment_events(&self, booking_id: &str)
    -> Result<Vec<PaymentEvent>, FitslotError>;
}
