// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by storage, the booking service, and adapters.
//!
//! Timestamps are ISO 8601 strings in UTC, dates are `YYYY-MM-DD`, and
//! slot times are `HH:MM` in studio-local time.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter plugged into the service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Payment,
}

/// Lifecycle status of a booking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Cancelled,
    Missed,
    Completed,
}

impl BookingStatus {
    /// Statuses that occupy a seat.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Booked, BookingStatus::Completed];

    /// Whether a booking in this status counts against capacity.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Booked | Self::Completed)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Missed)
    }

    /// Whether `self -> next` is an allowed status change.
    ///
    /// Inactive bookings are never reactivated, so capacity is only ever
    /// consumed at creation time.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Booked, Completed) | (Booked, Cancelled) | (Booked, Missed) | (Completed, Cancelled)
        )
    }
}

/// Payment state of a booking, tracked separately from its lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    /// Money arrived that the booking cannot keep: it lost its seat, or it
    /// was already paid.
    RefundDue,
}

/// Which capacity bound a booking attempt ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityScope {
    #[strum(serialize = "time slot")]
    TimeSlot,
    #[strum(serialize = "session group")]
    Group,
}

/// A calendar date on which sessions run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub title: Option<String>,
    pub created_at: String,
}

/// A class type offered by the studio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// A bookable (schedule, session, start, end) unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub schedule_id: String,
    pub session_id: String,
    /// `HH:MM`.
    pub start_time: String,
    /// `HH:MM`, strictly after `start_time`.
    pub end_time: String,
    /// Maximum number of active bookings in this slot.
    pub capacity: u32,
    /// Price in whole Kenyan shillings.
    pub price_kes: u32,
    pub created_at: String,
}

/// A capacity-bounded partition of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGroup {
    pub id: String,
    pub schedule_id: String,
    pub name: String,
    pub capacity: u32,
    /// Active bookings in this group, maintained by the storage layer.
    pub current_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// Contact details for a booking made without an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Who a booking is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingParty {
    Registered { user_id: String },
    Guest(GuestContact),
}

impl BookingParty {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Registered { user_id } => Some(user_id),
            Self::Guest(_) => None,
        }
    }

    pub fn guest(&self) -> Option<&GuestContact> {
        match self {
            Self::Registered { .. } => None,
            Self::Guest(contact) => Some(contact),
        }
    }
}

/// A reservation of one seat in a time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub time_slot_id: String,
    pub group_id: Option<String>,
    pub party: BookingParty,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// M-Pesa receipt number once the payment is verified.
    pub payment_reference: Option<String>,
    /// STK push handle used to correlate asynchronous callbacks.
    pub checkout_request_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A booking request as submitted by a user or guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub time_slot_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    pub party: BookingParty,
    /// Client-chosen key; resubmitting with the same key returns the first booking.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Outcome of a reservation attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// A new seat was taken.
    Created(Booking),
    /// The idempotency key matched an earlier booking; nothing changed.
    Replayed(Booking),
}

impl Reservation {
    pub fn booking(&self) -> &Booking {
        match self {
            Self::Created(b) | Self::Replayed(b) => b,
        }
    }

    pub fn into_booking(self) -> Booking {
        match self {
            Self::Created(b) | Self::Replayed(b) => b,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }
}

/// Payment fields to write alongside (or instead of) a status change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentUpdate {
    pub status: Option<PaymentStatus>,
    pub reference: Option<String>,
    pub checkout_request_id: Option<String>,
}

/// Seats left in a time slot and in each group of its schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub time_slot_id: String,
    pub capacity: u32,
    pub active: u32,
    pub remaining: u32,
    pub groups: Vec<GroupAvailability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAvailability {
    pub group_id: String,
    pub name: String,
    pub capacity: u32,
    pub current_count: u32,
    pub remaining: u32,
}

/// A group whose stored `current_count` disagreed with its bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDrift {
    pub group_id: String,
    pub recorded: u32,
    pub actual: u32,
}

/// What happened in a payment audit row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Initiated,
    Verified,
    Callback,
    Compensation,
}

/// Append-only audit record of a payment interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: i64,
    pub booking_id: String,
    pub kind: PaymentEventKind,
    pub reference: Option<String>,
    pub result_code: Option<i64>,
    pub detail: Option<String>,
    pub created_at: String,
}

/// A payment event before it has been assigned a row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentEvent {
    pub booking_id: String,
    pub kind: PaymentEventKind,
    pub reference: Option<String>,
    pub result_code: Option<i64>,
    pub detail: Option<String>,
}

// --- Payment provider types ---

/// A request to prompt a customer for payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub booking_id: String,
    /// MSISDN in `2547XXXXXXXX` form.
    pub phone: String,
    pub amount_kes: u32,
    pub account_reference: String,
    pub description: String,
}

/// Provider acknowledgement of a payment prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: Option<String>,
}

/// Result of asking the provider whether a payment went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PaymentVerdict {
    Paid { receipt: String },
    Pending,
    Failed { reason: String },
}

/// Asynchronous payment result pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    /// Provider result code; zero means success.
    pub result_code: i64,
    pub result_desc: String,
    pub receipt: Option<String>,
    pub amount_kes: Option<u32>,
    pub phone: Option<String>,
}

impl PaymentCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}
