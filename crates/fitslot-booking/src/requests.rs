// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and outcome types for [`BookingService`](crate::BookingService).

use serde::{Deserialize, Serialize};

use fitslot_core::types::Booking;

/// A schedule (calendar day) to create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSchedule {
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A class type to create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSession {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A bookable slot to create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTimeSlot {
    pub schedule_id: String,
    pub session_id: String,
    /// `HH:MM`.
    pub start_time: String,
    /// `HH:MM`, after `start_time`.
    pub end_time: String,
    /// Falls back to `booking.default_slot_capacity`.
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub price_kes: u32,
}

/// A session group to create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewGroup {
    pub schedule_id: String,
    pub name: String,
    /// Falls back to `booking.default_group_capacity`.
    #[serde(default)]
    pub capacity: Option<u32>,
}

/// How a provider callback changed (or did not change) a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "booking", rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// Payment succeeded and the booking is now `completed`.
    Confirmed(Booking),
    /// Payment failed; the booking keeps its seat with payment `failed`.
    Failed(Booking),
    /// Payment succeeded after the booking lost its seat; money must go back.
    RefundDue(Booking),
    /// The callback repeats an outcome that was already applied, or reports a
    /// failure for a payment that had already settled.
    Duplicate(Booking),
    /// No booking carries the callback's checkout id.
    UnknownCheckout,
}

impl CallbackOutcome {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed(_) => "confirmed",
            Self::Failed(_) => "failed",
            Self::RefundDue(_) => "refund_due",
            Self::Duplicate(_) => "duplicate",
            Self::UnknownCheckout => "unknown_checkout",
        }
    }

    pub fn booking(&self) -> Option<&Booking> {
        match self {
            Self::Confirmed(b) | Self::Failed(b) | Self::RefundDue(b) | Self::Duplicate(b) => {
                Some(b)
            }
            Self::UnknownCheckout => None,
        }
    }
}
