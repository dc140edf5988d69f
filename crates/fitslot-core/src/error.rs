// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Fitslot booking service.

use thiserror::Error;

use crate::types::{BookingStatus, CapacityScope};

/// The primary error type used across all Fitslot adapter traits and core operations.
#[derive(Debug, Error)]
pub enum FitslotError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Accepting the booking would push active bookings past a capacity bound.
    #[error("{scope} {id} is full (capacity {capacity})")]
    CapacityExceeded {
        scope: CapacityScope,
        id: String,
        capacity: u32,
    },

    /// The booking holder already has an active booking for the slot.
    #[error("an active booking already exists for this holder: {existing_id}")]
    DuplicateBooking { existing_id: String },

    /// A payment reference is already attached to a different booking.
    #[error("payment reference {reference} already confirms booking {booking_id}")]
    ReferenceInUse {
        reference: String,
        booking_id: String,
    },

    /// The requested status change is not allowed from the current status.
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Input failed validation before reaching storage.
    #[error("validation error: {0}")]
    Validation(String),

    /// Payment provider errors (API failure, malformed response, auth).
    #[error("payment error: {message}")]
    Payment {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FitslotError {
    /// Shorthand for a [`FitslotError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for errors caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::CapacityExceeded { .. }
                | Self::DuplicateBooking { .. }
                | Self::ReferenceInUse { .. }
                | Self::InvalidTransition { .. }
                | Self::Validation(_)
        )
    }
}
