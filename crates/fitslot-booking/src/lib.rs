// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking service for the Fitslot studio.
//!
//! [`BookingService`] sits between the transport layer and the adapters. It
//! validates requests, delegates capacity-checked writes to the
//! [`StorageAdapter`](fitslot_core::StorageAdapter), and reconciles payment
//! outcomes reported by the [`PaymentVerifier`](fitslot_core::PaymentVerifier),
//! either synchronously (`confirm_booking`) or through provider callbacks.

pub mod payments;
pub mod requests;
pub mod service;
mod telemetry;
pub mod validation;

pub use requests::{CallbackOutcome, NewGroup, NewSchedule, NewSession, NewTimeSlot};
pub use service::BookingService;
