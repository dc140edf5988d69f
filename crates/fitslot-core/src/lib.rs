// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Fitslot booking service.
//!
//! This crate provides the error type, domain types, and adapter traits used
//! throughout the Fitslot workspace. Storage and payment backends implement
//! the traits defined here; the booking service depends only on the traits.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FitslotError;
pub use types::{AdapterType, BookingStatus, HealthStatus, PaymentStatus};

pub use traits::{PaymentVerifier, PluginAdapter, StorageAdapter};
