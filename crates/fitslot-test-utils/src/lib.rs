// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Fitslot integration tests.
//!
//! Provides a scripted payment verifier and a harness over a temporary
//! SQLite database, so booking and gateway tests run without network access.
//!
//! # Components
//!
//! - [`MockPaymentVerifier`] - Payment verifier with queued verdicts
//! - [`TestHarness`] - Temp storage plus catalogue seeding helpers

pub mod harness;
pub mod mock_verifier;

pub use harness::TestHarness;
pub use mock_verifier::MockPaymentVerifier;
