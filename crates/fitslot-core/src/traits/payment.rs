// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment verifier trait for mobile-money providers (M-Pesa, etc.).

use async_trait::async_trait;

use crate::error::FitslotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{PaymentInitiation, PaymentRequest, PaymentVerdict};

/// Adapter for prompting and verifying customer payments.
///
/// Implementations make network calls; callers must not hold a storage
/// transaction open across these methods.
#[async_trait]
pub trait PaymentVerifier: PluginAdapter {
    /// Sends a payment prompt to the customer's phone.
    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, FitslotError>;

    /// Asks the provider for the outcome of a previously initiated payment.
    async fn verify(&self, checkout_request_id: &str) -> Result<PaymentVerdict, FitslotError>;
}
