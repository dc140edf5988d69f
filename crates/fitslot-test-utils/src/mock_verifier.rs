// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock payment verifier for deterministic testing.
//!
//! `MockPaymentVerifier` implements `PaymentVerifier` with queued verdicts,
//! so payment flows can be exercised without calling M-Pesa.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use fitslot_core::types::{
    AdapterType, HealthStatus, PaymentInitiation, PaymentRequest, PaymentVerdict,
};
use fitslot_core::{FitslotError, PaymentVerifier, PluginAdapter};

/// A payment verifier that answers from a FIFO queue of scripted results.
///
/// When the queue is empty, `verify` reports [`PaymentVerdict::Pending`].
/// Every initiation gets a fresh `ws_CO_` checkout id.
pub struct MockPaymentVerifier {
    verdicts: Arc<Mutex<VecDeque<Result<PaymentVerdict, String>>>>,
    initiated: Arc<Mutex<Vec<PaymentRequest>>>,
    verified: Arc<Mutex<Vec<String>>>,
    next_checkout: AtomicU32,
}

impl MockPaymentVerifier {
    pub fn new() -> Self {
        Self {
            verdicts: Arc::new(Mutex::new(VecDeque::new())),
            initiated: Arc::new(Mutex::new(Vec::new())),
            verified: Arc::new(Mutex::new(Vec::new())),
            next_checkout: AtomicU32::new(1),
        }
    }

    /// Queue the verdict returned by the next `verify` call.
    pub async fn push_verdict(&self, verdict: PaymentVerdict) {
        self.verdicts.lock().await.push_back(Ok(verdict));
    }

    /// Queue a provider error for the next `verify` call.
    pub async fn push_error(&self, message: &str) {
        self.verdicts.lock().await.push_back(Err(message.to_string()));
    }

    /// Payment prompts sent so far.
    pub async fn initiated(&self) -> Vec<PaymentRequest> {
        self.initiated.lock().await.clone()
    }

    /// Checkout ids passed to `verify` so far.
    pub async fn verified(&self) -> Vec<String> {
        self.verified.lock().await.clone()
    }
}

impl Default for MockPaymentVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPaymentVerifier {
    fn name(&self) -> &str {
        "mock-payments"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Payment
    }

    async fn health_check(&self) -> Result<HealthStatus, FitslotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FitslotError> {
        Ok(())
    }
}

#[async_trait]
impl PaymentVerifier for MockPaymentVerifier {
    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, FitslotError> {
        let n = self.next_checkout.fetch_add(1, Ordering::SeqCst);
        self.initiated.lock().await.push(request.clone());
        Ok(PaymentInitiation {
            checkout_request_id: format!("ws_CO_{n:04}"),
            merchant_request_id: format!("mr-{n}"),
            customer_message: Some("Success. Request accepted for processing".to_string()),
        })
    }

    async fn verify(&self, checkout_request_id: &str) -> Result<PaymentVerdict, FitslotError> {
        self.verified
            .lock()
            .await
            .push(checkout_request_id.to_string());
        match self.verdicts.lock().await.pop_front() {
            Some(Ok(verdict)) => Ok(verdict),
            Some(Err(message)) => Err(FitslotError::Payment {
                message,
                source: None,
            }),
            None => Ok(PaymentVerdict::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verdicts_are_served_in_order_then_pending() {
        let mock = MockPaymentVerifier::new();
        mock.push_verdict(PaymentVerdict::Paid {
            receipt: "QKX1".into(),
        })
        .await;
        mock.push_error("gateway down").await;

        assert_eq!(
            mock.verify("ws_CO_1").await.unwrap(),
            PaymentVerdict::Paid {
                receipt: "QKX1".into()
            }
        );
        assert!(matches!(
            mock.verify("ws_CO_1").await,
            Err(FitslotError::Payment { .. })
        ));
        assert_eq!(mock.verify("ws_CO_1").await.unwrap(), PaymentVerdict::Pending);
        assert_eq!(mock.verified().await.len(), 3);
    }

    #[tokio::test]
    async fn initiations_get_distinct_checkout_ids() {
        let mock = MockPaymentVerifier::new();
        let request = PaymentRequest {
            booking_id: "b-1".into(),
            phone: "254700000001".into(),
            amount_kes: 500,
            account_reference: "B1".into(),
            description: "Class booking".into(),
        };
        let first = mock.initiate(&request).await.unwrap();
        let second = mock.initiate(&request).await.unwrap();
        assert_ne!(first.checkout_request_id, second.checkout_request_id);
        assert_eq!(mock.initiated().await.len(), 2);
    }
}
