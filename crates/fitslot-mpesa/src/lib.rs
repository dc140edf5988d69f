// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! M-Pesa (Safaricom Daraja) payment adapter for the Fitslot booking service.
//!
//! [`MpesaClient`] implements [`PaymentVerifier`]: `initiate` sends an STK
//! push and `verify` runs an STK status query. Asynchronous results posted
//! to the callback URL are parsed with [`parse_stk_callback`].

pub mod callback;
pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::{info, warn};

use fitslot_config::model::MpesaConfig;
use fitslot_core::types::{
    AdapterType, HealthStatus, PaymentInitiation, PaymentRequest, PaymentVerdict,
};
use fitslot_core::{FitslotError, PaymentVerifier, PluginAdapter};

pub use callback::parse_stk_callback;
pub use client::MpesaClient;

impl MpesaClient {
    /// Builds the client and logs which Daraja environment it talks to.
    pub fn from_config(config: &MpesaConfig) -> Result<Self, FitslotError> {
        let client = Self::new(config)?;
        info!(
            base_url = client.base_url(),
            shortcode = %config.shortcode,
            "M-Pesa client initialized"
        );
        Ok(client)
    }
}

#[async_trait]
impl PluginAdapter for MpesaClient {
    fn name(&self) -> &str {
        "mpesa"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Payment
    }

    /// Healthy when an access token can be obtained.
    async fn health_check(&self) -> Result<HealthStatus, FitslotError> {
        match self.access_token().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => {
                warn!(error = %e, "M-Pesa health check failed");
                Ok(HealthStatus::Degraded(e.to_string()))
            }
        }
    }

    async fn shutdown(&self) -> Result<(), FitslotError> {
        Ok(())
    }
}

#[async_trait]
impl PaymentVerifier for MpesaClient {
    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, FitslotError> {
        self.stk_push(request).await
    }

    async fn verify(&self, checkout_request_id: &str) -> Result<PaymentVerdict, FitslotError> {
        self.stk_query(checkout_request_id).await
    }
}
