// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Safaricom Daraja API.
//!
//! Provides [`MpesaClient`] which handles OAuth token caching, STK push
//! password generation, and retry of transient errors (429, 500, 503).

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use fitslot_config::model::MpesaConfig;
use fitslot_core::FitslotError;
use fitslot_core::types::{PaymentInitiation, PaymentRequest, PaymentVerdict};

use crate::types::{
    ApiErrorResponse, StkPushRequest, StkPushResponse, StkQueryRequest, StkQueryResponse,
    TokenResponse,
};

const TOKEN_PATH: &str = "/oauth/v1/generate";
const TOKEN_GRANT: &str = "grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const STK_QUERY_PATH: &str = "/mpesa/stkpushquery/v1/query";

/// Tokens are refreshed this long before Daraja expires them.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Lifetime assumed when Daraja's `expires_in` cannot be parsed.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3599;
/// Query error code for a prompt the customer has not answered yet.
const STILL_PROCESSING: &str = "500.001.1001";
/// Daraja timestamps are East Africa Time (UTC+3).
const EAT_OFFSET_SECS: i32 = 3 * 3600;

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// What Daraja answered after retries were exhausted or not needed.
enum Reply<R> {
    Accepted(R),
    Rejected {
        status: StatusCode,
        error: Option<ApiErrorResponse>,
        body: String,
    },
}

/// HTTP client for Daraja communication.
///
/// One access token is shared by all requests and refreshed shortly before
/// it expires, or immediately after a 401.
pub struct MpesaClient {
    http: reqwest::Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    shortcode: String,
    passkey: String,
    callback_url: String,
    max_retries: u32,
    retry_delay: Duration,
    request_timeout: Duration,
    token: Mutex<Option<CachedToken>>,
}

impl MpesaClient {
    /// Creates a client from the `[mpesa]` config section.
    ///
    /// Fails if credentials, passkey, or callback URL are missing.
    pub fn new(config: &MpesaConfig) -> Result<Self, FitslotError> {
        let required = |field: &str, value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| FitslotError::Config(format!("mpesa.{field} is required")))
        };

        let request_timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FitslotError::Payment {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: config.resolved_base_url(),
            consumer_key: required("consumer_key", &config.consumer_key)?,
            consumer_secret: required("consumer_secret", &config.consumer_secret)?,
            shortcode: config.shortcode.clone(),
            passkey: required("passkey", &config.passkey)?,
            callback_url: required("callback_url", &config.callback_url)?,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            request_timeout,
            token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns a valid access token, fetching a new one when needed.
    pub async fn access_token(&self) -> Result<String, FitslotError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .get(format!("{}{TOKEN_PATH}?{TOKEN_GRANT}", self.base_url))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await
            .map_err(|e| self.request_failed(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(payment_error(format!(
                "token request returned {status}: {}",
                describe_rejection(serde_json::from_str(&body).ok().as_ref(), &body)
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| FitslotError::Payment {
            message: format!("failed to parse token response: {e}"),
            source: Some(Box::new(e)),
        })?;
        let lifetime = token
            .expires_in
            .parse::<u64>()
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now()
                + Duration::from_secs(lifetime).saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        debug!(lifetime, "obtained Daraja access token");
        Ok(token.access_token)
    }

    fn request_failed(&self, e: reqwest::Error) -> FitslotError {
        if e.is_timeout() {
            warn!(timeout = ?self.request_timeout, "Daraja request timed out");
            return FitslotError::Timeout {
                duration: self.request_timeout,
            };
        }
        FitslotError::Payment {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// `base64(shortcode + passkey + timestamp)`.
    pub fn password(&self, timestamp: &str) -> String {
        STANDARD.encode(format!("{}{}{timestamp}", self.shortcode, self.passkey))
    }

    /// Current time as `YYYYMMDDHHmmss` in East Africa Time.
    pub fn timestamp() -> String {
        let now = chrono::Utc::now();
        match chrono::FixedOffset::east_opt(EAT_OFFSET_SECS) {
            Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
            None => now.format("%Y%m%d%H%M%S").to_string(),
        }
    }

    /// Sends an STK push prompting the customer to pay.
    pub async fn stk_push(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentInitiation, FitslotError> {
        let timestamp = Self::timestamp();
        let body = StkPushRequest {
            business_short_code: self.shortcode.clone(),
            password: self.password(&timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: request.amount_kes,
            party_a: request.phone.clone(),
            party_b: self.shortcode.clone(),
            phone_number: request.phone.clone(),
            callback_url: self.callback_url.clone(),
            account_reference: request.account_reference.clone(),
            transaction_desc: request.description.clone(),
        };

        match self.post_json::<_, StkPushResponse>(STK_PUSH_PATH, &body).await? {
            Reply::Accepted(response) if response.response_code == "0" => {
                debug!(
                    checkout_request_id = %response.checkout_request_id,
                    "STK push accepted"
                );
                Ok(PaymentInitiation {
                    checkout_request_id: response.checkout_request_id,
                    merchant_request_id: response.merchant_request_id,
                    customer_message: response.customer_message,
                })
            }
            Reply::Accepted(response) => Err(payment_error(format!(
                "STK push rejected ({}): {}",
                response.response_code, response.response_description
            ))),
            Reply::Rejected {
                status,
                error,
                body,
            } => Err(payment_error(format!(
                "STK push returned {status}: {}",
                describe_rejection(error.as_ref(), &body)
            ))),
        }
    }

    /// Asks Daraja for the outcome of an STK push.
    ///
    /// The query response does not carry the M-Pesa receipt, so a paid
    /// verdict reports the checkout id as its receipt.
    pub async fn stk_query(&self, checkout_request_id: &str) -> Result<PaymentVerdict, FitslotError> {
        let timestamp = Self::timestamp();
        let body = StkQueryRequest {
            business_short_code: self.shortcode.clone(),
            password: self.password(&timestamp),
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        match self.post_json::<_, StkQueryResponse>(STK_QUERY_PATH, &body).await? {
            Reply::Accepted(response) => Ok(match response.result_code.as_str() {
                "0" => PaymentVerdict::Paid {
                    receipt: checkout_request_id.to_string(),
                },
                "4999" => PaymentVerdict::Pending,
                code => PaymentVerdict::Failed {
                    reason: format!("{} (result code {code})", response.result_desc),
                },
            }),
            Reply::Rejected {
                error: Some(error), ..
            } if error.error_code == STILL_PROCESSING => Ok(PaymentVerdict::Pending),
            Reply::Rejected {
                status,
                error,
                body,
            } => Err(payment_error(format!(
                "STK query returned {status}: {}",
                describe_rejection(error.as_ref(), &body)
            ))),
        }
    }

    /// POSTs `body` with the bearer token, retrying transient failures.
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<Reply<R>, FitslotError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying Daraja request");
                tokio::time::sleep(self.retry_delay).await;
            }

            let token = self.access_token().await?;
            let response = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(body)
                .send()
                .await
                .map_err(|e| self.request_failed(e))?;

            let status = response.status();
            debug!(status = %status, attempt, path, "Daraja response received");

            if status.is_success() {
                let parsed = response.json::<R>().await.map_err(|e| FitslotError::Payment {
                    message: format!("failed to parse Daraja response: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return Ok(Reply::Accepted(parsed));
            }

            let text = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<ApiErrorResponse>(&text).ok();
            let can_retry = attempt < self.max_retries;

            if status == StatusCode::UNAUTHORIZED && can_retry {
                warn!("Daraja rejected the access token, refreshing");
                self.invalidate_token().await;
                continue;
            }
            let processing = error
                .as_ref()
                .is_some_and(|e| e.error_code == STILL_PROCESSING);
            if is_transient_error(status) && !processing && can_retry {
                warn!(status = %status, body = %text, "transient error, will retry");
                continue;
            }

            return Ok(Reply::Rejected {
                status,
                error,
                body: text,
            });
        }

        Err(payment_error(format!(
            "Daraja request to {path} failed after retries"
        )))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

fn payment_error(message: String) -> FitslotError {
    FitslotError::Payment {
        message,
        source: None,
    }
}


fn describe_rejection(error: Option<&ApiErrorResponse>, body: &str) -> String {
    match error {
        Some(e) => format!("{} ({})", e.error_message, e.error_code),
        None => body.to_string(),
    }
}
