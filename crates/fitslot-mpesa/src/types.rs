// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daraja request/response types and the STK callback envelope.

use serde::{Deserialize, Deserializer, Serialize};

/// OAuth client-credentials response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds. Daraja sends it as a string.
    #[serde(deserialize_with = "lenient_string")]
    pub expires_in: String,
}

/// Lipa Na M-Pesa Online (STK push) request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: u32,
    /// Customer MSISDN paying.
    pub party_a: String,
    /// Shortcode receiving.
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode", deserialize_with = "lenient_string")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

/// STK push status query.
#[derive(Debug, Clone, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode", deserialize_with = "lenient_string")]
    pub response_code: String,
    #[serde(rename = "ResultCode", deserialize_with = "lenient_string")]
    pub result_code: String,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
}

/// Error body returned by Daraja on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

// --- Callback envelope ---

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

/// A `{Name, Value}` pair. Values arrive as numbers or strings.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

/// Accept a JSON string or number and keep its text form.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stk_push_request_uses_daraja_field_names() {
        let request = StkPushRequest {
            business_short_code: "174379".into(),
            password: "cGFzcw==".into(),
            timestamp: "20261102070000".into(),
            transaction_type: "CustomerPayBillOnline".into(),
            amount: 500,
            party_a: "254712345678".into(),
            party_b: "174379".into(),
            phone_number: "254712345678".into(),
            callback_url: "https://studio.example/v1/mpesa/callback".into(),
            account_reference: "BK3F2B9C1E77".into(),
            transaction_desc: "Kilimani Fit".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["PartyA"], "254712345678");
        assert_eq!(json["CallBackURL"], "https://studio.example/v1/mpesa/callback");
        assert_eq!(json["Amount"], 500);
    }

    #[test]
    fn result_codes_accept_strings_and_numbers() {
        let as_string: StkQueryResponse = serde_json::from_str(
            r#"{"ResponseCode":"0","ResultCode":"1032","ResultDesc":"Request cancelled by user"}"#,
        )
        .unwrap();
        assert_eq!(as_string.result_code, "1032");
        let as_number: StkQueryResponse =
            serde_json::from_str(r#"{"ResponseCode":0,"ResultCode":0,"ResultDesc":"ok"}"#).unwrap();
        assert_eq!(as_number.result_code, "0");
    }

    #[test]
    fn token_lifetime_may_be_numeric() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":3599}"#).unwrap();
        assert_eq!(token.expires_in, "3599");
    }
}
