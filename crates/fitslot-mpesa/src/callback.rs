// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of the STK push result that Daraja POSTs to the callback URL.

use fitslot_core::FitslotError;
use fitslot_core::types::PaymentCallback;

use crate::types::{CallbackEnvelope, CallbackItem};

/// Parse a raw STK callback body.
///
/// Successful callbacks carry `MpesaReceiptNumber`, `Amount` and
/// `PhoneNumber` in `CallbackMetadata`; failed ones carry no metadata.
pub fn parse_stk_callback(body: &[u8]) -> Result<PaymentCallback, FitslotError> {
    let envelope: CallbackEnvelope = serde_json::from_slice(body)
        .map_err(|e| FitslotError::Validation(format!("malformed STK callback: {e}")))?;
    let callback = envelope.body.stk_callback;
    let items = callback
        .metadata
        .map(|m| m.items)
        .unwrap_or_default();

    Ok(PaymentCallback {
        checkout_request_id: callback.checkout_request_id,
        merchant_request_id: callback.merchant_request_id,
        result_code: callback.result_code,
        result_desc: callback.result_desc,
        receipt: item_text(&items, "MpesaReceiptNumber"),
        amount_kes: item_value(&items, "Amount")
            .and_then(|v| v.as_f64())
            .filter(|a| *a >= 0.0 && *a <= f64::from(u32::MAX))
            .map(|a| a.round() as u32),
        phone: item_text(&items, "PhoneNumber"),
    })
}

fn item_value<'a>(items: &'a [CallbackItem], name: &str) -> Option<&'a serde_json::Value> {
    items
        .iter()
        .find(|item| item.name == name)
        .and_then(|item| item.value.as_ref())
}

fn item_text(items: &[CallbackItem], name: &str) -> Option<String> {
    match item_value(items, name)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS: &str = r#"{
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": 500.00},
                        {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                        {"Name": "Balance"},
                        {"Name": "TransactionDate", "Value": 20191219102115},
                        {"Name": "PhoneNumber", "Value": 254708374149}
                    ]
                }
            }
        }
    }"#;

    const CANCELLED: &str = r#"{
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }
        }
    }"#;

    #[test]
    fn success_callback_extracts_metadata() {
        let cb = parse_stk_callback(SUCCESS.as_bytes()).unwrap();
        assert!(cb.is_success());
        assert_eq!(cb.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(cb.receipt.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(cb.amount_kes, Some(500));
        assert_eq!(cb.phone.as_deref(), Some("254708374149"));
    }

    #[test]
    fn failed_callback_has_no_receipt() {
        let cb = parse_stk_callback(CANCELLED.as_bytes()).unwrap();
        assert!(!cb.is_success());
        assert_eq!(cb.result_code, 1032);
        assert_eq!(cb.receipt, None);
        assert_eq!(cb.amount_kes, None);
    }

    #[test]
    fn malformed_body_is_a_validation_error() {
        let err = parse_stk_callback(br#"{"Body":{}}"#).unwrap_err();
        assert!(matches!(err, FitslotError::Validation(_)));
    }
}
