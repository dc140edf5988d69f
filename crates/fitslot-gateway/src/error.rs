// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`FitslotError`] onto HTTP responses.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use fitslot_core::FitslotError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error kind.
    pub code: &'static str,
    /// Error description.
    pub error: String,
}

/// A service error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub FitslotError);

impl From<FitslotError> for ApiError {
    fn from(e: FitslotError) -> Self {
        Self(e)
    }
}

/// JSON body extractor whose rejections use the [`ErrorResponse`] shape
/// instead of axum's plain-text body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(FitslotError::Validation(rejection.body_text()))),
        }
    }
}

impl ApiError {
    /// Status code and error kind for the wrapped error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            FitslotError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            FitslotError::CapacityExceeded { .. } => (StatusCode::CONFLICT, "capacity_exceeded"),
            FitslotError::DuplicateBooking { .. } => (StatusCode::CONFLICT, "duplicate_booking"),
            FitslotError::ReferenceInUse { .. } => (StatusCode::CONFLICT, "reference_in_use"),
            FitslotError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            FitslotError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            FitslotError::Payment { .. } | FitslotError::Timeout { .. } => {
                (StatusCode::BAD_GATEWAY, "payment_provider")
            }
            FitslotError::Config(_) | FitslotError::Storage { .. } | FitslotError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(ErrorResponse { code, error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitslot_core::types::{BookingStatus, CapacityScope};

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (FitslotError::not_found("booking", "b-1"), StatusCode::NOT_FOUND),
            (
                FitslotError::CapacityExceeded {
                    scope: CapacityScope::TimeSlot,
                    id: "s-1".into(),
                    capacity: 4,
                },
                StatusCode::CONFLICT,
            ),
            (
                FitslotError::InvalidTransition {
                    from: BookingStatus::Cancelled,
                    to: BookingStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (
                FitslotError::Validation("bad".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                FitslotError::Payment {
                    message: "down".into(),
                    source: None,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (FitslotError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).classify().0, expected);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let response = ApiError(FitslotError::Storage {
            source: "disk I/O error at /var/lib/fitslot".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
