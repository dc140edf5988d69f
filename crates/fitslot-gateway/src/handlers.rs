// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use fitslot_booking::{CallbackOutcome, NewGroup, NewSchedule, NewSession, NewTimeSlot};
use fitslot_core::FitslotError;
use fitslot_core::types::{
    Booking, BookingStatus, GroupDrift, HealthStatus, NewBooking, PaymentEvent, Reservation,
    Schedule, Session, SessionGroup, SlotAvailability, TimeSlot,
};

use crate::error::{ApiError, ApiJson};
use crate::server::GatewayState;

type ApiResult<T> = Result<T, ApiError>;

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" when every component is healthy, otherwise "degraded".
    pub status: String,
    /// Binary version.
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
    /// "disabled" when no payment provider is attached.
    pub payments: String,
}

/// Request body for POST /v1/bookings/{id}/pay.
#[derive(Debug, Default, Deserialize)]
pub struct PayRequest {
    /// Phone to prompt; defaults to the guest's phone.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Request body for POST /v1/bookings/{id}/confirm.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    /// Checkout id to verify; defaults to the booking's last STK push.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Request body for PUT /v1/groups/{id}/capacity.
#[derive(Debug, Deserialize)]
pub struct CapacityRequest {
    pub capacity: u32,
}

/// Query string for GET /v1/slots/{id}/bookings.
#[derive(Debug, Deserialize)]
pub struct BookingFilter {
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

/// Response body for POST /v1/admin/reconcile.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub corrected: Vec<GroupDrift>,
}

/// Acknowledgement returned to Daraja.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: u8,
    #[serde(rename = "ResultDesc")]
    pub result_desc: &'static str,
}

fn health_label(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// Parse an optional JSON body; an empty body yields the default.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError(FitslotError::Validation(format!("invalid request body: {e}"))))
}

// --- Public routes ---

/// GET /health
///
/// Unauthenticated liveness for systemd and `fitslot status`.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let storage = state
        .service
        .storage()
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    let payments = match state.service.verifier() {
        Some(verifier) => Some(
            verifier
                .health_check()
                .await
                .unwrap_or_else(|e| HealthStatus::Degraded(e.to_string())),
        ),
        None => None,
    };

    let storage_ok = storage == HealthStatus::Healthy;
    let payments_ok = payments
        .as_ref()
        .is_none_or(|p| *p == HealthStatus::Healthy);
    let body = HealthResponse {
        status: if storage_ok && payments_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage: health_label(&storage),
        payments: payments
            .as_ref()
            .map(health_label)
            .unwrap_or_else(|| "disabled".to_string()),
    };
    let status = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /v1/mpesa/callback
///
/// Daraja posts STK results here without credentials; the checkout id must
/// match a booking for anything to change.
pub async fn post_mpesa_callback(State(state): State<GatewayState>, body: Bytes) -> Response {
    let callback = match fitslot_mpesa::parse_stk_callback(&body) {
        Ok(callback) => callback,
        Err(e) => {
            tracing::warn!(error = %e, "rejected malformed M-Pesa callback");
            return (
                StatusCode::BAD_REQUEST,
                Json(CallbackAck {
                    result_code: 1,
                    result_desc: "Rejected",
                }),
            )
                .into_response();
        }
    };

    match state.service.apply_payment_callback(&callback).await {
        Ok(outcome) => {
            if outcome == CallbackOutcome::UnknownCheckout {
                tracing::debug!(checkout_request_id = %callback.checkout_request_id, "ignored callback");
            }
            Json(CallbackAck {
                result_code: 0,
                result_desc: "Accepted",
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to apply M-Pesa callback");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackAck {
                    result_code: 1,
                    result_desc: "Rejected",
                }),
            )
                .into_response()
        }
    }
}

// --- Bookings ---

/// POST /v1/bookings
///
/// 201 for a new booking, 200 when an idempotency key replays an earlier one.
pub async fn post_booking(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<NewBooking>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    match state.service.create_booking(body).await? {
        Reservation::Created(booking) => Ok((StatusCode::CREATED, Json(booking))),
        Reservation::Replayed(booking) => Ok((StatusCode::OK, Json(booking))),
    }
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(state.service.get_booking(&id).await?))
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(state.service.cancel_booking(&id).await?))
}

/// POST /v1/bookings/{id}/missed
pub async fn mark_missed(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(state.service.mark_missed(&id).await?))
}

/// POST /v1/bookings/{id}/complete
pub async fn mark_completed(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(state.service.mark_completed(&id).await?))
}

/// POST /v1/bookings/{id}/pay
pub async fn pay_booking(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let request: PayRequest = optional_json(&body)?;
    let booking = state
        .service
        .initiate_payment(&id, request.phone.as_deref())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(booking)))
}

/// POST /v1/bookings/{id}/confirm
pub async fn confirm_booking(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Booking>> {
    let request: ConfirmRequest = optional_json(&body)?;
    Ok(Json(
        state
            .service
            .confirm_booking(&id, request.reference.as_deref())
            .await?,
    ))
}

/// GET /v1/bookings/{id}/payments
pub async fn get_payment_events(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PaymentEvent>>> {
    Ok(Json(state.service.payment_events(&id).await?))
}

// --- Slots ---

/// GET /v1/slots/{id}/availability
pub async fn get_availability(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SlotAvailability>> {
    Ok(Json(state.service.availability(&id).await?))
}

/// GET /v1/slots/{id}/bookings
pub async fn get_slot_bookings(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(state.service.list_bookings(&id, filter.status).await?))
}

// --- Catalogue administration ---

/// POST /v1/schedules
pub async fn post_schedule(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<NewSchedule>,
) -> ApiResult<(StatusCode, Json<Schedule>)> {
    Ok((
        StatusCode::CREATED,
        Json(state.service.create_schedule(body).await?),
    ))
}

/// GET /v1/schedules/{id}/slots
pub async fn get_schedule_slots(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TimeSlot>>> {
    Ok(Json(state.service.list_time_slots(&id).await?))
}

/// GET /v1/schedules/{id}/groups
pub async fn get_schedule_groups(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SessionGroup>>> {
    Ok(Json(state.service.list_groups(&id).await?))
}

/// POST /v1/sessions
pub async fn post_session(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<NewSession>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    Ok((
        StatusCode::CREATED,
        Json(state.service.create_session(body).await?),
    ))
}

/// POST /v1/slots
pub async fn post_time_slot(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<NewTimeSlot>,
) -> ApiResult<(StatusCode, Json<TimeSlot>)> {
    Ok((
        StatusCode::CREATED,
        Json(state.service.create_time_slot(body).await?),
    ))
}

/// POST /v1/groups
pub async fn post_group(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<NewGroup>,
) -> ApiResult<(StatusCode, Json<SessionGroup>)> {
    Ok((
        StatusCode::CREATED,
        Json(state.service.create_group(body).await?),
    ))
}

/// PUT /v1/groups/{id}/capacity
pub async fn put_group_capacity(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CapacityRequest>,
) -> ApiResult<Json<SessionGroup>> {
    Ok(Json(
        state.service.set_group_capacity(&id, body.capacity).await?,
    ))
}

/// POST /v1/admin/reconcile
pub async fn post_reconcile(State(state): State<GatewayState>) -> ApiResult<Json<ReconcileResponse>> {
    Ok(Json(ReconcileResponse {
        corrected: state.service.reconcile().await?,
    }))
}
