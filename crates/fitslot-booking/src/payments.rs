// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment flows: STK prompts, synchronous confirmation, and provider callbacks.
//!
//! Provider calls always run outside storage transactions. Their results are
//! written afterwards through storage operations that re-check the booking
//! inside the write transaction: `transition_booking` refuses to complete a
//! booking that lost its seat, and `update_payment_unless_settled` never
//! downgrades a payment that settled in the meantime. A booking cancelled
//! while a payment was in flight is flagged `refund_due` instead of being
//! reinstated.

use tracing::{debug, info, instrument, warn};

use fitslot_core::FitslotError;
use fitslot_core::types::{
    Booking, BookingStatus, NewPaymentEvent, PaymentCallback, PaymentEventKind, PaymentRequest,
    PaymentStatus, PaymentUpdate, PaymentVerdict,
};

use crate::requests::CallbackOutcome;
use crate::service::BookingService;
use crate::telemetry;
use crate::validation::normalize_msisdn;

/// Daraja limits `AccountReference` to 12 characters.
const ACCOUNT_REFERENCE_LEN: usize = 12;
/// Daraja limits `TransactionDesc` to 13 characters.
const DESCRIPTION_LEN: usize = 13;

/// Result of applying a successful payment to a booking.
enum Settlement {
    Confirmed(Booking),
    AlreadyApplied(Booking),
    /// Money arrived that the booking cannot keep.
    Compensated(Booking),
}

impl Settlement {
    fn into_booking(self) -> Booking {
        match self {
            Self::Confirmed(b) | Self::AlreadyApplied(b) | Self::Compensated(b) => b,
        }
    }
}

impl BookingService {
    /// Send an M-Pesa prompt for the slot price to `phone`, or to the guest's
    /// phone when none is given. Leaves the booking `booked` with payment `pending`.
    #[instrument(skip(self, phone))]
    pub async fn initiate_payment(
        &self,
        booking_id: &str,
        phone: Option<&str>,
    ) -> Result<Booking, FitslotError> {
        let payments = self.payments()?;
        let booking = self.get_booking(booking_id).await?;
        if booking.status != BookingStatus::Booked {
            return Err(FitslotError::Validation(format!(
                "booking {booking_id} is {} and cannot take a payment",
                booking.status
            )));
        }
        if booking.payment_status == PaymentStatus::Paid {
            return Err(FitslotError::Validation(format!(
                "booking {booking_id} is already paid"
            )));
        }

        let guest_phone = booking.party.guest().and_then(|g| g.phone.as_deref());
        let phone = match phone.or(guest_phone) {
            Some(raw) => normalize_msisdn(raw)?,
            None => {
                return Err(FitslotError::Validation(
                    "a phone number is required to request payment".to_string(),
                ));
            }
        };

        let slot = self.time_slot(&booking.time_slot_id).await?;
        if slot.price_kes == 0 {
            return Err(FitslotError::Validation(format!(
                "time slot {} is free; nothing to pay",
                slot.id
            )));
        }

        let request = PaymentRequest {
            booking_id: booking.id.clone(),
            phone,
            amount_kes: slot.price_kes,
            account_reference: account_reference(&booking.id),
            description: transaction_description(&self.studio_name),
        };
        let initiation = payments.initiate(&request).await?;

        let updated = self
            .storage
            .update_payment(
                &booking.id,
                &PaymentUpdate {
                    status: Some(PaymentStatus::Pending),
                    reference: None,
                    checkout_request_id: Some(initiation.checkout_request_id.clone()),
                },
            )
            .await?;
        self.audit(NewPaymentEvent {
            booking_id: booking.id.clone(),
            kind: PaymentEventKind::Initiated,
            reference: Some(initiation.checkout_request_id.clone()),
            result_code: None,
            detail: Some(
                serde_json::json!({
                    "merchant_request_id": initiation.merchant_request_id,
                    "amount_kes": request.amount_kes,
                })
                .to_string(),
            ),
        })
        .await?;

        info!(
            checkout_request_id = %initiation.checkout_request_id,
            amount_kes = request.amount_kes,
            "payment prompt sent"
        );
        Ok(updated)
    }

    /// Ask the provider whether the booking's payment went through and apply
    /// the answer.
    ///
    /// `reference` is the provider checkout id to verify; it defaults to the
    /// one stored by [`initiate_payment`](Self::initiate_payment). A verified
    /// payment completes the booking and stores the receipt. Pending and
    /// failed payments leave the booking `booked`. Confirming a booking that
    /// is already paid returns it unchanged.
    #[instrument(skip(self))]
    pub async fn confirm_booking(
        &self,
        booking_id: &str,
        reference: Option<&str>,
    ) -> Result<Booking, FitslotError> {
        let payments = self.payments()?;
        let booking = self.get_booking(booking_id).await?;
        match booking.status {
            BookingStatus::Booked => {}
            BookingStatus::Completed if booking.payment_status == PaymentStatus::Paid => {
                debug!("booking already confirmed");
                return Ok(booking);
            }
            from => {
                return Err(FitslotError::InvalidTransition {
                    from,
                    to: BookingStatus::Completed,
                });
            }
        }

        let checkout = match reference.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => r.to_string(),
            None => booking.checkout_request_id.clone().ok_or_else(|| {
                FitslotError::Validation(
                    "booking has no payment to verify; initiate a payment first".to_string(),
                )
            })?,
        };
        if booking.checkout_request_id.as_deref() != Some(checkout.as_str()) {
            if let Some(other) = self.storage.find_booking_by_checkout(&checkout).await? {
                if other.id != booking.id {
                    return Err(FitslotError::Validation(format!(
                        "checkout request {checkout} belongs to booking {}",
                        other.id
                    )));
                }
            }
        }

        let verdict = match payments.verify(&checkout).await {
            Ok(verdict) => verdict,
            Err(e) => {
                telemetry::record_verification("error");
                warn!(checkout_request_id = %checkout, error = %e, "payment verification failed");
                return Err(e);
            }
        };
        self.audit(NewPaymentEvent {
            booking_id: booking.id.clone(),
            kind: PaymentEventKind::Verified,
            reference: Some(checkout.clone()),
            result_code: None,
            detail: serde_json::to_string(&verdict).ok(),
        })
        .await?;

        match verdict {
            PaymentVerdict::Paid { receipt } => {
                telemetry::record_verification("paid");
                let settled = self.settle(&booking.id, &receipt, &checkout).await?;
                Ok(settled.into_booking())
            }
            PaymentVerdict::Pending => {
                telemetry::record_verification("pending");
                debug!(checkout_request_id = %checkout, "payment still pending");
                self.record_unsettled(&booking.id, PaymentStatus::Pending, &checkout)
                    .await
            }
            PaymentVerdict::Failed { reason } => {
                telemetry::record_verification("failed");
                info!(checkout_request_id = %checkout, %reason, "payment failed");
                self.record_unsettled(&booking.id, PaymentStatus::Failed, &checkout)
                    .await
            }
        }
    }

    /// Apply an asynchronous payment result pushed by the provider.
    ///
    /// Replays of an already applied callback change nothing.
    #[instrument(skip_all, fields(checkout_request_id = %callback.checkout_request_id))]
    pub async fn apply_payment_callback(
        &self,
        callback: &PaymentCallback,
    ) -> Result<CallbackOutcome, FitslotError> {
        let Some(booking) = self
            .storage
            .find_booking_by_checkout(&callback.checkout_request_id)
            .await?
        else {
            telemetry::record_callback("unknown_checkout");
            warn!(result_code = callback.result_code, "callback for unknown checkout request");
            return Ok(CallbackOutcome::UnknownCheckout);
        };

        self.audit(NewPaymentEvent {
            booking_id: booking.id.clone(),
            kind: PaymentEventKind::Callback,
            reference: callback
                .receipt
                .clone()
                .or_else(|| Some(callback.checkout_request_id.clone())),
            result_code: Some(callback.result_code),
            detail: Some(callback.result_desc.clone()),
        })
        .await?;

        let booking_id = booking.id.clone();
        let outcome = if callback.is_success() {
            let receipt = callback.receipt.as_deref().ok_or_else(|| {
                FitslotError::Validation("successful callback carries no receipt".to_string())
            })?;
            let price = self.slot_price(&booking).await?;
            if let (Some(amount), Some(price)) = (callback.amount_kes, price) {
                if amount < price {
                    warn!(amount_kes = amount, price_kes = price, "callback amount below slot price");
                }
            }
            match self
                .settle(&booking.id, receipt, &callback.checkout_request_id)
                .await?
            {
                Settlement::Confirmed(b) => CallbackOutcome::Confirmed(b),
                Settlement::AlreadyApplied(b) => CallbackOutcome::Duplicate(b),
                Settlement::Compensated(b) => CallbackOutcome::RefundDue(b),
            }
        } else if matches!(
            booking.payment_status,
            PaymentStatus::Paid | PaymentStatus::RefundDue | PaymentStatus::Failed
        ) {
            CallbackOutcome::Duplicate(booking)
        } else {
            let updated = self
                .storage
                .update_payment_unless_settled(
                    &booking.id,
                    &PaymentUpdate {
                        status: Some(PaymentStatus::Failed),
                        ..PaymentUpdate::default()
                    },
                )
                .await?;
            if updated.payment_status == PaymentStatus::Failed {
                CallbackOutcome::Failed(updated)
            } else {
                debug!(payment_status = %updated.payment_status, "payment settled before the failure arrived");
                CallbackOutcome::Duplicate(updated)
            }
        };

        telemetry::record_callback(outcome.label());
        info!(%booking_id, outcome = outcome.label(), "payment callback applied");
        Ok(outcome)
    }

    /// Complete a booking with a verified receipt, or flag the money for
    /// refund when the booking no longer holds a seat.
    async fn settle(
        &self,
        booking_id: &str,
        receipt: &str,
        checkout: &str,
    ) -> Result<Settlement, FitslotError> {
        let update = PaymentUpdate {
            status: Some(PaymentStatus::Paid),
            reference: Some(receipt.to_string()),
            checkout_request_id: Some(checkout.to_string()),
        };
        let from = match self
            .storage
            .transition_booking(booking_id, BookingStatus::Completed, Some(update))
            .await
        {
            Ok(booking) => {
                telemetry::record_transition("completed");
                info!(booking_id, receipt, "payment confirmed");
                return Ok(Settlement::Confirmed(booking));
            }
            Err(FitslotError::InvalidTransition { from, .. }) => from,
            Err(e) => return Err(e),
        };

        let current = self.get_booking(booking_id).await?;
        if current.payment_reference.as_deref() == Some(receipt) {
            debug!(booking_id, receipt, "payment already applied");
            return Ok(Settlement::AlreadyApplied(current));
        }
        let settled = matches!(
            current.payment_status,
            PaymentStatus::Paid | PaymentStatus::RefundDue
        );
        if settled && current.checkout_request_id.as_deref() == Some(checkout) {
            // Same transaction, settled earlier by a status query that only
            // knew the checkout id. Keep the provider receipt instead.
            if current.payment_reference.as_deref() == Some(checkout) {
                let updated = self
                    .storage
                    .update_payment(
                        booking_id,
                        &PaymentUpdate {
                            reference: Some(receipt.to_string()),
                            ..PaymentUpdate::default()
                        },
                    )
                    .await?;
                return Ok(Settlement::AlreadyApplied(updated));
            }
            return Ok(Settlement::AlreadyApplied(current));
        }

        match from {
            BookingStatus::Completed if current.payment_reference.is_none() => {
                // Completed at the door before the payment landed.
                let updated = self
                    .storage
                    .update_payment(
                        booking_id,
                        &PaymentUpdate {
                            status: Some(PaymentStatus::Paid),
                            reference: Some(receipt.to_string()),
                            checkout_request_id: Some(checkout.to_string()),
                        },
                    )
                    .await?;
                Ok(Settlement::Confirmed(updated))
            }
            BookingStatus::Completed => {
                // The first receipt stays on the booking; the audit row carries the second.
                let updated = self
                    .storage
                    .update_payment(
                        booking_id,
                        &PaymentUpdate {
                            status: Some(PaymentStatus::RefundDue),
                            ..PaymentUpdate::default()
                        },
                    )
                    .await?;
                self.compensate(&updated, receipt, "second payment for a confirmed booking")
                    .await?;
                Ok(Settlement::Compensated(updated))
            }
            BookingStatus::Cancelled | BookingStatus::Missed => {
                let updated = self
                    .storage
                    .update_payment(
                        booking_id,
                        &PaymentUpdate {
                            status: Some(PaymentStatus::RefundDue),
                            reference: Some(receipt.to_string()),
                            checkout_request_id: Some(checkout.to_string()),
                        },
                    )
                    .await?;
                let note = format!("payment received for a {} booking", current.status);
                self.compensate(&updated, receipt, &note).await?;
                Ok(Settlement::Compensated(updated))
            }
            BookingStatus::Booked => Err(FitslotError::InvalidTransition {
                from,
                to: BookingStatus::Completed,
            }),
        }
    }

    async fn compensate(
        &self,
        booking: &Booking,
        receipt: &str,
        note: &str,
    ) -> Result<(), FitslotError> {
        warn!(booking_id = %booking.id, status = %booking.status, receipt, "{note}; refund due");
        self.audit(NewPaymentEvent {
            booking_id: booking.id.clone(),
            kind: PaymentEventKind::Compensation,
            reference: Some(receipt.to_string()),
            result_code: None,
            detail: Some(note.to_string()),
        })
        .await
    }

    /// Store a pending or failed verification unless a payment landed meanwhile.
    async fn record_unsettled(
        &self,
        booking_id: &str,
        status: PaymentStatus,
        checkout: &str,
    ) -> Result<Booking, FitslotError> {
        self.storage
            .update_payment_unless_settled(
                booking_id,
                &PaymentUpdate {
                    status: Some(status),
                    reference: None,
                    checkout_request_id: Some(checkout.to_string()),
                },
            )
            .await
    }

    async fn slot_price(&self, booking: &Booking) -> Result<Option<u32>, FitslotError> {
        Ok(self
            .storage
            .get_time_slot(&booking.time_slot_id)
            .await?
            .map(|slot| slot.price_kes))
    }

    async fn audit(&self, event: NewPaymentEvent) -> Result<(), FitslotError> {
        self.storage.record_payment_event(&event).await?;
        Ok(())
    }
}

fn transaction_description(studio_name: &str) -> String {
    let short: String = studio_name.chars().take(DESCRIPTION_LEN).collect();
    short.trim_end().to_string()
}

/// Short, customer-visible reference derived from the booking id.
fn account_reference(booking_id: &str) -> String {
    let tail: String = booking_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(ACCOUNT_REFERENCE_LEN - 2)
        .collect();
    format!("BK{}", tail.to_uppercase())
}
