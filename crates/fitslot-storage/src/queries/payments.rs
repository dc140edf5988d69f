// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment audit log: append and read only.

use fitslot_core::FitslotError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{
    NewPaymentEvent, PAYMENT_EVENT_COLUMNS, PaymentEvent, now_timestamp, payment_event_from_row,
};

/// Append a payment event and return its row id.
pub async fn record_payment_event(
    db: &Database,
    event: &NewPaymentEvent,
) -> Result<i64, FitslotError> {
    let booking_id = event.booking_id.clone();
    let kind = event.kind.to_string();
    let reference = event.reference.clone();
    let result_code = event.result_code;
    let detail = event.detail.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO payment_events
                 (booking_id, kind, reference, result_code, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![booking_id, kind, reference, result_code, detail, now_timestamp()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// A booking's payment events, oldest first.
pub async fn list_payment_events(
    db: &Database,
    booking_id: &str,
) -> Result<Vec<PaymentEvent>, FitslotError> {
    let booking_id = booking_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {PAYMENT_EVENT_COLUMNS} FROM payment_events WHERE booking_id = ?1 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![booking_id], payment_event_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
