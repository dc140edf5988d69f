// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities, plus their row mappings.
//!
//! The canonical types live in `fitslot-core::types` so they can cross
//! adapter trait boundaries. This module re-exports them and knows how each
//! one is laid out in a SQLite row.

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

pub use fitslot_core::types::{
    Booking, BookingParty, GroupDrift, GuestContact, NewBooking, NewPaymentEvent, PaymentEvent,
    PaymentUpdate, Reservation, Schedule, Session, SessionGroup, SlotAvailability, TimeSlot,
};

/// SQL fragment matching a booking that occupies a seat.
pub(crate) const ACTIVE_STATUS_SQL: &str = "status IN ('booked', 'completed')";

pub(crate) const SCHEDULE_COLUMNS: &str = "id, date, title, created_at";

pub(crate) const SESSION_COLUMNS: &str = "id, name, description, created_at";

pub(crate) const TIME_SLOT_COLUMNS: &str =
    "id, schedule_id, session_id, start_time, end_time, capacity, price_kes, created_at";

pub(crate) const GROUP_COLUMNS: &str =
    "id, schedule_id, name, capacity, current_count, created_at, updated_at";

pub(crate) const BOOKING_COLUMNS: &str = "id, time_slot_id, group_id, user_id, guest_name, \
     guest_email, guest_phone, status, payment_status, payment_reference, checkout_request_id, \
     idempotency_key, created_at, updated_at";

pub(crate) const PAYMENT_EVENT_COLUMNS: &str =
    "id, booking_id, kind, reference, result_code, detail, created_at";

/// Current time in the format the schema's defaults use.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Read a TEXT column into a strum-parsed enum.
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        date: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn time_slot_from_row(row: &Row<'_>) -> rusqlite::Result<TimeSlot> {
    Ok(TimeSlot {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        session_id: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        capacity: row.get(5)?,
        price_kes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn group_from_row(row: &Row<'_>) -> rusqlite::Result<SessionGroup> {
    Ok(SessionGroup {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        name: row.get(2)?,
        capacity: row.get(3)?,
        current_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    let user_id: Option<String> = row.get(3)?;
    let party = match user_id {
        Some(user_id) => BookingParty::Registered { user_id },
        None => BookingParty::Guest(GuestContact {
            name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            email: row.get(5)?,
            phone: row.get(6)?,
        }),
    };
    Ok(Booking {
        id: row.get(0)?,
        time_slot_id: row.get(1)?,
        group_id: row.get(2)?,
        party,
        status: parse_column(row, 7)?,
        payment_status: parse_column(row, 8)?,
        payment_reference: row.get(9)?,
        checkout_request_id: row.get(10)?,
        idempotency_key: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) fn payment_event_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentEvent> {
    Ok(PaymentEvent {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        kind: parse_column(row, 2)?,
        reference: row.get(3)?,
        result_code: row.get(4)?,
        detail: row.get(5)?,
        created_at: row.get(6)?,
    })
}
