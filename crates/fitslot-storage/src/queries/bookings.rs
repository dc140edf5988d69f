// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking reservation and lifecycle.
//!
//! Every capacity-sensitive write runs as one `BEGIN IMMEDIATE` transaction on
//! the single writer thread: counts are read and the booking written without
//! any other writer interleaving. The V2 triggers reject the same writes again
//! at the database level.

use fitslot_core::FitslotError;
use fitslot_core::types::{BookingStatus, CapacityScope, GroupAvailability, PaymentStatus};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use crate::database::{Database, constraint_message, map_call_err, map_tr_err, sql_err};
use crate::models::{
    ACTIVE_STATUS_SQL, BOOKING_COLUMNS, Booking, BookingParty, NewBooking, PaymentUpdate,
    Reservation, SlotAvailability, booking_from_row, now_timestamp,
};
use crate::queries::{groups, time_slots};

/// Reserve one seat, enforcing slot capacity, group capacity, and holder uniqueness.
pub async fn reserve_booking(
    db: &Database,
    booking: &NewBooking,
) -> Result<Reservation, FitslotError> {
    let booking = booking.clone();
    db.connection()
        .call(move |conn| reserve_in_tx(conn, &booking))
        .await
        .map_err(map_call_err)
}

fn reserve_in_tx(conn: &mut Connection, new: &NewBooking) -> Result<Reservation, FitslotError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(sql_err)?;

    if let Some(key) = &new.idempotency_key {
        if let Some(existing) = find_by(&tx, "idempotency_key", key).map_err(sql_err)? {
            if existing.time_slot_id != new.time_slot_id {
                return Err(FitslotError::Validation(format!(
                    "idempotency key {key} was already used for another time slot"
                )));
            }
            // A replay must come from the same holder; otherwise the key would
            // hand out someone else's booking.
            if existing.party != new.party || existing.group_id != new.group_id {
                return Err(FitslotError::Validation(format!(
                    "idempotency key {key} was already used for a different booking"
                )));
            }
            debug!(booking_id = %existing.id, "idempotent replay");
            return Ok(Reservation::Replayed(existing));
        }
    }

    let slot = time_slots::get_in(&tx, &new.time_slot_id)
        .map_err(sql_err)?
        .ok_or_else(|| FitslotError::not_found("time slot", &new.time_slot_id))?;

    let group = match &new.group_id {
        Some(group_id) => {
            let group = groups::get_in(&tx, group_id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("session group", group_id))?;
            if group.schedule_id != slot.schedule_id {
                return Err(FitslotError::Validation(format!(
                    "session group {} does not belong to schedule {}",
                    group.id, slot.schedule_id
                )));
            }
            Some(group)
        }
        None => None,
    };

    if let Some(existing_id) = active_holder_booking(&tx, &slot.id, &new.party)? {
        return Err(FitslotError::DuplicateBooking { existing_id });
    }

    let slot_active = count_active_in_slot(&tx, &slot.id).map_err(sql_err)?;
    if slot_active >= slot.capacity {
        return Err(FitslotError::CapacityExceeded {
            scope: CapacityScope::TimeSlot,
            id: slot.id,
            capacity: slot.capacity,
        });
    }
    if let Some(group) = &group {
        let group_active = groups::count_active(&tx, &group.id).map_err(sql_err)?;
        if group_active >= group.capacity {
            return Err(FitslotError::CapacityExceeded {
                scope: CapacityScope::Group,
                id: group.id.clone(),
                capacity: group.capacity,
            });
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let guest = new.party.guest();
    tx.execute(
        "INSERT INTO bookings
         (id, time_slot_id, group_id, user_id, guest_name, guest_email, guest_phone,
          status, payment_status, idempotency_key, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'booked', 'unpaid', ?8, ?9, ?9)",
        params![
            id,
            slot.id,
            new.group_id,
            new.party.user_id(),
            guest.map(|g| g.name.as_str()),
            guest.and_then(|g| g.email.as_deref()),
            guest.and_then(|g| g.phone.as_deref()),
            new.idempotency_key,
            now,
        ],
    )
    .map_err(|e| classify_insert_error(e, &slot.id, slot.capacity, group.as_ref()))?;

    if let Some(group) = &group {
        groups::refresh_count(&tx, &group.id).map_err(sql_err)?;
    }

    let created = find_by(&tx, "id", &id)
        .map_err(sql_err)?
        .ok_or_else(|| FitslotError::Internal(format!("booking {id} vanished after insert")))?;
    tx.commit().map_err(sql_err)?;
    Ok(Reservation::Created(created))
}

/// Map a trigger or unique-index failure on insert to the domain error it stands for.
fn classify_insert_error(
    e: rusqlite::Error,
    slot_id: &str,
    slot_capacity: u32,
    group: Option<&crate::models::SessionGroup>,
) -> FitslotError {
    let Some(message) = constraint_message(&e) else {
        return sql_err(e);
    };
    if message.contains("time slot capacity exceeded") {
        FitslotError::CapacityExceeded {
            scope: CapacityScope::TimeSlot,
            id: slot_id.to_string(),
            capacity: slot_capacity,
        }
    } else if let (true, Some(group)) = (message.contains("group capacity exceeded"), group) {
        FitslotError::CapacityExceeded {
            scope: CapacityScope::Group,
            id: group.id.clone(),
            capacity: group.capacity,
        }
    } else if message.contains("bookings.idempotency_key") {
        FitslotError::Validation("idempotency key already in use".into())
    } else if message.contains("UNIQUE") {
        FitslotError::DuplicateBooking {
            existing_id: String::new(),
        }
    } else {
        sql_err(e)
    }
}

/// Get a booking by ID.
pub async fn get_booking(db: &Database, id: &str) -> Result<Option<Booking>, FitslotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| find_by(conn, "id", &id))
        .await
        .map_err(map_tr_err)
}

/// Find the booking an STK push was issued for.
pub async fn find_booking_by_checkout(
    db: &Database,
    checkout_request_id: &str,
) -> Result<Option<Booking>, FitslotError> {
    let checkout_request_id = checkout_request_id.to_string();
    db.connection()
        .call(move |conn| find_by(conn, "checkout_request_id", &checkout_request_id))
        .await
        .map_err(map_tr_err)
}

/// Find the booking a payment receipt confirmed.
pub async fn find_booking_by_reference(
    db: &Database,
    payment_reference: &str,
) -> Result<Option<Booking>, FitslotError> {
    let payment_reference = payment_reference.to_string();
    db.connection()
        .call(move |conn| find_by(conn, "payment_reference", &payment_reference))
        .await
        .map_err(map_tr_err)
}

/// List a slot's bookings in creation order, optionally filtered by status.
pub async fn list_bookings_for_slot(
    db: &Database,
    time_slot_id: &str,
    status: Option<BookingStatus>,
) -> Result<Vec<Booking>, FitslotError> {
    let time_slot_id = time_slot_id.to_string();
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE time_slot_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![time_slot_id, status], booking_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Move a booking to `to`, writing optional payment fields in the same transaction.
///
/// The transition table lives in [`BookingStatus::can_transition_to`]. A paid
/// booking that is cancelled without an explicit payment status becomes
/// `refund_due`.
pub async fn transition_booking(
    db: &Database,
    id: &str,
    to: BookingStatus,
    payment: Option<PaymentUpdate>,
) -> Result<Booking, FitslotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Booking, FitslotError> {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sql_err)?;
            let current = find_by(&tx, "id", &id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("booking", &id))?;
            if !current.status.can_transition_to(to) {
                return Err(FitslotError::InvalidTransition {
                    from: current.status,
                    to,
                });
            }

            let mut payment = payment.unwrap_or_default();
            if to == BookingStatus::Cancelled
                && payment.status.is_none()
                && current.payment_status == PaymentStatus::Paid
            {
                payment.status = Some(PaymentStatus::RefundDue);
            }

            write_update(&tx, &current, Some(to), &payment)?;
            if let Some(group_id) = &current.group_id {
                groups::refresh_count(&tx, group_id).map_err(sql_err)?;
            }
            let updated = find_by(&tx, "id", &id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("booking", &id))?;
            tx.commit().map_err(sql_err)?;
            debug!(booking_id = %id, from = %current.status, to = %to, "booking transitioned");
            Ok(updated)
        })
        .await
        .map_err(map_call_err)
}

/// Write payment fields without changing the booking status.
pub async fn update_payment(
    db: &Database,
    id: &str,
    payment: &PaymentUpdate,
) -> Result<Booking, FitslotError> {
    write_payment(db, id, payment, false).await
}

/// Like [`update_payment`], but leaves a booking whose payment is already
/// `paid` or `refund_due` untouched and returns it as stored.
///
/// The settled check and the write share one transaction, so a settlement
/// committed between a caller's read and this write is never overwritten.
pub async fn update_payment_unless_settled(
    db: &Database,
    id: &str,
    payment: &PaymentUpdate,
) -> Result<Booking, FitslotError> {
    write_payment(db, id, payment, true).await
}

async fn write_payment(
    db: &Database,
    id: &str,
    payment: &PaymentUpdate,
    keep_settled: bool,
) -> Result<Booking, FitslotError> {
    let id = id.to_string();
    let payment = payment.clone();
    db.connection()
        .call(move |conn| -> Result<Booking, FitslotError> {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sql_err)?;
            let current = find_by(&tx, "id", &id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("booking", &id))?;
            if keep_settled
                && matches!(
                    current.payment_status,
                    PaymentStatus::Paid | PaymentStatus::RefundDue
                )
            {
                debug!(booking_id = %id, payment_status = %current.payment_status, "payment already settled");
                return Ok(current);
            }
            write_update(&tx, &current, None, &payment)?;
            let updated = find_by(&tx, "id", &id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("booking", &id))?;
            tx.commit().map_err(sql_err)?;
            Ok(updated)
        })
        .await
        .map_err(map_call_err)
}

/// Apply a status and/or payment change to `current`, guarding receipt and checkout uniqueness.
fn write_update(
    conn: &Connection,
    current: &Booking,
    status: Option<BookingStatus>,
    payment: &PaymentUpdate,
) -> Result<(), FitslotError> {
    if let Some(reference) = &payment.reference {
        if let Some(other) = find_by(conn, "payment_reference", reference).map_err(sql_err)? {
            if other.id != current.id {
                return Err(FitslotError::ReferenceInUse {
                    reference: reference.clone(),
                    booking_id: other.id,
                });
            }
        }
    }
    if let Some(checkout) = &payment.checkout_request_id {
        if let Some(other) = find_by(conn, "checkout_request_id", checkout).map_err(sql_err)? {
            if other.id != current.id {
                return Err(FitslotError::Validation(format!(
                    "checkout request {checkout} belongs to booking {}",
                    other.id
                )));
            }
        }
    }

    conn.execute(
        "UPDATE bookings SET
             status = COALESCE(?1, status),
             payment_status = COALESCE(?2, payment_status),
             payment_reference = COALESCE(?3, payment_reference),
             checkout_request_id = COALESCE(?4, checkout_request_id),
             updated_at = ?5
         WHERE id = ?6",
        params![
            status.map(|s| s.to_string()),
            payment.status.map(|s| s.to_string()),
            payment.reference,
            payment.checkout_request_id,
            now_timestamp(),
            current.id,
        ],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Seats left in a slot and in each group of its schedule, read in one snapshot.
pub async fn slot_availability(
    db: &Database,
    time_slot_id: &str,
) -> Result<SlotAvailability, FitslotError> {
    let time_slot_id = time_slot_id.to_string();
    db.connection()
        .call(move |conn| -> Result<SlotAvailability, FitslotError> {
            let tx = conn.transaction().map_err(sql_err)?;
            let slot = time_slots::get_in(&tx, &time_slot_id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("time slot", &time_slot_id))?;
            let active = count_active_in_slot(&tx, &slot.id).map_err(sql_err)?;
            let groups = groups::list_in(&tx, &slot.schedule_id)
                .map_err(sql_err)?
                .into_iter()
                .map(|g| GroupAvailability {
                    remaining: g.capacity.saturating_sub(g.current_count),
                    group_id: g.id,
                    name: g.name,
                    capacity: g.capacity,
                    current_count: g.current_count,
                })
                .collect();
            Ok(SlotAvailability {
                time_slot_id: slot.id,
                capacity: slot.capacity,
                active,
                remaining: slot.capacity.saturating_sub(active),
                groups,
            })
        })
        .await
        .map_err(map_call_err)
}

/// Booking lookup by a single column. `column` is always a literal.
pub(crate) fn find_by(
    conn: &Connection,
    column: &str,
    value: &str,
) -> rusqlite::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE {column} = ?1");
    conn.query_row(&sql, params![value], booking_from_row)
        .optional()
}

/// Active bookings in a slot, across all groups.
pub(crate) fn count_active_in_slot(conn: &Connection, slot_id: &str) -> rusqlite::Result<u32> {
    let sql =
        format!("SELECT COUNT(*) FROM bookings WHERE time_slot_id = ?1 AND {ACTIVE_STATUS_SQL}");
    conn.query_row(&sql, params![slot_id], |row| row.get(0))
}

/// ID of an active booking the same holder already has in the slot.
fn active_holder_booking(
    conn: &Connection,
    slot_id: &str,
    party: &BookingParty,
) -> Result<Option<String>, FitslotError> {
    let found = match party {
        BookingParty::Registered { user_id } => {
            let sql = format!(
                "SELECT id FROM bookings
                 WHERE time_slot_id = ?1 AND user_id = ?2 AND {ACTIVE_STATUS_SQL} LIMIT 1"
            );
            conn.query_row(&sql, params![slot_id, user_id], |row| row.get(0))
                .optional()
        }
        BookingParty::Guest(contact) => {
            let sql = format!(
                "SELECT id FROM bookings
                 WHERE time_slot_id = ?1 AND user_id IS NULL AND {ACTIVE_STATUS_SQL}
                   AND ((?2 IS NOT NULL AND guest_email = ?2) OR (?3 IS NOT NULL AND guest_phone = ?3))
                 LIMIT 1"
            );
            conn.query_row(
                &sql,
                params![slot_id, contact.email, contact.phone],
                |row| row.get(0),
            )
            .optional()
        }
    };
    found.map_err(sql_err)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::GuestContact;
    use crate::queries::fixtures;

    fn registered(slot: &str, user: &str) -> NewBooking {
        NewBooking {
            time_slot_id: slot.into(),
            group_id: None,
            party: BookingParty::Registered {
                user_id: user.into(),
            },
            idempotency_key: None,
        }
    }

    fn guest(slot: &str, email: &str) -> NewBooking {
        NewBooking {
            time_slot_id: slot.into(),
            group_id: None,
            party: BookingParty::Guest(GuestContact {
                name: "Guest".into(),
                email: Some(email.into()),
                phone: None,
            }),
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn reserve_until_slot_is_full() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 2).await;

        let first = reserve_booking(&db, &registered("slot-1", "u1")).await.unwrap();
        assert!(!first.is_replay());
        assert_eq!(first.booking().status, BookingStatus::Booked);
        assert_eq!(first.booking().payment_status, PaymentStatus::Unpaid);
        reserve_booking(&db, &guest("slot-1", "g@example.com"))
            .await
            .unwrap();

        let err = reserve_booking(&db, &registered("slot-1", "u3"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FitslotError::CapacityExceeded {
                scope: CapacityScope::TimeSlot,
                capacity: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn group_capacity_is_enforced_and_counted() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 10).await;
        fixtures::add_group(&db, "g-a", "sched-1", 1).await;

        let mut req = registered("slot-1", "u1");
        req.group_id = Some("g-a".into());
        reserve_booking(&db, &req).await.unwrap();
        assert_eq!(
            groups::get_group(&db, "g-a").await.unwrap().unwrap().current_count,
            1
        );

        let mut req = registered("slot-1", "u2");
        req.group_id = Some("g-a".into());
        let err = reserve_booking(&db, &req).await.unwrap_err();
        assert!(matches!(
            err,
            FitslotError::CapacityExceeded {
                scope: CapacityScope::Group,
                ..
            }
        ));

        // Same slot, no group: still fits in the slot.
        reserve_booking(&db, &registered("slot-1", "u2")).await.unwrap();
    }

    #[tokio::test]
    async fn group_from_other_schedule_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 10).await;
        crate::queries::schedules::create_schedule(
            &db,
            &crate::models::Schedule {
                id: "sched-2".into(),
                date: "2026-03-15".into(),
                title: None,
                created_at: now_timestamp(),
            },
        )
        .await
        .unwrap();
        fixtures::add_group(&db, "g-other", "sched-2", 5).await;

        let mut req = registered("slot-1", "u1");
        req.group_id = Some("g-other".into());
        assert!(matches!(
            reserve_booking(&db, &req).await,
            Err(FitslotError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn same_holder_cannot_book_twice() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 10).await;

        let first = reserve_booking(&db, &registered("slot-1", "u1")).await.unwrap();
        let err = reserve_booking(&db, &registered("slot-1", "u1"))
            .await
            .unwrap_err();
        match err {
            FitslotError::DuplicateBooking { existing_id } => {
                assert_eq!(existing_id, first.booking().id)
            }
            other => panic!("expected DuplicateBooking, got {other:?}"),
        }

        reserve_booking(&db, &guest("slot-1", "a@example.com"))
            .await
            .unwrap();
        assert!(matches!(
            reserve_booking(&db, &guest("slot-1", "a@example.com")).await,
            Err(FitslotError::DuplicateBooking { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_holder_may_book_again() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 1).await;

        let first = reserve_booking(&db, &registered("slot-1", "u1")).await.unwrap();
        transition_booking(&db, &first.booking().id, BookingStatus::Cancelled, None)
            .await
            .unwrap();
        let again = reserve_booking(&db, &registered("slot-1", "u1")).await.unwrap();
        assert_ne!(again.booking().id, first.booking().id);
    }

    #[tokio::test]
    async fn idempotency_key_replays_without_consuming_capacity() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 1).await;

        let mut req = registered("slot-1", "u1");
        req.idempotency_key = Some("key-1".into());
        let first = reserve_booking(&db, &req).await.unwrap();
        let replay = reserve_booking(&db, &req).await.unwrap();
        assert!(replay.is_replay());
        assert_eq!(replay.booking().id, first.booking().id);

        let active = list_bookings_for_slot(&db, "slot-1", Some(BookingStatus::Booked))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn idempotency_key_cannot_move_slots() {
        let db = Database::open_in_memory().await.unwrap();
        let slot = fixtures::seed(&db, 5).await;
        time_slots::create_time_slot(
            &db,
            &crate::models::TimeSlot {
                id: "slot-2".into(),
                start_time: "09:00".into(),
                end_time: "10:00".into(),
                ..slot
            },
        )
        .await
        .unwrap();

        let mut req = registered("slot-1", "u1");
        req.idempotency_key = Some("k".into());
        reserve_booking(&db, &req).await.unwrap();
        req.time_slot_id = "slot-2".into();
        assert!(matches!(
            reserve_booking(&db, &req).await,
            Err(FitslotError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancel_frees_seat_and_group_count() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 1).await;
        fixtures::add_group(&db, "g-a", "sched-1", 1).await;

        let mut req = registered("slot-1", "u1");
        req.group_id = Some("g-a".into());
        let booking = reserve_booking(&db, &req).await.unwrap().into_booking();
        transition_booking(&db, &booking.id, BookingStatus::Cancelled, None)
            .await
            .unwrap();
        assert_eq!(
            groups::get_group(&db, "g-a").await.unwrap().unwrap().current_count,
            0
        );

        let mut req = registered("slot-1", "u2");
        req.group_id = Some("g-a".into());
        reserve_booking(&db, &req).await.unwrap();
    }

    #[tokio::test]
    async fn availability_reflects_slot_and_groups() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 4).await;
        fixtures::add_group(&db, "g-a", "sched-1", 2).await;

        let mut req = registered("slot-1", "u1");
        req.group_id = Some("g-a".into());
        reserve_booking(&db, &req).await.unwrap();
        reserve_booking(&db, &registered("slot-1", "u2")).await.unwrap();

        let avail = slot_availability(&db, "slot-1").await.unwrap();
        assert_eq!((avail.capacity, avail.active, avail.remaining), (4, 2, 2));
        assert_eq!(avail.groups.len(), 1);
        assert_eq!(avail.groups[0].current_count, 1);
        assert_eq!(avail.groups[0].remaining, 1);
        assert!(matches!(
            slot_availability(&db, "nope").await,
            Err(FitslotError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn terminal_bookings_cannot_move() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 3).await;
        let booking = reserve_booking(&db, &registered("slot-1", "u1"))
            .await
            .unwrap()
            .into_booking();
        transition_booking(&db, &booking.id, BookingStatus::Missed, None)
            .await
            .unwrap();
        let err = transition_booking(&db, &booking.id, BookingStatus::Booked, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FitslotError::InvalidTransition {
                from: BookingStatus::Missed,
                to: BookingStatus::Booked
            }
        ));
    }

    #[tokio::test]
    async fn receipt_confirms_only_one_booking() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 3).await;
        let a = reserve_booking(&db, &registered("slot-1", "u1"))
            .await
            .unwrap()
            .into_booking();
        let b = reserve_booking(&db, &registered("slot-1", "u2"))
            .await
            .unwrap()
            .into_booking();

        let paid = PaymentUpdate {
            status: Some(PaymentStatus::Paid),
            reference: Some("QKX123".into()),
            checkout_request_id: None,
        };
        let done = transition_booking(&db, &a.id, BookingStatus::Completed, Some(paid.clone()))
            .await
            .unwrap();
        assert_eq!(done.payment_reference.as_deref(), Some("QKX123"));
        assert_eq!(
            find_booking_by_reference(&db, "QKX123").await.unwrap().unwrap().id,
            a.id
        );

        let err = transition_booking(&db, &b.id, BookingStatus::Completed, Some(paid))
            .await
            .unwrap_err();
        assert!(
            matches!(err, FitslotError::ReferenceInUse { ref booking_id, .. } if *booking_id == a.id)
        );
        // The failed transition left b untouched.
        let b = get_booking(&db, &b.id).await.unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Booked);
    }

    #[tokio::test]
    async fn cancelling_paid_booking_marks_refund_due() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 3).await;
        let booking = reserve_booking(&db, &registered("slot-1", "u1"))
            .await
            .unwrap()
            .into_booking();
        transition_booking(
            &db,
            &booking.id,
            BookingStatus::Completed,
            Some(PaymentUpdate {
                status: Some(PaymentStatus::Paid),
                reference: Some("R1".into()),
                checkout_request_id: None,
            }),
        )
        .await
        .unwrap();
        let cancelled = transition_booking(&db, &booking.id, BookingStatus::Cancelled, None)
            .await
            .unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::RefundDue);
        assert_eq!(cancelled.payment_reference.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn update_payment_keeps_status_and_finds_by_checkout() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 3).await;
        let booking = reserve_booking(&db, &registered("slot-1", "u1"))
            .await
            .unwrap()
            .into_booking();
        let updated = update_payment(
            &db,
            &booking.id,
            &PaymentUpdate {
                status: Some(PaymentStatus::Pending),
                reference: None,
                checkout_request_id: Some("ws_CO_1".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, BookingStatus::Booked);
        assert_eq!(updated.payment_status, PaymentStatus::Pending);
        let found = find_booking_by_checkout(&db, "ws_CO_1").await.unwrap().unwrap();
        assert_eq!(found.id, booking.id);
        assert!(matches!(
            update_payment(&db, "nope", &PaymentUpdate::default()).await,
            Err(FitslotError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn guarded_payment_write_keeps_settled_payment() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 3).await;
        let booking = reserve_booking(&db, &registered("slot-1", "u1"))
            .await
            .unwrap()
            .into_booking();
        let failed = PaymentUpdate {
            status: Some(PaymentStatus::Failed),
            reference: None,
            checkout_request_id: Some("ws_CO_9".into()),
        };

        let unsettled = update_payment_unless_settled(&db, &booking.id, &failed)
            .await
            .unwrap();
        assert_eq!(unsettled.payment_status, PaymentStatus::Failed);

        transition_booking(
            &db,
            &booking.id,
            BookingStatus::Completed,
            Some(PaymentUpdate {
                status: Some(PaymentStatus::Paid),
                reference: Some("QRCPT00001".into()),
                checkout_request_id: None,
            }),
        )
        .await
        .unwrap();

        let kept = update_payment_unless_settled(&db, &booking.id, &failed)
            .await
            .unwrap();
        assert_eq!(kept.status, BookingStatus::Completed);
        assert_eq!(kept.payment_status, PaymentStatus::Paid);
        assert_eq!(kept.payment_reference.as_deref(), Some("QRCPT00001"));
    }

    #[tokio::test]
    async fn idempotency_key_is_not_shared_across_holders() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 3).await;
        let alice = NewBooking {
            time_slot_id: "slot-1".into(),
            group_id: None,
            party: BookingParty::Guest(GuestContact {
                name: "Alice".into(),
                email: Some("alice@example.com".into()),
                phone: Some("254712345678".into()),
            }),
            idempotency_key: Some("1".into()),
        };
        let first = reserve_booking(&db, &alice).await.unwrap();
        assert!(!first.is_replay());

        let mut bob = registered("slot-1", "bob");
        bob.idempotency_key = Some("1".into());
        assert!(matches!(
            reserve_booking(&db, &bob).await,
            Err(FitslotError::Validation(_))
        ));

        let replay = reserve_booking(&db, &alice).await.unwrap();
        assert!(replay.is_replay());
        assert_eq!(replay.booking().id, first.booking().id);
        assert_eq!(slot_availability(&db, "slot-1").await.unwrap().active, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reservations_never_overbook() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        fixtures::seed(&db, 5).await;
        fixtures::add_group(&db, "g-a", "sched-1", 3).await;

        let attempts = (0..40).map(|i| {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                let mut req = registered("slot-1", &format!("user-{i}"));
                if i % 2 == 0 {
                    req.group_id = Some("g-a".into());
                }
                reserve_booking(&db, &req).await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let created = results
            .iter()
            .filter(|r| matches!(r, Ok(Ok(Reservation::Created(_)))))
            .count();
        assert_eq!(created, 5);
        for r in &results {
            match r {
                Ok(Ok(_)) | Ok(Err(FitslotError::CapacityExceeded { .. })) => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        let in_group = list_bookings_for_slot(&db, "slot-1", None)
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.group_id.as_deref() == Some("g-a"))
            .count();
        assert!(in_group <= 3);
        let group = groups::get_group(&db, "g-a").await.unwrap().unwrap();
        assert_eq!(group.current_count as usize, in_group);
    }

    #[tokio::test]
    async fn triggers_reject_raw_overbooking() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 1).await;
        reserve_booking(&db, &registered("slot-1", "u1")).await.unwrap();

        let raw = db
            .connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO bookings (id, time_slot_id, user_id, created_at, updated_at)
                     VALUES ('raw', 'slot-1', 'intruder', 'x', 'x')",
                    [],
                )
            })
            .await;
        let message = match raw {
            Err(tokio_rusqlite::Error::Error(e)) => e.to_string(),
            other => panic!("expected trigger failure, got {other:?}"),
        };
        assert!(message.contains("time slot capacity exceeded"), "{message}");
    }

    #[tokio::test]
    async fn triggers_reject_raw_reactivation() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 2).await;
        let booking = reserve_booking(&db, &registered("slot-1", "u1"))
            .await
            .unwrap()
            .into_booking();
        transition_booking(&db, &booking.id, BookingStatus::Cancelled, None)
            .await
            .unwrap();

        let id = booking.id.clone();
        let raw = db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE bookings SET status = 'booked' WHERE id = ?1",
                    params![id],
                )
            })
            .await;
        assert!(raw.is_err());
    }
}
