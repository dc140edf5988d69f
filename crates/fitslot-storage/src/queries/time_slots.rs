// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time slot operations.

use fitslot_core::FitslotError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_call_err, map_tr_err, sql_err};
use crate::models::{TIME_SLOT_COLUMNS, TimeSlot, time_slot_from_row};

/// Create a time slot under an existing schedule and session.
pub async fn create_time_slot(db: &Database, slot: &TimeSlot) -> Result<(), FitslotError> {
    let slot = slot.clone();
    db.connection()
        .call(move |conn| -> Result<(), FitslotError> {
            let tx = conn.transaction().map_err(sql_err)?;
            if !exists(&tx, "schedules", &slot.schedule_id)? {
                return Err(FitslotError::not_found("schedule", &slot.schedule_id));
            }
            if !exists(&tx, "sessions", &slot.session_id)? {
                return Err(FitslotError::not_found("session", &slot.session_id));
            }
            tx.execute(
                "INSERT INTO schedule_time_slots
                 (id, schedule_id, session_id, start_time, end_time, capacity, price_kes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    slot.id,
                    slot.schedule_id,
                    slot.session_id,
                    slot.start_time,
                    slot.end_time,
                    slot.capacity,
                    slot.price_kes,
                    slot.created_at,
                ],
            )
            .map_err(sql_err)?;
            tx.commit().map_err(sql_err)
        })
        .await
        .map_err(map_call_err)
}

/// Get a time slot by ID.
pub async fn get_time_slot(db: &Database, id: &str) -> Result<Option<TimeSlot>, FitslotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| get_in(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// List a schedule's slots in start-time order.
pub async fn list_time_slots(
    db: &Database,
    schedule_id: &str,
) -> Result<Vec<TimeSlot>, FitslotError> {
    let schedule_id = schedule_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {TIME_SLOT_COLUMNS} FROM schedule_time_slots
                 WHERE schedule_id = ?1 ORDER BY start_time, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![schedule_id], time_slot_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Slot lookup usable inside an open transaction.
pub(crate) fn get_in(conn: &Connection, id: &str) -> rusqlite::Result<Option<TimeSlot>> {
    let sql = format!("SELECT {TIME_SLOT_COLUMNS} FROM schedule_time_slots WHERE id = ?1");
    conn.query_row(&sql, params![id], time_slot_from_row)
        .optional()
}

/// Whether `table` has a row with primary key `id`. `table` is always a literal.
pub(crate) fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool, FitslotError> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)");
    conn.query_row(&sql, params![id], |row| row.get(0))
        .map_err(sql_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[tokio::test]
    async fn slots_list_in_start_order() {
        let db = Database::open_in_memory().await.unwrap();
        let first = fixtures::seed(&db, 10).await;
        let early = TimeSlot {
            id: "slot-0".into(),
            start_time: "06:00".into(),
            end_time: "06:45".into(),
            ..first.clone()
        };
        create_time_slot(&db, &early).await.unwrap();

        let slots = list_time_slots(&db, "sched-1").await.unwrap();
        let ids: Vec<_> = slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["slot-0", "slot-1"]);
        assert_eq!(get_time_slot(&db, "slot-1").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn unknown_parent_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let slot = fixtures::seed(&db, 10).await;
        let orphan = TimeSlot {
            id: "slot-x".into(),
            session_id: "no-such-session".into(),
            ..slot
        };
        let err = create_time_slot(&db, &orphan).await.unwrap_err();
        assert!(matches!(err, FitslotError::NotFound { entity: "session", .. }));
    }

    #[tokio::test]
    async fn end_before_start_violates_check() {
        let db = Database::open_in_memory().await.unwrap();
        let slot = fixtures::seed(&db, 10).await;
        let backwards = TimeSlot {
            id: "slot-b".into(),
            start_time: "09:00".into(),
            end_time: "08:00".into(),
            ..slot
        };
        assert!(create_time_slot(&db, &backwards).await.is_err());
    }
}
