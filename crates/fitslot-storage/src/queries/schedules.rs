// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedule CRUD operations.

use fitslot_core::FitslotError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{SCHEDULE_COLUMNS, Schedule, schedule_from_row};

/// Create a new schedule.
pub async fn create_schedule(db: &Database, schedule: &Schedule) -> Result<(), FitslotError> {
    let schedule = schedule.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO schedules (id, date, title, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![schedule.id, schedule.date, schedule.title, schedule.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a schedule by ID.
pub async fn get_schedule(db: &Database, id: &str) -> Result<Option<Schedule>, FitslotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1");
            match conn.query_row(&sql, params![id], schedule_from_row) {
                Ok(schedule) => Ok(Some(schedule)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
