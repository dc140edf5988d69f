// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session (class type) CRUD operations.

use fitslot_core::FitslotError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{SESSION_COLUMNS, Session, session_from_row};

/// Create a new session type.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), FitslotError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.id,
                    session.name,
                    session.description,
                    session.created_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by ID.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, FitslotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            match conn.query_row(&sql, params![id], session_from_row) {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
