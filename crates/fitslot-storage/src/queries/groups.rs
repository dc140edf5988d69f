// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session group operations and `current_count` maintenance.
//!
//! `current_count` is derived data: every write that can change the number of
//! active bookings in a group calls [`refresh_count`] in the same transaction.

use fitslot_core::FitslotError;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::warn;

use crate::database::{Database, map_call_err, map_tr_err, sql_err};
use crate::models::{
    ACTIVE_STATUS_SQL, GROUP_COLUMNS, GroupDrift, SessionGroup, group_from_row, now_timestamp,
};
use crate::queries::time_slots::exists;

/// Create a group under an existing schedule. `current_count` always starts at zero.
pub async fn create_group(db: &Database, group: &SessionGroup) -> Result<(), FitslotError> {
    let group = group.clone();
    db.connection()
        .call(move |conn| -> Result<(), FitslotError> {
            let tx = conn.transaction().map_err(sql_err)?;
            if !exists(&tx, "schedules", &group.schedule_id)? {
                return Err(FitslotError::not_found("schedule", &group.schedule_id));
            }
            tx.execute(
                "INSERT INTO session_groups
                 (id, schedule_id, name, capacity, current_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                params![
                    group.id,
                    group.schedule_id,
                    group.name,
                    group.capacity,
                    group.created_at,
                    group.updated_at,
                ],
            )
            .map_err(sql_err)?;
            tx.commit().map_err(sql_err)
        })
        .await
        .map_err(map_call_err)
}

/// Get a group by ID.
pub async fn get_group(db: &Database, id: &str) -> Result<Option<SessionGroup>, FitslotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| get_in(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// List a schedule's groups by name.
pub async fn list_groups(
    db: &Database,
    schedule_id: &str,
) -> Result<Vec<SessionGroup>, FitslotError> {
    let schedule_id = schedule_id.to_string();
    db.connection()
        .call(move |conn| list_in(conn, &schedule_id))
        .await
        .map_err(map_tr_err)
}

/// Change a group's capacity.
///
/// Refused when the new capacity is below the group's active bookings, since
/// that would leave the group over capacity.
pub async fn set_group_capacity(
    db: &Database,
    id: &str,
    capacity: u32,
) -> Result<SessionGroup, FitslotError> {
    if capacity == 0 {
        return Err(FitslotError::Validation(
            "group capacity must be at least 1".into(),
        ));
    }
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<SessionGroup, FitslotError> {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sql_err)?;
            get_in(&tx, &id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("session group", &id))?;
            let active = count_active(&tx, &id).map_err(sql_err)?;
            if capacity < active {
                return Err(FitslotError::Validation(format!(
                    "session group {id} has {active} active bookings; capacity cannot drop to {capacity}"
                )));
            }
            tx.execute(
                "UPDATE session_groups SET capacity = ?1, current_count = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![capacity, active, now_timestamp(), id],
            )
            .map_err(sql_err)?;
            let updated = get_in(&tx, &id)
                .map_err(sql_err)?
                .ok_or_else(|| FitslotError::not_found("session group", &id))?;
            tx.commit().map_err(sql_err)?;
            Ok(updated)
        })
        .await
        .map_err(map_call_err)
}

/// Recompute every group's `current_count` from its bookings and report any drift.
pub async fn reconcile_group_counts(db: &Database) -> Result<Vec<GroupDrift>, FitslotError> {
    db.connection()
        .call(|conn| -> Result<Vec<GroupDrift>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let drift = {
                let sql = format!(
                    "SELECT g.id, g.current_count,
                            (SELECT COUNT(*) FROM bookings b
                             WHERE b.group_id = g.id AND b.{ACTIVE_STATUS_SQL}) AS actual
                     FROM session_groups g
                     ORDER BY g.id"
                );
                let mut stmt = tx.prepare(&sql)?;
                let rows = stmt.query_map([], |row| {
                    Ok(GroupDrift {
                        group_id: row.get(0)?,
                        recorded: row.get(1)?,
                        actual: row.get(2)?,
                    })
                })?;
                rows.filter(|r| r.as_ref().map_or(true, |d| d.recorded != d.actual))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let now = now_timestamp();
            for d in &drift {
                warn!(
                    group_id = %d.group_id,
                    recorded = d.recorded,
                    actual = d.actual,
                    "group count drift corrected"
                );
                tx.execute(
                    "UPDATE session_groups SET current_count = ?1, updated_at = ?2 WHERE id = ?3",
                    params![d.actual, now, d.group_id],
                )?;
            }
            tx.commit()?;
            Ok(drift)
        })
        .await
        .map_err(map_tr_err)
}

pub(crate) fn get_in(conn: &Connection, id: &str) -> rusqlite::Result<Option<SessionGroup>> {
    let sql = format!("SELECT {GROUP_COLUMNS} FROM session_groups WHERE id = ?1");
    conn.query_row(&sql, params![id], group_from_row).optional()
}

pub(crate) fn list_in(conn: &Connection, schedule_id: &str) -> rusqlite::Result<Vec<SessionGroup>> {
    let sql = format!(
        "SELECT {GROUP_COLUMNS} FROM session_groups WHERE schedule_id = ?1 ORDER BY name, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![schedule_id], group_from_row)?;
    rows.collect()
}

/// Active bookings in a group.
pub(crate) fn count_active(conn: &Connection, group_id: &str) -> rusqlite::Result<u32> {
    let sql = format!("SELECT COUNT(*) FROM bookings WHERE group_id = ?1 AND {ACTIVE_STATUS_SQL}");
    conn.query_row(&sql, params![group_id], |row| row.get(0))
}

/// Rewrite a group's `current_count` from its bookings.
pub(crate) fn refresh_count(conn: &Connection, group_id: &str) -> rusqlite::Result<()> {
    let sql = format!(
        "UPDATE session_groups
         SET current_count = (SELECT COUNT(*) FROM bookings WHERE group_id = ?1 AND {ACTIVE_STATUS_SQL}),
             updated_at = ?2
         WHERE id = ?1"
    );
    conn.execute(&sql, params![group_id, now_timestamp()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[tokio::test]
    async fn group_requires_existing_schedule() {
        let db = Database::open_in_memory().await.unwrap();
        let now = now_timestamp();
        let group = SessionGroup {
            id: "g".into(),
            schedule_id: "nope".into(),
            name: "A".into(),
            capacity: 4,
            current_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        let err = create_group(&db, &group).await.unwrap_err();
        assert!(matches!(err, FitslotError::NotFound { entity: "schedule", .. }));
    }

    #[tokio::test]
    async fn capacity_can_grow_and_shrink_to_zero_active() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 10).await;
        fixtures::add_group(&db, "g-a", "sched-1", 4).await;

        let grown = set_group_capacity(&db, "g-a", 8).await.unwrap();
        assert_eq!(grown.capacity, 8);
        let shrunk = set_group_capacity(&db, "g-a", 1).await.unwrap();
        assert_eq!(shrunk.capacity, 1);
        assert!(matches!(
            set_group_capacity(&db, "g-a", 0).await,
            Err(FitslotError::Validation(_))
        ));
        assert!(matches!(
            set_group_capacity(&db, "g-missing", 3).await,
            Err(FitslotError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn reconcile_reports_and_fixes_drift() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 10).await;
        fixtures::add_group(&db, "g-a", "sched-1", 4).await;
        fixtures::add_group(&db, "g-b", "sched-1", 4).await;

        // Corrupt one count behind the storage layer's back.
        db.connection()
            .call(|conn| {
                conn.execute(
                    "UPDATE session_groups SET current_count = 3 WHERE id = 'g-b'",
                    [],
                )
            })
            .await
            .unwrap();

        let drift = reconcile_group_counts(&db).await.unwrap();
        assert_eq!(
            drift,
            vec![GroupDrift {
                group_id: "g-b".into(),
                recorded: 3,
                actual: 0
            }]
        );
        assert!(reconcile_group_counts(&db).await.unwrap().is_empty());
        assert_eq!(get_group(&db, "g-b").await.unwrap().unwrap().current_count, 0);
    }

    #[tokio::test]
    async fn groups_list_by_name() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::seed(&db, 10).await;
        fixtures::add_group(&db, "z", "sched-1", 2).await;
        fixtures::add_group(&db, "a", "sched-1", 2).await;
        let names: Vec<_> = list_groups(&db, "sched-1")
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, ["Group a", "Group z"]);
    }
}
