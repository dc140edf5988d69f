// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! SQL files under `migrations/` are compiled in with refinery's
//! `embed_migrations!` and applied every time the database is opened.

use fitslot_core::FitslotError;
use tracing::debug;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply pending migrations; refinery records progress in `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), FitslotError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| FitslotError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        debug!(version = migration.version(), name = migration.name(), "migration applied");
    }
    Ok(())
}
