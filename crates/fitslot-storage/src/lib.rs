// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Fitslot booking service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for the
//! catalogue (schedules, sessions, time slots, groups), bookings, and the
//! payment audit log.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use models::*;
