// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` opens a fresh SQLite database in a temp directory, wires a
//! [`MockPaymentVerifier`], and offers helpers to seed the catalogue.

use std::sync::Arc;

use fitslot_config::model::{BookingConfig, FitslotConfig, StorageConfig};
use fitslot_core::types::{Schedule, Session, SessionGroup, TimeSlot};
use fitslot_core::{FitslotError, PaymentVerifier, StorageAdapter};
use fitslot_storage::SqliteStorage;

use crate::mock_verifier::MockPaymentVerifier;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    booking: BookingConfig,
    bearer_token: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            booking: BookingConfig::default(),
            bearer_token: Some("test-token".to_string()),
        }
    }

    /// Reject bookings without a registered user.
    pub fn without_guest_bookings(mut self) -> Self {
        self.booking.allow_guest_bookings = false;
        self
    }

    /// Capacity used when a slot is created without one.
    pub fn with_default_slot_capacity(mut self, capacity: u32) -> Self {
        self.booking.default_slot_capacity = capacity;
        self
    }

    /// Bearer token placed in the gateway config.
    pub fn with_bearer_token(mut self, token: Option<&str>) -> Self {
        self.bearer_token = token.map(str::to_string);
        self
    }

    /// Build the test harness, creating the temp database.
    pub async fn build(self) -> Result<TestHarness, FitslotError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| FitslotError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        };
        let storage = Arc::new(SqliteStorage::new(storage_config.clone()));
        storage.initialize().await?;

        let mut config = FitslotConfig {
            storage: storage_config,
            booking: self.booking,
            ..FitslotConfig::default()
        };
        config.gateway.bearer_token = self.bearer_token;

        Ok(TestHarness {
            storage,
            verifier: Arc::new(MockPaymentVerifier::new()),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A test environment with temp storage and a scripted payment verifier.
pub struct TestHarness {
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// The scripted payment verifier.
    pub verifier: Arc<MockPaymentVerifier>,
    /// Configuration matching the harness setup.
    pub config: FitslotConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Storage as a trait object.
    pub fn storage_adapter(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }

    /// Verifier as a trait object.
    pub fn payment_verifier(&self) -> Arc<dyn PaymentVerifier> {
        self.verifier.clone()
    }

    /// Create a schedule, a session and one slot running 07:00-08:00 on it.
    pub async fn seed_slot(&self, capacity: u32, price_kes: u32) -> Result<TimeSlot, FitslotError> {
        let now = chrono::Utc::now().to_rfc3339();
        let schedule = Schedule {
            id: short_id("sched"),
            date: "2026-11-02".to_string(),
            title: Some("Monday".to_string()),
            created_at: now.clone(),
        };
        self.storage.create_schedule(&schedule).await?;

        let session = Session {
            id: short_id("sess"),
            name: "HIIT".to_string(),
            description: None,
            created_at: now.clone(),
        };
        self.storage.create_session(&session).await?;

        let slot = TimeSlot {
            id: short_id("slot"),
            schedule_id: schedule.id,
            session_id: session.id,
            start_time: "07:00".to_string(),
            end_time: "08:00".to_string(),
            capacity,
            price_kes,
            created_at: now,
        };
        self.storage.create_time_slot(&slot).await?;
        Ok(slot)
    }

    /// Create a session group on `schedule_id`.
    pub async fn seed_group(
        &self,
        schedule_id: &str,
        capacity: u32,
    ) -> Result<SessionGroup, FitslotError> {
        let now = chrono::Utc::now().to_rfc3339();
        let group = SessionGroup {
            id: short_id("grp"),
            schedule_id: schedule_id.to_string(),
            name: "Morning crew".to_string(),
            capacity,
            current_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        self.storage.create_group(&group).await?;
        Ok(group)
    }
}

fn short_id(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_slot_is_bookable_storage_state() {
        let harness = TestHarness::builder().build().await.unwrap();
        let slot = harness.seed_slot(3, 500).await.unwrap();
        let group = harness.seed_group(&slot.schedule_id, 2).await.unwrap();

        let availability = harness.storage.slot_availability(&slot.id).await.unwrap();
        assert_eq!(availability.remaining, 3);
        assert_eq!(availability.groups.len(), 1);
        assert_eq!(availability.groups[0].group_id, group.id);
    }

    #[tokio::test]
    async fn builder_options_reach_config() {
        let harness = TestHarness::builder()
            .without_guest_bookings()
            .with_bearer_token(None)
            .build()
            .await
            .unwrap();
        assert!(!harness.config.booking.allow_guest_bookings);
        assert!(harness.config.gateway.bearer_token.is_none());
    }
}
