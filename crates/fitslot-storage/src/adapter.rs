// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use fitslot_config::model::StorageConfig;
use fitslot_core::types::{
    Booking, BookingStatus, GroupDrift, NewBooking, NewPaymentEvent, PaymentEvent, PaymentUpdate,
    Reservation, Schedule, Session, SessionGroup, SlotAvailability, TimeSlot,
};
use fitslot_core::{AdapterType, FitslotError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened on [`StorageAdapter::initialize`]; every other
/// call fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create an adapter for the database described by `config`. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database, e.g. an in-memory one in tests.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, FitslotError> {
        self.db.get().ok_or_else(|| FitslotError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, FitslotError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FitslotError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("storage shut down");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), FitslotError> {
        let db = Database::open_with(&self.config.database_path, &self.config).await?;
        self.db.set(db).map_err(|_| FitslotError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), FitslotError> {
        self.db()?.close().await
    }

    // --- Catalogue ---

    async fn create_schedule(&self, schedule: &Schedule) -> Result<(), FitslotError> {
        queries::schedules::create_schedule(self.db()?, schedule).await
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, FitslotError> {
        queries::schedules::get_schedule(self.db()?, id).await
    }

    async fn create_session(&self, session: &Session) -> Result<(), FitslotError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, FitslotError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn create_time_slot(&self, slot: &TimeSlot) -> Result<(), FitslotError> {
        queries::time_slots::create_time_slot(self.db()?, slot).await
    }

    async fn get_time_slot(&self, id: &str) -> Result<Option<TimeSlot>, FitslotError> {
        queries::time_slots::get_time_slot(self.db()?, id).await
    }

    async fn list_time_slots(&self, schedule_id: &str) -> Result<Vec<TimeSlot>, FitslotError> {
        queries::time_slots::list_time_slots(self.db()?, schedule_id).await
    }

    async fn create_group(&self, group: &SessionGroup) -> Result<(), FitslotError> {
        queries::groups::create_group(self.db()?, group).await
    }

    async fn get_group(&self, id: &str) -> Result<Option<SessionGroup>, FitslotError> {
        queries::groups::get_group(self.db()?, id).await
    }

    async fn list_groups(&self, schedule_id: &str) -> Result<Vec<SessionGroup>, FitslotError> {
        queries::groups::list_groups(self.db()?, schedule_id).await
    }

    async fn set_group_capacity(
        &self,
        id: &str,
        capacity: u32,
    ) -> Result<SessionGroup, FitslotError> {
        queries::groups::set_group_capacity(self.db()?, id, capacity).await
    }

    // --- Bookings ---

    async fn reserve_booking(&self, booking: &NewBooking) -> Result<Reservation, FitslotError> {
        queries::bookings::reserve_booking(self.db()?, booking).await
    }

    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, FitslotError> {
        queries::bookings::get_booking(self.db()?, id).await
    }

    async fn find_booking_by_checkout(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Booking>, FitslotError> {
        queries::bookings::find_booking_by_checkout(self.db()?, checkout_request_id).await
    }

    async fn find_booking_by_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<Booking>, FitslotError> {
        queries::bookings::find_booking_by_reference(self.db()?, payment_reference).await
    }

    async fn list_bookings_for_slot(
        &self,
        time_slot_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, FitslotError> {
        queries::bookings::list_bookings_for_slot(self.db()?, time_slot_id, status).await
    }

    async fn transition_booking(
        &self,
        id: &str,
        to: BookingStatus,
        payment: Option<PaymentUpdate>,
    ) -> Result<Booking, FitslotError> {
        queries::bookings::transition_booking(self.db()?, id, to, payment).await
    }

    async fn update_payment(
        &self,
        id: &str,
        payment: &PaymentUpdate,
    ) -> Result<Booking, FitslotError> {
        queries::bookings::update_payment(self.db()?, id, payment).await
    }

    async fn update_payment_unless_settled(
        &self,
        id: &str,
        payment: &PaymentUpdate,
    ) -> Result<Booking, FitslotError> {
        queries::bookings::update_payment_unless_settled(self.db()?, id, payment).await
    }

    async fn slot_availability(
        &self,
        time_slot_id: &str,
    ) -> Result<SlotAvailability, FitslotError> {
        queries::bookings::slot_availability(self.db()?, time_slot_id).await
    }

    async fn reconcile_group_counts(&self) -> Result<Vec<GroupDrift>, FitslotError> {
        queries::groups::reconcile_group_counts(self.db()?).await
    }

    // --- Payment audit ---

    async fn record_payment_event(&self, event: &NewPaymentEvent) -> Result<i64, FitslotError> {
        queries::payments::record_payment_event(self.db()?, event).await
    }

    async fn list_payment_events(
        &self,
        booking_id: &str,
    ) -> Result<Vec<PaymentEvent>, FitslotError> {
        queries::payments::list_payment_events(self.db()?, booking_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn identity_is_sqlite_storage() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert!(matches!(
            storage.get_booking("b").await,
            Err(FitslotError::Storage { .. })
        ));
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn initialize_opens_database_once() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(storage.initialize().await.is_err());
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn adapter_round_trips_a_schedule() {
        let db = Database::open_in_memory().await.unwrap();
        let storage = SqliteStorage::from_database(make_config(":memory:"), db);
        let schedule = Schedule {
            id: "s".into(),
            date: "2026-06-01".into(),
            title: None,
            created_at: "2026-05-01T00:00:00.000Z".into(),
        };
        storage.create_schedule(&schedule).await.unwrap();
        assert_eq!(storage.get_schedule("s").await.unwrap(), Some(schedule));
        assert!(storage.list_groups("s").await.unwrap().is_empty());
        assert!(storage.reconcile_group_counts().await.unwrap().is_empty());
    }
}
