use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Commit, Store};
use crate::entities::{Booking, Driver};
use crate::error::{not_found_error, stale_write_error, unexpected_error, Error};

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    drivers: HashMap<Uuid, Driver>,
}

/// Keyed maps behind one lock; a commit checks and writes under the write
/// guard, so readers see either the old pair of records or the new one.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        let mut bookings: Vec<Booking> =
            self.tables.read().await.bookings.values().cloned().collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(bookings)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        if tables.bookings.contains_key(&booking.id) {
            return Err(unexpected_error(format!("booking {} already exists", booking.id)));
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        Ok(self.tables.read().await.drivers.get(&id).cloned())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, Error> {
        let mut drivers: Vec<Driver> = self.tables.read().await.drivers.values().cloned().collect();
        drivers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(drivers)
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        if tables.drivers.contains_key(&driver.id) {
            return Err(unexpected_error(format!("driver {} already exists", driver.id)));
        }

        tables.drivers.insert(driver.id, driver.clone());
        Ok(())
    }

    async fn commit(&self, commit: Commit) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        let current = tables
            .bookings
            .get(&commit.booking.id)
            .ok_or_else(|| not_found_error("booking", commit.booking.id))?;

        if current.status != commit.expected_status
            || current.updated_at != commit.expected_updated_at
        {
            return Err(stale_write_error("booking"));
        }

        if let Some(write) = &commit.driver {
            let current = tables
                .drivers
                .get(&write.driver.id)
                .ok_or_else(|| not_found_error("driver", write.driver.id))?;

            if current.status != write.expected {
                return Err(stale_write_error("driver"));
            }
        }

        if let Some(write) = commit.driver {
            tables.drivers.insert(write.driver.id, write.driver);
        }

        tables.bookings.insert(commit.booking.id, commit.booking);

        Ok(())
    }
}
