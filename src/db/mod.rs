mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::{Availability, Booking, Driver, Status};
use crate::error::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A booking write conditioned on the status and `updated_at` it was read
/// with, optionally paired with a driver write conditioned on the driver's
/// availability. Stores apply both or neither.
#[derive(Clone, Debug)]
pub struct Commit {
    pub booking: Booking,
    pub expected_status: Status,
    pub expected_updated_at: DateTime<Utc>,
    pub driver: Option<DriverWrite>,
}

#[derive(Clone, Debug)]
pub struct DriverWrite {
    pub driver: Driver,
    pub expected: Availability,
}

impl Commit {
    /// `read` is the booking as it was before `booking` was computed from it.
    pub fn new(booking: Booking, read: &Booking) -> Self {
        Self {
            booking,
            expected_status: read.status,
            expected_updated_at: read.updated_at,
            driver: None,
        }
    }

    pub fn with_driver(mut self, driver: Driver, expected: Availability) -> Self {
        self.driver = Some(DriverWrite { driver, expected });
        self
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error>;
    /// Oldest first.
    async fn list_bookings(&self) -> Result<Vec<Booking>, Error>;
    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error>;

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error>;
    /// Oldest first.
    async fn list_drivers(&self) -> Result<Vec<Driver>, Error>;
    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error>;

    /// Fails with an invalid transition error when either condition no
    /// longer holds, leaving both records as they were.
    async fn commit(&self, commit: Commit) -> Result<(), Error>;

    async fn close(&self) {}
}

pub type DynStore = Arc<dyn Store>;

#[tracing::instrument(skip_all)]
pub async fn connect(config: &Config) -> Result<DynStore, Error> {
    match &config.database_url {
        Some(database_url) => {
            let store = PgStore::new(database_url, config.max_connections).await?;
            tracing::info!("connected to postgres");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, bookings will live in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
