use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::Engine;
use crate::api::{BookingAPI, DriverAPI};
use crate::auth::User;
use crate::db::{Commit, MemoryStore, Store};
use crate::entities::{Booking, Driver, NewBooking, NewDriver, Status};
use crate::error::{persistence_error, Error};
use crate::matching::{DynMatchingPolicy, FareBidding};

/// Memory store whose commits can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn fail_commits(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error> {
        self.inner.find_booking(id).await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        self.inner.list_bookings().await
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error> {
        self.inner.insert_booking(booking).await
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        self.inner.find_driver(id).await
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, Error> {
        self.inner.list_drivers().await
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        self.inner.insert_driver(driver).await
    }

    async fn commit(&self, commit: Commit) -> Result<(), Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(persistence_error("connection reset"));
        }

        self.inner.commit(commit).await
    }
}

pub fn new_booking() -> NewBooking {
    NewBooking {
        pickup_location: "A".into(),
        dropoff_location: "B".into(),
        pickup_time: None,
    }
}

pub fn new_driver(name: &str) -> NewDriver {
    NewDriver {
        name: name.into(),
        phone: "98200 00000".into(),
        vehicle_details: "Tata Ace".into(),
        current_location: "A".into(),
    }
}

pub struct Fixture {
    pub engine: Engine,
    pub store: Arc<FlakyStore>,
    pub customer: User,
    pub admin: User,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_policy(Box::new(FareBidding)).await
    }

    pub async fn with_policy(matching: DynMatchingPolicy) -> Self {
        let store = Arc::new(FlakyStore::default());

        Self {
            engine: Engine::new(store.clone(), matching).unwrap(),
            store,
            customer: User::customer(Uuid::new_v4()),
            admin: User::admin(Uuid::new_v4()),
        }
    }

    /// Registers a driver and returns the identity it acts under.
    pub async fn add_driver(&self, name: &str) -> User {
        let driver = self
            .engine
            .create_driver(self.admin.clone(), new_driver(name))
            .await
            .unwrap();

        User::driver(driver.id)
    }

    pub async fn create_booking(&self) -> Booking {
        self.engine
            .create_booking(self.customer.clone(), new_booking())
            .await
            .unwrap()
    }

    /// Drives a fresh booking of the fixture customer to `status` with `driver`.
    pub async fn booking_in(&self, status: Status, driver: &User) -> Booking {
        let mut booking = self.create_booking().await;

        if status == Status::Pending {
            return booking;
        }

        booking = self
            .engine
            .propose_fare(driver.clone(), booking.id, 500.0)
            .await
            .unwrap();

        let steps: &[Status] = match status {
            Status::DriverFound => &[],
            Status::Accepted => &[Status::Accepted],
            Status::InProgress => &[Status::Accepted, Status::InProgress],
            Status::Completed => &[Status::Accepted, Status::InProgress, Status::Completed],
            Status::Cancelled => &[Status::Cancelled],
            Status::Pending => unreachable!(),
        };

        for step in steps {
            let customer = self.customer.clone();
            let id = booking.id;

            booking = match step {
                Status::Accepted => self.engine.approve_fare(customer, id).await,
                Status::InProgress => self.engine.start_booking(driver.clone(), id).await,
                Status::Completed => self.engine.complete_booking(driver.clone(), id).await,
                _ => self.engine.cancel_booking(customer, id).await,
            }
            .unwrap();
        }

        assert_eq!(booking.status, status);
        booking
    }

    pub async fn stored(&self, id: Uuid) -> Booking {
        self.store.find_booking(id).await.unwrap().unwrap()
    }

    pub async fn driver_available(&self, id: Uuid) -> bool {
        self.store.find_driver(id).await.unwrap().unwrap().is_available()
    }
}
