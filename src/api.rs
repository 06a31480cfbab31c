use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Booking, Driver, NewBooking, NewDriver, Violation};
use crate::error::Error;

#[async_trait]
pub trait BookingAPI {
    async fn create_booking(&self, user: User, params: NewBooking) -> Result<Booking, Error>;
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    /// Bookings `user` may read, oldest first.
    async fn list_bookings(&self, user: User) -> Result<Vec<Booking>, Error>;

    async fn propose_fare(&self, user: User, id: Uuid, fare: f64) -> Result<Booking, Error>;
    async fn approve_fare(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn reject_fare(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn start_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn complete_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;

    /// Runs the matching policy against a pending booking. `None` when the
    /// policy put nobody forward.
    async fn request_driver(&self, user: User, id: Uuid) -> Result<Option<Booking>, Error>;

    async fn audit(&self, user: User) -> Result<Vec<Violation>, Error>;
}

#[async_trait]
pub trait DriverAPI {
    async fn create_driver(&self, user: User, params: NewDriver) -> Result<Driver, Error>;
    async fn find_driver(&self, user: User, id: Uuid) -> Result<Driver, Error>;
    async fn list_drivers(&self, user: User) -> Result<Vec<Driver>, Error>;
}

pub trait API: BookingAPI + DriverAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
