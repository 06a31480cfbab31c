use super::helpers::{fetch_booking, fetch_driver};
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::BookingAPI,
    auth::{Platform, User},
    db::Commit,
    entities::{self, Booking, Command, Driver, Effect, NewBooking, Violation},
    error::{invalid_transition_error, unauthorized_error, Error},
    matching::Proposal,
};

impl Engine {
    /// Reads the booking, checks `command` is legal for it and that `user` may
    /// issue it, then applies it.
    async fn execute(&self, user: User, id: Uuid, command: Command) -> Result<Booking, Error> {
        let booking = fetch_booking(&self.store, id).await?;

        // callers who may neither see the booking nor ever issue this event
        // on it learn nothing about its status
        if !(self.is_allowed(user.clone(), "read", booking.clone())?
            || self.is_allowed(user.clone(), command.action(), booking.clone())?)
        {
            return Err(unauthorized_error());
        }

        // an event that is illegal in the current status is reported as such
        // before the caller's role for that event is looked at
        booking.clone().apply(&command)?;

        self.authorize(user, command.action(), booking.clone())?;

        self.transition(booking, command).await
    }

    /// Applies `command` to `read` and commits the result conditioned on the
    /// booking and driver availability it was computed from. Nothing is
    /// written when the command is rejected.
    #[tracing::instrument(skip(self, read), fields(booking_id = %read.id))]
    async fn transition(&self, read: Booking, command: Command) -> Result<Booking, Error> {
        let from = read.status;
        let mut booking = read.clone();
        let effect = booking.apply(&command)?;

        let commit = match effect {
            Effect::Unchanged => {
                tracing::info!(status = %from, "nothing to change");
                return Ok(booking);
            }
            Effect::Status => Commit::new(booking.clone(), &read),
            Effect::Guard(driver_id) => {
                let driver = fetch_driver(&self.store, driver_id).await?;
                driver.ensure_available()?;

                let availability = driver.status;
                Commit::new(booking.clone(), &read).with_driver(driver, availability)
            }
            Effect::Engage(driver_id) => {
                let mut driver = fetch_driver(&self.store, driver_id).await?;
                let availability = driver.status;
                driver.engage(booking.id)?;

                Commit::new(booking.clone(), &read).with_driver(driver, availability)
            }
            Effect::Release(driver_id) => {
                let mut driver = fetch_driver(&self.store, driver_id).await?;
                let availability = driver.status;
                driver.release(booking.id)?;

                Commit::new(booking.clone(), &read).with_driver(driver, availability)
            }
        };

        if let Err(err) = self.store.commit(commit).await {
            if err.is_invalid_transition_error() {
                tracing::warn!(error = %err, "lost a race against a concurrent update");
            }
            return Err(err);
        }

        tracing::info!(from = %from, to = %booking.status, "booking updated");

        Ok(booking)
    }
}

#[async_trait]
impl BookingAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_booking(&self, user: User, params: NewBooking) -> Result<Booking, Error> {
        self.authorize(user.clone(), "create_booking", Platform::default())?;

        let booking = Booking::new(user.id, params)?;
        self.store.insert_booking(&booking).await?;

        tracing::info!(booking_id = %booking.id, "booking created");

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let booking = fetch_booking(&self.store, id).await?;

        self.authorize(user, "read", booking.clone())?;

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bookings(&self, user: User) -> Result<Vec<Booking>, Error> {
        self.authorize(user.clone(), "list_bookings", Platform::default())?;

        let mut visible = vec![];
        for booking in self.store.list_bookings().await? {
            if self.is_allowed(user.clone(), "read", booking.clone())? {
                visible.push(booking);
            }
        }

        Ok(visible)
    }

    #[tracing::instrument(skip(self))]
    async fn propose_fare(&self, user: User, id: Uuid, fare: f64) -> Result<Booking, Error> {
        let driver_id = user.id;

        self.execute(user, id, Command::ProposeFare { driver_id, fare })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn approve_fare(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        self.execute(user, id, Command::Approve).await
    }

    #[tracing::instrument(skip(self))]
    async fn reject_fare(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        self.execute(user, id, Command::Reject).await
    }

    #[tracing::instrument(skip(self))]
    async fn start_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        self.execute(user, id, Command::Start).await
    }

    #[tracing::instrument(skip(self))]
    async fn complete_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        self.execute(user, id, Command::Complete).await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        self.execute(user, id, Command::Cancel).await
    }

    #[tracing::instrument(skip(self))]
    async fn request_driver(&self, user: User, id: Uuid) -> Result<Option<Booking>, Error> {
        self.authorize(user, "request_driver", Platform::default())?;

        let booking = fetch_booking(&self.store, id).await?;

        if !booking.is_pending() {
            return Err(invalid_transition_error(booking.status, "request a driver for"));
        }

        let drivers: Vec<Driver> = self
            .store
            .list_drivers()
            .await?
            .into_iter()
            .filter(Driver::is_available)
            .collect();

        let Proposal { driver_id, fare } = match self.matching.select(&booking, &drivers) {
            Some(proposal) => proposal,
            None => {
                tracing::info!(
                    policy = self.matching.name(),
                    candidates = drivers.len(),
                    "no driver selected"
                );
                return Ok(None);
            }
        };

        let booking = self
            .transition(booking, Command::ProposeFare { driver_id, fare })
            .await?;

        Ok(Some(booking))
    }

    #[tracing::instrument(skip(self))]
    async fn audit(&self, user: User) -> Result<Vec<Violation>, Error> {
        self.authorize(user, "audit", Platform::default())?;

        let bookings = self.store.list_bookings().await?;
        let drivers = self.store.list_drivers().await?;

        let violations = entities::audit(&bookings, &drivers);

        for violation in violations.iter() {
            tracing::warn!(%violation, "invariant violated");
        }

        Ok(violations)
    }
}
