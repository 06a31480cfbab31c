use std::fmt;

use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Command, Effect};
use crate::error::{invalid_transition_error, validation_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub pickup_time: Option<DateTime<Utc>>,
    pub fare: Option<f64>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    DriverFound,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Pending,
        Status::DriverFound,
        Status::Accepted,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::DriverFound => "DRIVER_FOUND",
            Self::Accepted => "ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The driver is engaged for the whole in-flight span.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Accepted | Self::InProgress)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input for a new booking, as submitted by a customer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewBooking {
    pub pickup_location: String,
    pub dropoff_location: String,
    #[serde(default)]
    pub pickup_time: Option<DateTime<Utc>>,
}

impl PolarClass for Booking {
    fn get_polar_class_builder() -> oso::ClassBuilder<Booking> {
        oso::Class::builder()
            .name("Booking")
            .add_attribute_getter("id", |recv: &Booking| recv.id.to_string())
            .add_attribute_getter("customer_id", |recv: &Booking| recv.customer_id.to_string())
            // empty when no driver is attached
            .add_attribute_getter("driver_id", |recv: &Booking| {
                recv.driver_id.map(|id| id.to_string()).unwrap_or_default()
            })
            .add_attribute_getter("status", |recv: &Booking| recv.status.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Booking::get_polar_class_builder();
        builder.build()
    }
}

impl Booking {
    pub fn new(customer_id: Uuid, params: NewBooking) -> Result<Self, Error> {
        let pickup_location = params.pickup_location.trim().to_string();
        let dropoff_location = params.dropoff_location.trim().to_string();

        if pickup_location.is_empty() {
            return Err(validation_error("pickup location must not be empty"));
        }

        if dropoff_location.is_empty() {
            return Err(validation_error("dropoff location must not be empty"));
        }

        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            driver_id: None,
            pickup_location,
            dropoff_location,
            pickup_time: params.pickup_time,
            fare: None,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// Applies `command` in place. On error the booking is left untouched.
    pub fn apply(&mut self, command: &Command) -> Result<Effect, Error> {
        let effect = match command {
            Command::ProposeFare { driver_id, fare } => self.propose_fare(*driver_id, *fare)?,
            Command::Approve => Effect::Engage(self.approve()?),
            Command::Reject => self.reject()?,
            Command::Start => self.start()?,
            Command::Complete => Effect::Release(self.complete()?),
            Command::Cancel => self.cancel()?,
        };

        if effect != Effect::Unchanged {
            self.updated_at = Utc::now();
        }

        Ok(effect)
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id, status = %self.status))]
    pub fn propose_fare(&mut self, driver_id: Uuid, fare: f64) -> Result<Effect, Error> {
        if !fare.is_finite() || fare <= 0.0 {
            return Err(validation_error("fare must be a positive amount"));
        }

        match (self.status, self.driver_id) {
            (Status::Pending, None) => {
                self.driver_id = Some(driver_id);
                self.fare = Some(fare);
                self.status = Status::DriverFound;
                Ok(Effect::Guard(driver_id))
            }
            _ => Err(invalid_transition_error(self.status, "propose a fare for")),
        }
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id, status = %self.status))]
    pub fn approve(&mut self) -> Result<Uuid, Error> {
        match (self.status, self.driver_id) {
            (Status::DriverFound, Some(driver_id)) => {
                self.status = Status::Accepted;
                Ok(driver_id)
            }
            _ => Err(invalid_transition_error(self.status, "approve")),
        }
    }

    /// Sends a proposed booking back to PENDING. Rejecting a booking that is
    /// already PENDING succeeds without changing anything.
    #[tracing::instrument(skip(self), fields(booking_id = %self.id, status = %self.status))]
    pub fn reject(&mut self) -> Result<Effect, Error> {
        match self.status {
            Status::DriverFound => {
                self.driver_id = None;
                self.fare = None;
                self.status = Status::Pending;
                Ok(Effect::Status)
            }
            Status::Pending => Ok(Effect::Unchanged),
            _ => Err(invalid_transition_error(self.status, "reject")),
        }
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id, status = %self.status))]
    pub fn start(&mut self) -> Result<Effect, Error> {
        match self.status {
            Status::Accepted => {
                self.status = Status::InProgress;
                Ok(Effect::Status)
            }
            _ => Err(invalid_transition_error(self.status, "start")),
        }
    }

    #[tracing::instrument(skip(self), fields(booking_id = %self.id, status = %self.status))]
    pub fn complete(&mut self) -> Result<Uuid, Error> {
        match (self.status, self.driver_id) {
            (Status::InProgress, Some(driver_id)) => {
                self.status = Status::Completed;
                Ok(driver_id)
            }
            _ => Err(invalid_transition_error(self.status, "complete")),
        }
    }

    /// Total over every non-terminal status. The driver is released only when
    /// the booking was in flight; otherwise it was never engaged.
    #[tracing::instrument(skip(self), fields(booking_id = %self.id, status = %self.status))]
    pub fn cancel(&mut self) -> Result<Effect, Error> {
        if self.status.is_terminal() {
            return Err(invalid_transition_error(self.status, "cancel"));
        }

        let effect = match (self.status.is_in_flight(), self.driver_id) {
            (true, Some(driver_id)) => Effect::Release(driver_id),
            _ => Effect::Status,
        };

        self.status = Status::Cancelled;
        Ok(effect)
    }
}
