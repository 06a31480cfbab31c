use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{driver_state_error, validation_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle_details: String,
    pub current_location: String,
    pub status: Availability,
    pub created_at: DateTime<Utc>,
}

/// A driver is either free to take a booking or engaged on exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Engaged { booking_id: Uuid },
}

impl Availability {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Engaged { booking_id: _ } => "engaged",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub phone: String,
    pub vehicle_details: String,
    pub current_location: String,
}

impl PolarClass for Driver {
    fn get_polar_class_builder() -> oso::ClassBuilder<Driver> {
        oso::Class::builder()
            .name("Driver")
            .add_attribute_getter("id", |recv: &Driver| recv.id.to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Driver::get_polar_class_builder();
        builder.build()
    }
}

fn required(field: &str, value: String) -> Result<String, Error> {
    let value = value.trim().to_string();

    if value.is_empty() {
        return Err(validation_error(format!("{} must not be empty", field)));
    }

    Ok(value)
}

impl Driver {
    pub fn new(params: NewDriver) -> Result<Self, Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: required("name", params.name)?,
            phone: required("phone", params.phone)?,
            vehicle_details: required("vehicle details", params.vehicle_details)?,
            current_location: required("current location", params.current_location)?,
            status: Availability::Available,
            created_at: Utc::now(),
        })
    }

    pub fn is_available(&self) -> bool {
        self.status == Availability::Available
    }

    pub fn engaged_booking(&self) -> Option<Uuid> {
        match self.status {
            Availability::Engaged { booking_id } => Some(booking_id),
            Availability::Available => None,
        }
    }

    /// Checks the driver can be offered a booking without changing anything.
    pub fn ensure_available(&self) -> Result<(), Error> {
        match self.status {
            Availability::Available => Ok(()),
            _ => Err(driver_state_error(self.id, "not available")),
        }
    }

    #[tracing::instrument(skip(self), fields(driver_id = %self.id))]
    pub fn engage(&mut self, booking_id: Uuid) -> Result<(), Error> {
        self.ensure_available()?;
        self.status = Availability::Engaged { booking_id };
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(driver_id = %self.id))]
    pub fn release(&mut self, booking_id: Uuid) -> Result<(), Error> {
        match self.status {
            Availability::Engaged { booking_id: engaged } if engaged == booking_id => {
                self.status = Availability::Available;
                Ok(())
            }
            Availability::Engaged { booking_id: _ } => {
                Err(driver_state_error(self.id, "engaged on another booking"))
            }
            Availability::Available => {
                tracing::warn!("driver already available, nothing to release");
                Ok(())
            }
        }
    }
}
