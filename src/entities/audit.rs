use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::entities::{Availability, Booking, Driver, Status};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{subject}: {message}")]
pub struct Violation {
    pub subject: Uuid,
    pub message: String,
}

impl Violation {
    fn new(subject: Uuid, message: impl Into<String>) -> Self {
        Self {
            subject,
            message: message.into(),
        }
    }
}

/// Cross-checks bookings against driver availability.
pub fn audit(bookings: &[Booking], drivers: &[Driver]) -> Vec<Violation> {
    let mut violations = vec![];

    let by_id: HashMap<Uuid, &Booking> = bookings.iter().map(|b| (b.id, b)).collect();
    let drivers_by_id: HashMap<Uuid, &Driver> = drivers.iter().map(|d| (d.id, d)).collect();

    for booking in bookings {
        match booking.status {
            Status::Pending => {
                if booking.driver_id.is_some() || booking.fare.is_some() {
                    violations.push(Violation::new(
                        booking.id,
                        "pending booking carries a driver or fare",
                    ));
                }
            }
            Status::DriverFound | Status::Accepted | Status::InProgress | Status::Completed => {
                if booking.driver_id.is_none() || booking.fare.is_none() {
                    violations.push(Violation::new(
                        booking.id,
                        format!("{} booking is missing its driver or fare", booking.status),
                    ));
                }
            }
            Status::Cancelled => {}
        }

        if !booking.status.is_in_flight() {
            continue;
        }

        let engaged = booking
            .driver_id
            .and_then(|id| drivers_by_id.get(&id))
            .map(|driver| driver.status == Availability::Engaged { booking_id: booking.id });

        if engaged != Some(true) {
            violations.push(Violation::new(
                booking.id,
                format!("{} booking's driver is not engaged on it", booking.status),
            ));
        }
    }

    for driver in drivers {
        let Some(booking_id) = driver.engaged_booking() else {
            continue;
        };

        let consistent = by_id
            .get(&booking_id)
            .map(|b| b.status.is_in_flight() && b.driver_id == Some(driver.id))
            .unwrap_or(false);

        if !consistent {
            violations.push(Violation::new(
                driver.id,
                "driver is unavailable without an in-flight booking",
            ));
        }
    }

    violations
}
