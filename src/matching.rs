use std::fmt::Debug;

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::entities::{Booking, Driver};
use crate::error::{config_error, Error};

/// A driver and fare put forward on behalf of a pending booking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Proposal {
    pub driver_id: Uuid,
    pub fare: f64,
}

pub trait MatchingPolicy: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// `drivers` holds only available drivers.
    fn select(&self, booking: &Booking, drivers: &[Driver]) -> Option<Proposal>;
}

pub type DynMatchingPolicy = Box<dyn MatchingPolicy>;

/// Drivers bid on pending bookings themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct FareBidding;

impl MatchingPolicy for FareBidding {
    fn name(&self) -> &'static str {
        "fare_bidding"
    }

    fn select(&self, _booking: &Booking, _drivers: &[Driver]) -> Option<Proposal> {
        None
    }
}

/// Picks a random available driver and a whole-unit fare in
/// `[min_fare, max_fare]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomAssignment {
    min_fare: f64,
    max_fare: f64,
}

impl RandomAssignment {
    /// The bounds must be finite, positive and enclose at least one whole
    /// unit.
    pub fn new(min_fare: f64, max_fare: f64) -> Result<Self, Error> {
        if !(min_fare.is_finite() && max_fare.is_finite()) {
            return Err(config_error("random fare bounds must be finite"));
        }

        if !(min_fare > 0.0 && min_fare <= max_fare) {
            return Err(config_error(
                "random minimum fare must be positive and not above the maximum",
            ));
        }

        if min_fare.ceil() > max_fare.floor() {
            return Err(config_error(format!(
                "no whole fare between {} and {}",
                min_fare, max_fare
            )));
        }

        Ok(Self { min_fare, max_fare })
    }
}

impl MatchingPolicy for RandomAssignment {
    fn name(&self) -> &'static str {
        "random_assignment"
    }

    #[tracing::instrument(skip_all, fields(booking_id = %booking.id, candidates = drivers.len()))]
    fn select(&self, booking: &Booking, drivers: &[Driver]) -> Option<Proposal> {
        let mut rng = rand::thread_rng();
        let driver = drivers.choose(&mut rng)?;

        let low = self.min_fare.ceil();
        let high = self.max_fare.floor();
        let fare = rng.gen_range(low..=high).round();

        Some(Proposal {
            driver_id: driver.id,
            fare,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewBooking, NewDriver};

    fn booking() -> Booking {
        Booking::new(
            Uuid::new_v4(),
            NewBooking {
                pickup_location: "Andheri".into(),
                dropoff_location: "Bandra".into(),
                pickup_time: None,
            },
        )
        .unwrap()
    }

    fn drivers(n: usize) -> Vec<Driver> {
        (0..n)
            .map(|i| {
                Driver::new(NewDriver {
                    name: format!("driver {}", i),
                    phone: "555".into(),
                    vehicle_details: "tempo".into(),
                    current_location: "Andheri".into(),
                })
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn fare_bidding_never_selects() {
        assert_eq!(FareBidding.select(&booking(), &drivers(3)), None);
    }

    #[test]
    fn random_assignment_picks_an_offered_driver_within_range() {
        let policy = RandomAssignment::new(300.0, 1000.0).unwrap();
        let booking = booking();
        let drivers = drivers(5);

        for _ in 0..50 {
            let proposal = policy.select(&booking, &drivers).unwrap();

            assert!(drivers.iter().any(|d| d.id == proposal.driver_id));
            assert!((300.0..=1000.0).contains(&proposal.fare));
            assert_eq!(proposal.fare.fract(), 0.0);
        }
    }

    #[test]
    fn random_assignment_without_drivers_selects_nothing() {
        let policy = RandomAssignment::new(300.0, 1000.0).unwrap();

        assert_eq!(policy.select(&booking(), &[]), None);
    }

    #[test]
    fn degenerate_range_yields_fixed_fare() {
        let policy = RandomAssignment::new(450.0, 450.0).unwrap();
        let proposal = policy.select(&booking(), &drivers(1)).unwrap();

        assert_eq!(proposal.fare, 450.0);
    }

    #[test]
    fn fractional_bounds_keep_fares_inside_the_range() {
        let policy = RandomAssignment::new(299.5, 301.2).unwrap();
        let booking = booking();
        let drivers = drivers(2);

        for _ in 0..50 {
            let fare = policy.select(&booking, &drivers).unwrap().fare;
            assert!(fare == 300.0 || fare == 301.0, "fare {}", fare);
        }
    }

    #[test]
    fn unusable_bounds_are_refused() {
        for (min, max) in [
            (300.0, f64::INFINITY),
            (f64::NAN, 400.0),
            (0.0, 100.0),
            (500.0, 100.0),
            (300.5, 300.7),
        ] {
            let err = RandomAssignment::new(min, max).unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::Config, "{} {}", min, max);
        }
    }
}
