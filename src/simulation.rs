use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand_distr::{Bernoulli, Distribution, Normal};
use serde::Serialize;
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::config::Config;
use crate::entities::{Booking, NewBooking, NewDriver, Status, Violation};
use crate::error::Error;

const PLACES: [&str; 8] = [
    "Andheri Station",
    "Bandra Kurla Complex",
    "Colaba Causeway",
    "Dadar Flower Market",
    "Powai Lake",
    "Thane Junction",
    "Vashi Sector 17",
    "Worli Sea Face",
];

fn coin(p: f64) -> bool {
    Bernoulli::new(p)
        .map(|d| d.sample(&mut rand::thread_rng()))
        .unwrap_or(false)
}

fn sample_fare() -> f64 {
    let fare = Normal::<f64>::new(600.0, 150.0)
        .map(|d| d.sample(&mut rand::thread_rng()))
        .unwrap_or(600.0);

    fare.max(50.0).round()
}

fn sample_route() -> (String, String) {
    let mut rng = rand::thread_rng();
    let mut places = PLACES.choose_multiple(&mut rng, 2);

    match (places.next(), places.next()) {
        (Some(pickup), Some(dropoff)) => (pickup.to_string(), dropoff.to_string()),
        _ => (PLACES[0].to_string(), PLACES[1].to_string()),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub drivers: usize,
    pub customers: usize,
    pub rounds: usize,
    pub workers: usize,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            drivers: config.simulation_drivers,
            customers: config.simulation_customers,
            rounds: config.simulation_rounds,
            workers: config
                .simulation_drivers
                .max(config.simulation_customers)
                .clamp(1, 16),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    /// Bookings per status name at the end of the run.
    pub bookings: BTreeMap<&'static str, usize>,
    pub races: usize,
    pub failures: usize,
    pub violations: Vec<Violation>,
}

impl Report {
    pub fn is_consistent(&self) -> bool {
        self.failures == 0 && self.violations.is_empty()
    }
}

#[derive(Debug)]
enum Job {
    Book(User),
    Bid(User),
    Match(Uuid),
    Decide(User),
    Drive(User),
}

struct World {
    api: DynAPI,
    admin: User,
    system: User,
    races: AtomicUsize,
    failures: AtomicUsize,
}

impl World {
    /// Lost races are part of the game; anything else is a failure.
    fn observe<T>(&self, result: Result<T, Error>) -> Result<Option<T>, Error> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_invalid_transition_error() => {
                tracing::warn!(error = %err, "lost a race");
                self.races.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn perform(&self, job: Job) -> Result<(), Error> {
        match job {
            Job::Book(customer) => {
                let (pickup_location, dropoff_location) = sample_route();
                let params = NewBooking {
                    pickup_location,
                    dropoff_location,
                    pickup_time: Some(Utc::now() + Duration::minutes(30)),
                };

                self.api.create_booking(customer, params).await?;
            }
            Job::Bid(driver) => {
                let record = self.api.find_driver(driver.clone(), driver.id).await?;
                if !record.is_available() {
                    return Ok(());
                }

                let pending: Vec<Booking> = self
                    .api
                    .list_bookings(driver.clone())
                    .await?
                    .into_iter()
                    .filter(Booking::is_pending)
                    .collect();

                let target = pending.choose(&mut rand::thread_rng()).map(|b| b.id);
                if let Some(id) = target {
                    let fare = sample_fare();
                    self.observe(self.api.propose_fare(driver, id, fare).await)?;
                }
            }
            Job::Match(id) => {
                self.observe(self.api.request_driver(self.system.clone(), id).await)?;
            }
            Job::Decide(customer) => {
                for booking in self.api.list_bookings(customer.clone()).await? {
                    let result = match booking.status {
                        Status::DriverFound if coin(0.7) => {
                            self.api.approve_fare(customer.clone(), booking.id).await
                        }
                        Status::DriverFound => {
                            self.api.reject_fare(customer.clone(), booking.id).await
                        }
                        Status::Pending | Status::Accepted if coin(0.05) => {
                            self.api.cancel_booking(customer.clone(), booking.id).await
                        }
                        _ => continue,
                    };

                    self.observe(result)?;
                }
            }
            Job::Drive(driver) => {
                for booking in self.api.list_bookings(driver.clone()).await? {
                    if booking.driver_id != Some(driver.id) {
                        continue;
                    }

                    let result = match booking.status {
                        Status::Accepted if coin(0.05) => {
                            self.api.cancel_booking(driver.clone(), booking.id).await
                        }
                        Status::Accepted => self.api.start_booking(driver.clone(), booking.id).await,
                        Status::InProgress => {
                            self.api.complete_booking(driver.clone(), booking.id).await
                        }
                        _ => continue,
                    };

                    self.observe(result)?;
                }
            }
        }

        Ok(())
    }

    async fn run(&self, job: Job) {
        if let Err(err) = self.perform(job).await {
            tracing::error!(error = %err, code = err.code(), "simulated actor failed");
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Customer, driver and system actors driving one engine concurrently.
pub struct Simulation {
    world: Arc<World>,
    settings: Settings,
}

impl Simulation {
    pub fn new(api: DynAPI, settings: Settings) -> Self {
        Self {
            world: Arc::new(World {
                api,
                admin: User::admin(Uuid::new_v4()),
                system: User::new_system_user(),
                races: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
            }),
            settings,
        }
    }

    #[tracing::instrument(name = "Simulation::run", skip(self), fields(settings = ?self.settings))]
    pub async fn run(&self) -> Result<Report, Error> {
        let drivers = self.register_drivers().await?;
        let customers: Vec<User> = (0..self.settings.customers)
            .map(|_| User::customer(Uuid::new_v4()))
            .collect();

        for round in 0..self.settings.rounds {
            tracing::info!(round, "starting round");

            let bookers = customers.iter().filter(|_| coin(0.5)).cloned();
            self.dispatch(bookers.map(Job::Book).collect()).await;

            let mut jobs: Vec<Job> = drivers.iter().cloned().map(Job::Bid).collect();
            for booking in self.world.api.list_bookings(self.world.admin.clone()).await? {
                if booking.is_pending() && coin(0.3) {
                    jobs.push(Job::Match(booking.id));
                }
            }
            jobs.shuffle(&mut rand::thread_rng());
            self.dispatch(jobs).await;

            self.dispatch(customers.iter().cloned().map(Job::Decide).collect())
                .await;
            self.dispatch(drivers.iter().cloned().map(Job::Drive).collect())
                .await;
        }

        self.report().await
    }

    #[tracing::instrument(skip(self))]
    async fn register_drivers(&self) -> Result<Vec<User>, Error> {
        let mut drivers = vec![];

        for i in 0..self.settings.drivers {
            let params = NewDriver {
                name: format!("Driver {}", i + 1),
                phone: format!("+91 98200 {:05}", i),
                vehicle_details: "Tata Ace".into(),
                current_location: PLACES[i % PLACES.len()].into(),
            };

            let driver = self
                .world
                .api
                .create_driver(self.world.admin.clone(), params)
                .await?;

            drivers.push(User::driver(driver.id));
        }

        Ok(drivers)
    }

    /// Feeds `jobs` to a pool of workers and waits for all of them.
    async fn dispatch(&self, jobs: Vec<Job>) {
        let (tx, rx): (Sender<Job>, Receiver<Job>) = async_channel::unbounded();

        let mut handles = vec![];
        for _ in 0..self.settings.workers.max(1) {
            let rx = rx.clone();
            let world = self.world.clone();

            handles.push(tokio::spawn(async move {
                while let Ok(job) = rx.recv().await {
                    world.run(job).await;
                }
            }));
        }

        for job in jobs {
            if tx.send(job).await.is_err() {
                break;
            }
        }
        tx.close();

        for result in futures::future::join_all(handles).await {
            if let Err(err) = result {
                tracing::error!(error = %err, "simulation worker panicked");
                self.world.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn report(&self) -> Result<Report, Error> {
        let mut report = Report {
            races: self.world.races.load(Ordering::Relaxed),
            failures: self.world.failures.load(Ordering::Relaxed),
            ..Default::default()
        };

        for booking in self.world.api.list_bookings(self.world.admin.clone()).await? {
            *report.bookings.entry(booking.status.name()).or_default() += 1;
        }

        report.violations = self.world.api.audit(self.world.admin.clone()).await?;

        tracing::info!(
            races = report.races,
            failures = report.failures,
            violations = report.violations.len(),
            "simulation finished"
        );

        Ok(report)
    }
}
