use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, Pool, Postgres, Row};
use uuid::Uuid;

use super::{Commit, Store};
use crate::entities::{Booking, Driver};
use crate::error::{stale_write_error, Error};

type Database = Postgres;

#[derive(Debug)]
pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip(db_uri))]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS bookings (id UUID PRIMARY KEY, customer_id UUID NOT NULL, status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS drivers (id UUID PRIMARY KEY, status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)",
        )
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(skip(self))]
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM bookings WHERE id = $1").bind(&id))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(booking): Json<Booking> = result.try_get("data")?;
                Ok(Some(booking))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(sqlx::query("SELECT data FROM bookings ORDER BY created_at ASC, id ASC"))
            .await?;

        let mut bookings = Vec::with_capacity(results.len());
        for result in results.iter() {
            let Json(booking): Json<Booking> = result.try_get("data")?;
            bookings.push(booking);
        }

        Ok(bookings)
    }

    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO bookings (id, customer_id, status, created_at, data) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&booking.id)
            .bind(&booking.customer_id)
            .bind(booking.status.name())
            .bind(&booking.created_at)
            .bind(Json(booking)),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM drivers WHERE id = $1").bind(&id))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(driver): Json<Driver> = result.try_get("data")?;
                Ok(Some(driver))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_drivers(&self) -> Result<Vec<Driver>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(sqlx::query("SELECT data FROM drivers ORDER BY created_at ASC, id ASC"))
            .await?;

        let mut drivers = Vec::with_capacity(results.len());
        for result in results.iter() {
            let Json(driver): Json<Driver> = result.try_get("data")?;
            drivers.push(driver);
        }

        Ok(drivers)
    }

    #[tracing::instrument(skip(self, driver), fields(driver_id = %driver.id))]
    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO drivers (id, status, created_at, data) VALUES ($1, $2, $3, $4)")
                .bind(&driver.id)
                .bind(driver.status.name())
                .bind(&driver.created_at)
                .bind(Json(driver)),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, commit), fields(booking_id = %commit.booking.id))]
    async fn commit(&self, commit: Commit) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        let result = tx
            .execute(
                sqlx::query(
                    "UPDATE bookings SET status = $2, data = $3 WHERE id = $1 AND status = $4 AND data->'updated_at' = $5",
                )
                .bind(&commit.booking.id)
                .bind(commit.booking.status.name())
                .bind(Json(&commit.booking))
                .bind(commit.expected_status.name())
                .bind(Json(&commit.expected_updated_at)),
            )
            .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(stale_write_error("booking"));
        }

        if let Some(write) = &commit.driver {
            // engaged on a different booking shares the column value, so the
            // full availability is compared on the JSON document as well
            let result = tx
                .execute(
                    sqlx::query(
                        "UPDATE drivers SET status = $2, data = $3 WHERE id = $1 AND status = $4 AND data->'status' = $5",
                    )
                    .bind(&write.driver.id)
                    .bind(write.driver.status.name())
                    .bind(Json(&write.driver))
                    .bind(write.expected.name())
                    .bind(Json(&write.expected)),
                )
                .await?;

            if result.rows_affected() != 1 {
                tx.rollback().await?;
                return Err(stale_write_error("driver"));
            }
        }

        tx.commit().await?;

        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
