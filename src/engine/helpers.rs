use uuid::Uuid;

use crate::{
    db::DynStore,
    entities::{Booking, Driver},
    error::{not_found_error, Error},
};

#[tracing::instrument(skip(store))]
pub async fn fetch_booking(store: &DynStore, id: Uuid) -> Result<Booking, Error> {
    store
        .find_booking(id)
        .await?
        .ok_or_else(|| not_found_error("booking", id))
}

#[tracing::instrument(skip(store))]
pub async fn fetch_driver(store: &DynStore, id: Uuid) -> Result<Driver, Error> {
    store
        .find_driver(id)
        .await?
        .ok_or_else(|| not_found_error("driver", id))
}
