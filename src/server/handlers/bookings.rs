use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{Booking, NewBooking, Violation};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct ProposeFareParams {
    fare: f64,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<NewBooking>,
) -> Result<Json<Booking>, Error> {
    let booking = api.create_booking(user, params).await?;

    Ok(booking.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Booking>>, Error> {
    let bookings = api.list_bookings(user).await?;

    Ok(bookings.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.find_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn propose_fare(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<ProposeFareParams>,
) -> Result<Json<Booking>, Error> {
    let booking = api.propose_fare(user, id, params.fare).await?;

    Ok(booking.into())
}

pub async fn approve(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.approve_fare(user, id).await?;

    Ok(booking.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.reject_fare(user, id).await?;

    Ok(booking.into())
}

pub async fn start(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.start_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn complete(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.complete_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.cancel_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn request_driver(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Booking>>, Error> {
    let booking = api.request_driver(user, id).await?;

    Ok(booking.into())
}

pub async fn audit(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Violation>>, Error> {
    let violations = api.audit(user).await?;

    Ok(violations.into())
}
