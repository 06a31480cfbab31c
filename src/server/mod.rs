mod extract;
mod handlers;

use std::net::SocketAddr;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::DynAPI;
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{bookings, drivers};

pub use extract::{USER_ID_HEADER, USER_ROLE_HEADER};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/bookings", post(bookings::create).get(bookings::list))
        .route("/bookings/:id", get(bookings::find))
        .route("/bookings/:id/fare", patch(bookings::propose_fare))
        .route("/bookings/:id/approve", patch(bookings::approve))
        .route("/bookings/:id/reject", patch(bookings::reject))
        .route("/bookings/:id/start", patch(bookings::start))
        .route("/bookings/:id/complete", patch(bookings::complete))
        .route("/bookings/:id/cancel", patch(bookings::cancel))
        .route("/bookings/:id/driver/request", patch(bookings::request_driver))
        .route("/drivers", post(drivers::create).get(drivers::list))
        .route("/drivers/:id", get(drivers::find))
        .route("/audit", get(bookings::audit))
        .layer(Extension(api))
}

/// Serves until Ctrl-C, then lets in-flight requests finish.
#[tracing::instrument(skip(api))]
pub async fn serve(api: DynAPI, addr: SocketAddr) -> Result<(), Error> {
    let app = router(api);

    let server = axum::Server::try_bind(&addr)
        .map_err(|err| unexpected_error(format!("cannot bind {}: {}", addr, err)))?;

    tracing::info!("listening on {}", addr);

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| unexpected_error(format!("server error: {}", err)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }

    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::db::MemoryStore;
    use crate::engine::Engine;
    use crate::matching::FareBidding;

    fn app() -> Router {
        let engine = Engine::new(Arc::new(MemoryStore::new()), Box::new(FareBidding)).unwrap();

        router(Arc::new(engine))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        caller: Option<(Uuid, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = caller {
            builder = builder
                .header(USER_ID_HEADER, id.to_string())
                .header(USER_ROLE_HEADER, role);
        }

        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, body)
    }

    #[tokio::test]
    async fn booking_flow_over_http() {
        let app = app();
        let admin = Uuid::new_v4();
        let customer = Uuid::new_v4();

        let (status, driver) = call(
            &app,
            Method::POST,
            "/drivers",
            Some((admin, "admin")),
            Some(json!({
                "name": "Ravi",
                "phone": "98200 00000",
                "vehicle_details": "Tata Ace",
                "current_location": "Andheri",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let driver_id: Uuid = driver["id"].as_str().unwrap().parse().unwrap();

        let (status, booking) = call(
            &app,
            Method::POST,
            "/bookings",
            Some((customer, "customer")),
            Some(json!({ "pickup_location": "Andheri", "dropoff_location": "Bandra" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booking["status"], "PENDING");
        let id = booking["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/bookings/{}/complete", id),
            Some((customer, "customer")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 100);

        let (status, booking) = call(
            &app,
            Method::PATCH,
            &format!("/bookings/{}/fare", id),
            Some((driver_id, "driver")),
            Some(json!({ "fare": 450.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booking["status"], "DRIVER_FOUND");

        let (status, booking) = call(
            &app,
            Method::PATCH,
            &format!("/bookings/{}/approve", id),
            Some((customer, "customer")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booking["status"], "ACCEPTED");

        let (status, violations) =
            call(&app, Method::GET, "/audit", Some((admin, "admin")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(violations, json!([]));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/bookings", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], 103);

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/bookings/{}", Uuid::new_v4()),
            Some((Uuid::new_v4(), "customer")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 102);

        let (status, body) = call(
            &app,
            Method::POST,
            "/bookings",
            Some((Uuid::new_v4(), "customer")),
            Some(json!({ "pickup_location": " ", "dropoff_location": "Bandra" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 101);
    }
}
