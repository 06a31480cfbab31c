use axum::{
    async_trait,
    extract::{FromRequest, RequestParts},
    http::HeaderMap,
};
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::error::{unauthorized_error, validation_error, Error};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header_value<'a>(headers: &'a HeaderMap, key: &str) -> Result<&'a str, Error> {
    let value = headers
        .get(key)
        .ok_or_else(unauthorized_error)?
        .to_str()
        .map_err(|_| validation_error(format!("{} is not valid text", key)))?
        .trim();

    if value.is_empty() {
        return Err(unauthorized_error());
    }

    Ok(value)
}

/// Caller identity taken from the `x-user-id` and `x-user-role` headers.
#[async_trait]
impl<B: Send> FromRequest<B> for User {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let headers = req.headers();

        let id: Uuid = header_value(headers, USER_ID_HEADER)?
            .parse()
            .map_err(|_| validation_error(format!("{} must be a uuid", USER_ID_HEADER)))?;
        let role: Role = header_value(headers, USER_ROLE_HEADER)?.parse()?;

        Ok(User::new(id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<User, Error> {
        let mut builder = Request::builder().uri("/bookings");
        for (key, value) in headers {
            builder = builder.header(*key, *value);
        }

        let mut parts = RequestParts::new(builder.body(()).unwrap());
        User::from_request(&mut parts).await
    }

    #[tokio::test]
    async fn reads_identity_from_headers() {
        let id = Uuid::new_v4();
        let raw = id.to_string();
        let user = extract(&[(USER_ID_HEADER, raw.as_str()), (USER_ROLE_HEADER, "Driver")])
            .await
            .unwrap();

        assert_eq!(user, User::driver(id));
    }

    #[tokio::test]
    async fn missing_or_malformed_identity_is_refused() {
        let err = extract(&[]).await.unwrap_err();
        assert!(err.is_unauthorized_error());

        let err = extract(&[(USER_ID_HEADER, "42"), (USER_ROLE_HEADER, "admin")])
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        let id = Uuid::new_v4().to_string();
        let err = extract(&[(USER_ID_HEADER, id.as_str()), (USER_ROLE_HEADER, "dispatcher")])
            .await
            .unwrap_err();
        assert!(err.is_validation_error());
    }
}
