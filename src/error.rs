use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{Debug, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Persistence,
    Unexpected,
    InvalidTransition,
    Validation,
    NotFound,
    Unauthorized,
}

impl ErrorKind {
    /// Internal kinds live in 1..=99, anything the caller can correct is 100 and up.
    pub fn code(&self) -> i32 {
        match self {
            Self::Config => 1,
            Self::Persistence => 2,
            Self::Unexpected => 5,
            Self::InvalidTransition => 100,
            Self::Validation => 101,
            Self::NotFound => 102,
            Self::Unauthorized => 103,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn is_invalid_transition_error(&self) -> bool {
        self.kind == ErrorKind::InvalidTransition
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    pub fn is_not_found_error(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_persistence_error(&self) -> bool {
        self.kind == ErrorKind::Persistence
    }

    pub fn is_unauthorized_error(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        config_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        persistence_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        persistence_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        unexpected_error(format!("authorizer error: {}", err))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.kind {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, self.message.as_str()),
            ErrorKind::InvalidTransition => (StatusCode::CONFLICT, self.message.as_str()),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.message.as_str()),
            ErrorKind::Unauthorized => (StatusCode::FORBIDDEN, self.message.as_str()),
            ErrorKind::Config | ErrorKind::Persistence | ErrorKind::Unexpected => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        let body = Json(json!({
            "code": self.code(),
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn invalid_transition_error(from: impl Display, event: &str) -> Error {
    Error {
        kind: ErrorKind::InvalidTransition,
        message: format!("cannot {} a booking in status {}", event, from),
    }
}

pub fn driver_state_error(driver_id: impl Display, state: &str) -> Error {
    Error {
        kind: ErrorKind::InvalidTransition,
        message: format!("driver {} is {}", driver_id, state),
    }
}

pub fn stale_write_error(entity: &str) -> Error {
    Error {
        kind: ErrorKind::InvalidTransition,
        message: format!("{} changed since it was read", entity),
    }
}

pub fn validation_error(message: impl Into<String>) -> Error {
    Error {
        kind: ErrorKind::Validation,
        message: message.into(),
    }
}

pub fn not_found_error(entity: &str, id: impl Display) -> Error {
    Error {
        kind: ErrorKind::NotFound,
        message: format!("{} {} not found", entity, id),
    }
}

pub fn unauthorized_error() -> Error {
    Error {
        kind: ErrorKind::Unauthorized,
        message: "unauthorized".into(),
    }
}

pub fn config_error<T: Debug>(err: T) -> Error {
    Error {
        kind: ErrorKind::Config,
        message: format!("configuration error: {:?}", err),
    }
}

pub fn persistence_error<T: Debug>(err: T) -> Error {
    tracing::error!(error = ?err, "persistence failure");

    Error {
        kind: ErrorKind::Persistence,
        message: "persistence error".into(),
    }
}

pub fn unexpected_error(message: impl Into<String>) -> Error {
    Error {
        kind: ErrorKind::Unexpected,
        message: message.into(),
    }
}
