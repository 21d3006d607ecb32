//! HTTP API definitions.

pub mod auth;
pub mod system;
pub mod user;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::DateTime;
use serde::Serialize;

use crate::define_error;

pub use self::user::User;

/// Envelope of every successful API response.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// HTTP status code mirrored into the body.
    pub code: u16,

    /// Human-readable outcome.
    pub message: &'static str,

    /// Payload.
    pub data: Option<T>,

    /// RFC 3339 moment of producing this [`ApiResponse`].
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    /// Wraps the provided `data` into a successful [`ApiResponse`].
    #[must_use]
    pub fn ok(message: &'static str, data: T) -> Self {
        Self {
            code: http::StatusCode::OK.as_u16(),
            message,
            data: Some(data),
            timestamp: DateTime::now().to_rfc3339(),
        }
    }

    /// Creates a successful [`ApiResponse`] without any payload.
    #[must_use]
    pub fn empty(message: &'static str) -> Self {
        Self {
            code: http::StatusCode::OK.as_u16(),
            message,
            data: None,
            timestamp: DateTime::now().to_rfc3339(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Builds the [`Router`] of the whole HTTP API.
///
/// The returned [`Router`] is unprotected: see [`crate::secure()`].
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(system::root))
        .route("/actuator/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/user-info", get(auth::user_info))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/change-password", post(auth::change_password))
        .fallback(system::not_found)
}

define_error! {
    enum InputError {
        #[code = "PASSWORD_MISMATCH"]
        #[status = BAD_REQUEST]
        #[message = "Password confirmation does not match"]
        PasswordMismatch,

        #[code = "INVALID_USERNAME"]
        #[status = BAD_REQUEST]
        #[message = "Username must be 1 to 50 characters without spaces"]
        Username,

        #[code = "INVALID_PASSWORD"]
        #[status = BAD_REQUEST]
        #[message = "Password must be 6 to 20 characters long"]
        Password,

        #[code = "INVALID_REAL_NAME"]
        #[status = BAD_REQUEST]
        #[message = "Real name must be 1 to 100 characters long"]
        RealName,

        #[code = "INVALID_EMAIL"]
        #[status = BAD_REQUEST]
        #[message = "Email address is malformed"]
        Email,

        #[code = "INVALID_PHONE"]
        #[status = BAD_REQUEST]
        #[message = "Phone number is malformed"]
        Phone,

        #[code = "INVALID_DEPARTMENT"]
        #[status = BAD_REQUEST]
        #[message = "Department must be 1 to 100 characters long"]
        Department,

        #[code = "MISSING_REFRESH_TOKEN"]
        #[status = BAD_REQUEST]
        #[message = "Refresh token is required"]
        MissingRefreshToken,
    }
}

define_error! {
    enum SessionError {
        #[code = "AUTHENTICATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authentication required"]
        Required,

        #[code = "USER_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "User does not exist"]
        UserNotExists,
    }
}

define_error! {
    enum RouteError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Requested resource does not exist"]
        NotFound,
    }
}
