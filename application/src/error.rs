//! [`Error`]-related definitions.

use std::fmt;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use common::DateTime;
use derive_more::Error as StdError;
use itertools::Itertools as _;
use service::{command, infra::database, query};
use tracerr::{Trace, Traced};

/// Defines a new error type.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[status = $status_code:ident]
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        #[repr(u16)]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            status_code: ::http::StatusCode::$status_code,
                            message: $message.to_string(),
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
}

/// HTTP API [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// [`http::StatusCode`] of this [`Error`].
    pub status_code: http::StatusCode,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// [`Error`] message.
    pub message: String,
}

impl Error {
    /// Create a new [`Error`] representing an internal server error.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_SERVER_ERROR",
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Creates a new [`http::StatusCode::BAD_REQUEST`] [`Error`] with the
    /// provided `code`.
    #[must_use]
    pub fn bad_request(code: Code, msg: &impl ToString) -> Self {
        Self {
            code,
            status_code: http::StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            backtrace: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            status_code: _,
            backtrace,
            message,
        } = self;

        write!(
            f,
            "[{code}]: {message}{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("{trace}"))),
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            tracing::error!("{self}");
        }

        // Backtraces stay in logs only.
        let body = serde_json::json!({
            "code": self.status_code.as_u16(),
            "error": self.code,
            "message": self.message,
            "data": null,
            "timestamp": DateTime::now().to_rfc3339(),
        });
        (self.status_code, Json(body)).into_response()
    }
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for JsonRejection {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error {
            code: "BAD_REQUEST",
            status_code: self.status(),
            message: self.body_text(),
            backtrace: None,
        })
    }
}

impl AsError for QueryRejection {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error {
            code: "BAD_REQUEST",
            status_code: self.status(),
            message: self.body_text(),
            backtrace: None,
        })
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for command::authorize_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use service::domain::principal::BlockedError;

        define_error! {
            enum Error {
                #[code = "TOKEN_WRONG_TYPE"]
                #[status = UNAUTHORIZED]
                #[message = "Refresh token cannot be used for API access"]
                WrongKind,

                #[code = "IDENTITY_NOT_FOUND"]
                #[status = UNAUTHORIZED]
                #[message = "Token subject does not exist"]
                IdentityNotFound,

                #[code = "SUBJECT_MISMATCH"]
                #[status = UNAUTHORIZED]
                #[message = "Token subject does not match the resolved user"]
                SubjectMismatch,

                #[code = "ACCOUNT_DISABLED"]
                #[status = UNAUTHORIZED]
                #[message = "Account is disabled"]
                Disabled,

                #[code = "ACCOUNT_LOCKED"]
                #[status = UNAUTHORIZED]
                #[message = "Account is locked"]
                Locked,

                #[code = "ACCOUNT_EXPIRED"]
                #[status = UNAUTHORIZED]
                #[message = "Account is expired"]
                Expired,

                #[code = "CREDENTIALS_EXPIRED"]
                #[status = UNAUTHORIZED]
                #[message = "Account credentials are expired"]
                CredentialsExpired,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::Token(e) => crate::Error {
                code: e.code(),
                status_code: http::StatusCode::UNAUTHORIZED,
                message: e.to_string(),
                backtrace: None,
            },
            Self::WrongKind(_) => Error::WrongKind.into(),
            Self::IdentityNotFound(_) => Error::IdentityNotFound.into(),
            Self::SubjectMismatch => Error::SubjectMismatch.into(),
            Self::Blocked(BlockedError::Disabled) => Error::Disabled.into(),
            Self::Blocked(BlockedError::Locked) => Error::Locked.into(),
            Self::Blocked(BlockedError::Expired) => Error::Expired.into(),
            Self::Blocked(BlockedError::CredentialsExpired) => {
                Error::CredentialsExpired.into()
            }
        })
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_CREDENTIALS"]
                #[status = BAD_REQUEST]
                #[message = "Wrong username or password"]
                WrongCredentials,

                #[code = "ACCOUNT_DISABLED"]
                #[status = FORBIDDEN]
                #[message = "Account is disabled, contact the administrator"]
                AccountDisabled,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Issue(_) => None,
            Self::WrongCredentials => Some(Error::WrongCredentials.into()),
            Self::AccountDisabled => Some(Error::AccountDisabled.into()),
        }
    }
}

impl AsError for command::refresh_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use service::token::RefreshError;

        define_error! {
            enum Error {
                #[code = "INVALID_REFRESH_TOKEN"]
                #[status = UNAUTHORIZED]
                #[message = "Refresh token is invalid or expired"]
                InvalidRefreshToken,

                #[code = "ACCOUNT_DISABLED"]
                #[status = FORBIDDEN]
                #[message = "Account is disabled, contact the administrator"]
                AccountDisabled,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::InvalidRefreshToken | Self::UserNotExists(_) => {
                Some(Error::InvalidRefreshToken.into())
            }
            Self::Blocked(_) => Some(Error::AccountDisabled.into()),
            Self::Refresh(RefreshError::InvalidRefreshToken) => {
                Some(Error::InvalidRefreshToken.into())
            }
            Self::Refresh(RefreshError::Issue(_)) => None,
        }
    }
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "USERNAME_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "Username is occupied by another user"]
                UsernameOccupied,

                #[code = "EMAIL_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "Email is occupied by another user"]
                EmailOccupied,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Hash(_) => None,
            Self::UsernameOccupied(_) => Some(Error::UsernameOccupied.into()),
            Self::EmailOccupied(_) => Some(Error::EmailOccupied.into()),
        }
    }
}

impl AsError for command::update_user_password::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_PASSWORD"]
                #[status = BAD_REQUEST]
                #[message = "Provided old password does not match the \
                             current one"]
                WrongPassword,

                #[code = "USER_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "User does not exist"]
                UserNotExists,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Hash(_) => None,
            Self::UserNotExists(_) => Some(Error::UserNotExists.into()),
            Self::WrongPassword => Some(Error::WrongPassword.into()),
        }
    }
}

impl AsError for query::principal::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::IdentityNotFound(_) => None,
        }
    }
}
