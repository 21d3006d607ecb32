//! Authentication endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    Json,
};
use secrecy::{ExposeSecret as _, SecretBox, SecretString};
use serde::Deserialize;
use service::{command, domain, query, Command as _};
use tracing as log;

use crate::{
    api::{self, user::session, ApiResponse, InputError, SessionError},
    AsError, Context, Error,
};

/// Name of the [`tracing::Span`] for the handlers.
const SPAN_NAME: &str = "HTTP handler";

/// Credentials of a login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username of the account.
    pub username: String,

    /// Password of the account.
    pub password: SecretString,
}

/// Logs a user in, issuing an access token and a refresh token.
///
/// # Errors
///
/// Possible error codes:
/// - `WRONG_CREDENTIALS` - no account matches the provided credentials;
/// - `ACCOUNT_DISABLED` - the account is not active.
#[tracing::instrument(skip_all, fields(otel.name = SPAN_NAME))]
pub async fn login(
    ctx: Context,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<session::LoginResult>, Error> {
    let Json(LoginRequest { username, password }) =
        payload.map_err(AsError::into_error)?;

    ctx.service()
        .execute(command::CreateUserSession { username, password })
        .await
        .map_err(AsError::into_error)
        .map(|out| ApiResponse::ok("Login succeeded", out.into()))
}

/// Registration form of a new account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Desired username.
    pub username: String,

    /// Desired password.
    pub password: SecretString,

    /// Repeated [`RegisterRequest::password`].
    pub confirm_password: SecretString,

    /// Real name of the account holder.
    pub real_name: String,

    /// Email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,

    /// Department name.
    #[serde(default)]
    pub department: Option<String>,
}

/// Registers a new active salesperson account.
///
/// # Errors
///
/// Possible error codes:
/// - `PASSWORD_MISMATCH` - the confirmation differs from the password;
/// - `INVALID_*` - a field is malformed;
/// - `USERNAME_OCCUPIED` - the username is taken;
/// - `EMAIL_OCCUPIED` - the email is taken.
#[tracing::instrument(skip_all, fields(otel.name = SPAN_NAME))]
pub async fn register(
    ctx: Context,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<api::User>, Error> {
    let Json(form) = payload.map_err(AsError::into_error)?;

    let password = new_password(&form.password, &form.confirm_password)?;
    let username = domain::user::Username::new(form.username)
        .ok_or(InputError::Username)?;
    let real_name = domain::user::RealName::new(form.real_name)
        .ok_or(InputError::RealName)?;
    let email = non_blank(form.email)
        .map(|e| domain::user::Email::new(e).ok_or(InputError::Email))
        .transpose()?;
    let phone = non_blank(form.phone)
        .map(|p| domain::user::Phone::new(p).ok_or(InputError::Phone))
        .transpose()?;
    let department = non_blank(form.department)
        .map(|d| {
            domain::user::Department::new(d).ok_or(InputError::Department)
        })
        .transpose()?;

    let user = ctx
        .service()
        .execute(command::CreateUser {
            username,
            password,
            real_name,
            email,
            phone,
            department,
            role: None,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(ApiResponse::ok("Registration succeeded", (&user).into()))
}

/// Refresh token presented in a query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshParams {
    /// Raw refresh token.
    pub refresh_token: Option<String>,
}

/// Refresh token presented in a JSON body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Raw refresh token.
    pub refresh_token: Option<String>,
}

/// Mints a new access token out of a refresh token, preferring the one in
/// the query string.
///
/// # Errors
///
/// Possible error codes:
/// - `MISSING_REFRESH_TOKEN` - no refresh token is provided;
/// - `INVALID_REFRESH_TOKEN` - the refresh token is invalid or expired, or
///                             its user is gone;
/// - `ACCOUNT_DISABLED` - the account is not active anymore.
#[tracing::instrument(skip_all, fields(otel.name = SPAN_NAME))]
pub async fn refresh(
    ctx: Context,
    params: Result<Query<RefreshParams>, QueryRejection>,
    body: Option<Json<RefreshRequest>>,
) -> Result<ApiResponse<session::RefreshResult>, Error> {
    let Query(params) = params.map_err(AsError::into_error)?;
    let refresh_token = non_blank(params.refresh_token)
        .or_else(|| body.and_then(|Json(b)| non_blank(b.refresh_token)))
        .ok_or(InputError::MissingRefreshToken)?;

    ctx.service()
        .execute(command::RefreshUserSession { refresh_token })
        .await
        .map_err(AsError::into_error)
        .map(|out| ApiResponse::ok("Token refreshed", out.into()))
}

/// Reports the validity of the presented access token.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHENTICATION_REQUIRED` - the request is anonymous.
#[tracing::instrument(skip_all, fields(otel.name = SPAN_NAME))]
pub async fn verify(
    ctx: Context,
) -> Result<ApiResponse<session::Verification>, Error> {
    let bound = ctx.session().ok_or(SessionError::Required)?;

    Ok(ApiResponse::ok(
        "Token is valid",
        session::Verification {
            valid: true,
            username: bound.principal.username.to_string(),
            expires_at: bound.expires_at.to_rfc3339(),
            remaining_millis: u64::try_from(bound.remaining.as_millis())
                .unwrap_or(u64::MAX),
        },
    ))
}

/// Returns the account of the bound principal together with its
/// permissions.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHENTICATION_REQUIRED` - the request is anonymous;
/// - `USER_NOT_EXISTS` - the account has vanished meanwhile.
#[tracing::instrument(skip_all, fields(otel.name = SPAN_NAME))]
pub async fn user_info(
    ctx: Context,
) -> Result<ApiResponse<api::user::Info>, Error> {
    let principal = ctx.principal().ok_or(SessionError::Required)?;

    let user = ctx
        .service()
        .execute(query::user::ById::by(principal.id))
        .await
        .map_err(AsError::into_error)?
        .ok_or(SessionError::UserNotExists)?;

    Ok(ApiResponse::ok(
        "User info retrieved",
        api::user::Info::new(&user, principal),
    ))
}

/// Acknowledges a logout.
///
/// Issued tokens stay valid until they expire.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHENTICATION_REQUIRED` - the request is anonymous.
#[tracing::instrument(skip_all, fields(otel.name = SPAN_NAME))]
pub async fn logout(ctx: Context) -> Result<ApiResponse<()>, Error> {
    let username = ctx.current_identity().ok_or(SessionError::Required)?;
    log::info!(%username, "user logged out");

    Ok(ApiResponse::empty("Logout succeeded"))
}

/// Password change form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Current password.
    pub old_password: SecretString,

    /// Desired password.
    pub new_password: SecretString,

    /// Repeated [`ChangePasswordRequest::new_password`].
    pub confirm_password: SecretString,
}

/// Changes the password of the bound principal.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHENTICATION_REQUIRED` - the request is anonymous;
/// - `PASSWORD_MISMATCH` - the confirmation differs from the new password;
/// - `INVALID_PASSWORD` - the new password is malformed;
/// - `WRONG_PASSWORD` - the old password doesn't match.
#[tracing::instrument(skip_all, fields(otel.name = SPAN_NAME))]
pub async fn change_password(
    ctx: Context,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<()>, Error> {
    let user_id = ctx.current_user_id().ok_or(SessionError::Required)?;
    let Json(form) = payload.map_err(AsError::into_error)?;

    let new_password =
        new_password(&form.new_password, &form.confirm_password)?;

    _ = ctx
        .service()
        .execute(command::UpdateUserPassword {
            user_id,
            old_password: form.old_password,
            new_password,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(ApiResponse::empty("Password changed"))
}

/// Validates a new `password` against its `confirmation`.
fn new_password(
    password: &SecretString,
    confirmation: &SecretString,
) -> Result<SecretBox<domain::user::Password>, InputError> {
    if password.expose_secret() != confirmation.expose_secret() {
        return Err(InputError::PasswordMismatch);
    }
    let password = domain::user::Password::new(password.expose_secret())
        .ok_or(InputError::Password)?;
    Ok(SecretBox::init_with(move || password))
}

/// Treats a blank optional field as an absent one.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
