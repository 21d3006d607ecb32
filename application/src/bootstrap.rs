//! Default administrator account seeding.

use secrecy::{ExposeSecret as _, SecretBox};
use service::{command, domain::user, query, Command as _};
use tracing as log;

use crate::{config, AsError, Error, Service};

/// Creates the configured administrator account, unless it's disabled or
/// its username is already taken.
///
/// # Errors
///
/// If the configured account is malformed or fails to be stored.
pub async fn bootstrap(
    service: &Service,
    conf: &config::Bootstrap,
) -> Result<(), Error> {
    if !conf.enabled {
        return Ok(());
    }

    let invalid = |field: &str| {
        Error::internal(&format!("invalid `bootstrap.{field}` configuration"))
    };
    let username = user::Username::new(conf.username.as_str())
        .ok_or_else(|| invalid("username"))?;
    let password = user::Password::new(conf.password.expose_secret())
        .ok_or_else(|| invalid("password"))?;
    let real_name = user::RealName::new(conf.real_name.as_str())
        .ok_or_else(|| invalid("real_name"))?;

    let existing = service
        .execute(query::user::ByUsername::by(&username))
        .await
        .map_err(AsError::into_error)?;
    if existing.is_some() {
        log::debug!(%username, "administrator account already exists");
        return Ok(());
    }

    let admin = service
        .execute(command::CreateUser {
            username,
            password: SecretBox::init_with(move || password),
            real_name,
            email: None,
            phone: None,
            department: user::Department::new(conf.department.as_str()),
            role: Some(user::Role::Admin),
        })
        .await
        .map_err(AsError::into_error)?;
    log::warn!(
        username = %admin.username,
        "default administrator account created, change its password",
    );

    Ok(())
}
