//! [`Command`] for creating a new [`User`].

use common::operations::{By, Insert, Select};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{
    Department, Email, Password, Phone, RealName, Username,
};
use crate::{
    domain::{user, User},
    infra::{
        database::{self, EMAIL_CONSTRAINT, USERNAME_CONSTRAINT},
        Database,
    },
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`user::Status::Active`] [`User`].
#[derive(Clone, Debug)]
pub struct CreateUser {
    /// [`Username`] of a new [`User`].
    pub username: user::Username,

    /// [`Password`] of a new [`User`].
    pub password: SecretBox<user::Password>,

    /// [`RealName`] of a new [`User`].
    pub real_name: user::RealName,

    /// [`Email`] of a new [`User`].
    pub email: Option<user::Email>,

    /// [`Phone`] of a new [`User`].
    pub phone: Option<user::Phone>,

    /// [`Department`] of a new [`User`].
    pub department: Option<user::Department>,

    /// [`user::Role`] of a new [`User`].
    ///
    /// [`user::Role::Sales`] if [`None`].
    pub role: Option<user::Role>,
}

impl<Db> Command<CreateUser> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<User>, &'l user::Username>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Select<By<Option<User>, &'l user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Insert<User>,
            Ok = user::Id,
            Err = Traced<database::Error>,
        >,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            username,
            password,
            real_name,
            email,
            phone,
            department,
            role,
        } = cmd;

        let occupied = self
            .database()
            .execute(Select(By::new(&username)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if occupied.is_some() {
            return Err(tracerr::new!(E::UsernameOccupied(username)));
        }
        if let Some(email) = &email {
            let occupied = self
                .database()
                .execute(Select(By::new(email)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if occupied.is_some() {
                return Err(tracerr::new!(E::EmailOccupied(email.clone())));
            }
        }

        let password_hash = user::PasswordHash::new(password.expose_secret())
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let mut user = User {
            id: user::Id::default(),
            username,
            password_hash,
            real_name,
            email,
            phone,
            role: Some(role.unwrap_or(user::Role::Sales)),
            status: user::Status::Active,
            department,
            avatar_url: None,
            last_login_at: None,
            created_at: self.tokens().now().coerce(),
        };

        // Concurrent registrations may still race past the checks above.
        user.id = self
            .database()
            .execute(Insert(user.clone()))
            .await
            .map_err(|e| {
                let db = e.as_ref();
                match &user.email {
                    _ if db.is_unique_violation(Some(USERNAME_CONSTRAINT)) => {
                        let username = user.username.clone();
                        tracerr::new!(E::UsernameOccupied(username))
                    }
                    Some(email)
                        if db.is_unique_violation(Some(EMAIL_CONSTRAINT)) =>
                    {
                        tracerr::new!(E::EmailOccupied(email.clone()))
                    }
                    _ => tracerr::map_from(e),
                }
            })?;

        tracing::info!(
            id = %user.id,
            username = %user.username,
            "user registered",
        );

        Ok(user)
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Password`] failed to be hashed.
    #[display("{_0}")]
    Hash(user::HashError),

    /// [`Username`] is already occupied.
    #[display("`{_0}` username is occupied")]
    #[from(ignore)]
    UsernameOccupied(#[error(not(source))] user::Username),

    /// [`Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    #[from(ignore)]
    EmailOccupied(#[error(not(source))] user::Email),
}
