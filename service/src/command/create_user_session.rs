//! [`Command`] for creating a session of a [`User`].

use common::operations::{By, Select, Update};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretString};
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session},
        User,
    },
    infra::{database, Database},
    token, Service,
};

use super::Command;

/// [`Command`] for creating a session of a [`User`] by its credentials.
#[derive(Clone, Debug)]
pub struct CreateUserSession {
    /// Username of the [`User`].
    pub username: String,

    /// Password of the [`User`].
    pub password: SecretString,
}

/// Output of [`CreateUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Access [`session::Token`] of the created session.
    pub access_token: session::Token,

    /// Refresh [`session::Token`] of the created session.
    pub refresh_token: session::Token,

    /// [`User`] whose session has been created.
    pub user: User,

    /// [`DateTime`] when the access [`session::Token`] expires.
    ///
    /// [`DateTime`]: common::DateTime
    pub expires_at: session::ExpirationDateTime,
}

impl<Db> Command<CreateUserSession> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<User>, &'l user::Username>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Update<User>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUserSession { username, password } = cmd;

        let username = user::Username::new(username)
            .ok_or_else(|| tracerr::new!(E::WrongCredentials))?;
        let mut user = self
            .database()
            .execute(Select(By::new(&username)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| tracerr::new!(E::WrongCredentials))?;
        if !user.password_hash.verify(password.expose_secret()) {
            return Err(tracerr::new!(E::WrongCredentials));
        }
        if user.status == user::Status::Inactive {
            return Err(tracerr::new!(E::AccountDisabled));
        }

        let tokens = self.tokens();
        user.last_login_at = Some(tokens.now().coerce());
        self.database()
            .execute(Update(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let roles = user.role.map(user::Role::marker);
        let access_token = tokens
            .issue_access_token(user.username.as_ref(), roles)
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let refresh_token = tokens
            .issue_refresh_token(user.username.as_ref())
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let expires_at = (tokens.now() + tokens.ttl()).coerce();

        tracing::info!(username = %user.username, "user logged in");

        Ok(Output {
            access_token,
            refresh_token,
            user,
            expires_at,
        })
    }
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Session [`session::Token`] failed to be issued.
    #[display("{_0}")]
    Issue(token::IssueError),

    /// Provided credentials don't match any [`User`].
    #[display("Wrong `User` credentials")]
    #[from(ignore)]
    WrongCredentials,

    /// [`User`] account is [`user::Status::Inactive`].
    #[display("`User` account is disabled")]
    #[from(ignore)]
    AccountDisabled,
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Insert, Select};
    use secrecy::SecretString;

    use crate::{
        domain::{
            principal::spec::user,
            user::{Role, Status},
            User,
        },
        infra::{Database as _, Memory},
        token::{Codec, KeyPolicy},
        Command as _, Config, Service,
    };

    use super::{CreateUserSession, ExecutionError};

    fn service() -> Service<Memory> {
        let tokens = Codec::new(
            &SecretString::from("short".to_owned()),
            std::time::Duration::from_secs(60 * 60),
            KeyPolicy::Pad,
        )
        .unwrap();
        Service::new(Config { tokens }, Memory::default())
    }

    fn login(username: &str, password: &str) -> CreateUserSession {
        CreateUserSession {
            username: username.into(),
            password: SecretString::from(password.to_owned()),
        }
    }

    #[tokio::test]
    async fn issues_token_pair_and_records_login() {
        let svc = service();
        let id = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();

        let out = svc.execute(login("lee", "123456")).await.unwrap();

        let access = svc.tokens().verify(out.access_token.as_ref()).unwrap();
        assert_eq!(access.sub, "lee");
        assert_eq!(access.roles, ["ROLE_SALES"]);
        assert!(svc.tokens().is_refresh_token(out.refresh_token.as_ref()));
        let stored = svc
            .database()
            .execute(Select(By::<Option<User>, _>::new(id)))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn rejects_wrong_credentials_alike() {
        let svc = service();
        _ = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();

        for (username, password) in
            [("lee", "wrong!"), ("ghost", "123456"), ("", "123456")]
        {
            let err = svc.execute(login(username, password)).await.unwrap_err();
            assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
        }
    }

    #[tokio::test]
    async fn rejects_disabled_account() {
        let svc = service();
        _ = svc
            .database()
            .execute(Insert(user(0, "gone", None, Status::Inactive)))
            .await
            .unwrap();

        let err = svc.execute(login("gone", "123456")).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::AccountDisabled));
    }
}
