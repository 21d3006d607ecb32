//! [`Command`] for refreshing a session of a [`User`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        principal::BlockedError,
        user::{self, session},
        Principal, User,
    },
    infra::{database, Database},
    token, Service,
};

use super::Command;

/// [`Command`] minting a new access [`session::Token`] out of a refresh one.
///
/// The new [`session::Token`] carries the current [`user::Role`] of the
/// [`User`], not the one it had on login.
#[derive(Clone, Debug, From)]
pub struct RefreshUserSession {
    /// Raw refresh [`session::Token`].
    pub refresh_token: String,
}

/// Output of [`RefreshUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// New access [`session::Token`].
    pub token: session::Token,

    /// [`User`] the [`session::Token`] has been issued to.
    pub user: User,

    /// [`DateTime`] when the new [`session::Token`] expires.
    ///
    /// [`DateTime`]: common::DateTime
    pub expires_at: session::ExpirationDateTime,
}

impl<Db> Command<RefreshUserSession> for Service<Db>
where
    Db: for<'l> Database<
        Select<By<Option<User>, &'l user::Username>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RefreshUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RefreshUserSession { refresh_token } = cmd;
        let tokens = self.tokens();

        let claims = tokens
            .verify(&refresh_token)
            .ok()
            .filter(|c| c.kind == session::Kind::Refresh)
            .ok_or_else(|| tracerr::new!(E::InvalidRefreshToken))?;

        let username = user::Username::new(claims.sub.as_str())
            .ok_or_else(|| tracerr::new!(E::InvalidRefreshToken))?;
        let user = self
            .database()
            .execute(Select(By::new(&username)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| tracerr::new!(E::UserNotExists(claims.sub)))?;
        Principal::from(&user)
            .check_access()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let roles = user.role.map(user::Role::marker);
        let token = tokens
            .refresh_access_token(&refresh_token, roles)
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let expires_at = (tokens.now() + tokens.ttl()).coerce();

        Ok(Output {
            token,
            user,
            expires_at,
        })
    }
}

/// Error of [`RefreshUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Provided [`session::Token`] is not a valid refresh one.
    #[display("Invalid refresh token")]
    #[from(ignore)]
    InvalidRefreshToken,

    /// [`User`] of the [`session::Token`] doesn't exist anymore.
    #[display("`User({_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] String),

    /// Account state of the [`User`] blocks the access.
    #[display("{_0}")]
    Blocked(BlockedError),

    /// New access [`session::Token`] failed to be issued.
    #[display("{_0}")]
    Refresh(token::RefreshError),
}

#[cfg(test)]
mod spec {
    use common::operations::{Insert, Update};
    use secrecy::SecretString;

    use crate::{
        domain::{
            principal::{spec::user, BlockedError},
            user::{Role, Status},
        },
        infra::{Database as _, Memory},
        token::{Codec, KeyPolicy},
        Command as _, Config, Service,
    };

    use super::{ExecutionError, RefreshUserSession};

    fn service() -> Service<Memory> {
        let tokens = Codec::new(
            &SecretString::from("short".to_owned()),
            std::time::Duration::from_secs(60 * 60),
            KeyPolicy::Pad,
        )
        .unwrap();
        Service::new(Config { tokens }, Memory::default())
    }

    #[tokio::test]
    async fn mints_access_token_with_current_role() {
        let svc = service();
        let id = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();
        let refresh = svc.tokens().issue_refresh_token("lee").unwrap();

        let mut u = user(0, "lee", Some(Role::Manager), Status::Active);
        u.id = id;
        svc.database().execute(Update(u)).await.unwrap();

        let out = svc
            .execute(RefreshUserSession {
                refresh_token: refresh.to_string(),
            })
            .await
            .unwrap();

        let claims = svc.tokens().verify(out.token.as_ref()).unwrap();
        assert!(svc.tokens().is_access_token(out.token.as_ref()));
        assert_eq!(claims.sub, "lee");
        assert_eq!(claims.roles, ["ROLE_MANAGER"]);
    }

    #[tokio::test]
    async fn rejects_access_token() {
        let svc = service();
        _ = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();
        let access = svc
            .tokens()
            .issue_access_token("lee", ["ROLE_SALES"])
            .unwrap();

        let err = svc
            .execute(RefreshUserSession {
                refresh_token: access.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn rejects_disabled_account() {
        let svc = service();
        _ = svc
            .database()
            .execute(Insert(user(0, "gone", None, Status::Inactive)))
            .await
            .unwrap();
        let refresh = svc.tokens().issue_refresh_token("gone").unwrap();

        let err = svc
            .execute(RefreshUserSession {
                refresh_token: refresh.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Blocked(BlockedError::Disabled),
        ));
    }
}
