//! [`Command`] for authorizing a session [`Token`].

use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{user::session::Token, User};
use crate::{
    domain::{
        principal::BlockedError,
        user::session::{Claims, Kind},
        Principal,
    },
    infra::database,
    query::{self, principal::ByIdentity},
    token, Query, Service,
};

use super::Command;

/// [`Command`] for authorizing a session [`Token`], resolving the
/// [`Principal`] it was issued to.
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// Raw session [`Token`] to authorize.
    pub token: String,
}

/// Output of [`AuthorizeUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Freshly resolved [`Principal`] of the [`Token`] subject.
    pub principal: Principal,

    /// Verified [`Claims`] of the [`Token`].
    pub claims: Claims,
}

impl<Db> Command<AuthorizeUserSession> for Service<Db>
where
    Self: Query<
        ByIdentity,
        Ok = Principal,
        Err = Traced<query::principal::ExecutionError>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let claims = self
            .tokens()
            .verify(&token)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        if claims.kind != Kind::Access {
            return Err(tracerr::new!(E::WrongKind(claims.kind)));
        }

        let principal = self
            .execute(ByIdentity(claims.sub.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if principal.username.as_ref() != claims.sub {
            return Err(tracerr::new!(E::SubjectMismatch));
        }
        principal
            .check_access()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        Ok(Output { principal, claims })
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Token`] failed verification.
    #[display("{_0}")]
    Token(token::Error),

    /// [`Token`] is of a wrong [`Kind`].
    #[display("Expected an access token, got a {_0} one")]
    #[from(ignore)]
    WrongKind(#[error(not(source))] Kind),

    /// [`Token`] subject doesn't exist in the user directory.
    #[display("`User({_0})` does not exist")]
    #[from(ignore)]
    IdentityNotFound(#[error(not(source))] String),

    /// Resolved [`Principal`] doesn't match the [`Token`] subject.
    #[display("Resolved `Principal` doesn't match the token subject")]
    #[from(ignore)]
    SubjectMismatch,

    /// Account state of the [`Principal`] blocks the access.
    #[display("{_0}")]
    Blocked(BlockedError),
}

impl From<query::principal::ExecutionError> for ExecutionError {
    fn from(e: query::principal::ExecutionError) -> Self {
        use query::principal::ExecutionError as E;

        match e {
            E::Db(e) => Self::Db(e),
            E::IdentityNotFound(id) => Self::IdentityNotFound(id),
        }
    }
}
