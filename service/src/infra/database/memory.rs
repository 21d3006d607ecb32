//! In-memory [`Database`] implementation.

use std::{collections::BTreeMap, sync::Arc};

use common::operations::{By, Insert, Select, Update};
use derive_more::{Display, Error as StdError};
use tokio::sync::RwLock;
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{
        database::{self, EMAIL_CONSTRAINT, USERNAME_CONSTRAINT},
        Database,
    },
};

/// In-memory user directory.
///
/// Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Stored [`User`]s.
    users: Arc<RwLock<Users>>,
}

/// [`User`]s stored in a [`Memory`] directory.
#[derive(Debug, Default)]
struct Users {
    /// [`User`]s by their IDs.
    by_id: BTreeMap<user::Id, User>,

    /// Last assigned [`user::Id`].
    last_id: i64,
}

impl Users {
    /// Checks that the `user` doesn't clash with any other stored [`User`].
    fn check_unique(&self, user: &User) -> Result<(), Error> {
        for other in self.by_id.values().filter(|u| u.id != user.id) {
            if other.username == user.username {
                return Err(Error::UniqueViolation(USERNAME_CONSTRAINT));
            }
            if other.email.is_some() && other.email == user.email {
                return Err(Error::UniqueViolation(EMAIL_CONSTRAINT));
            }
        }
        Ok(())
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError, Eq, PartialEq)]
pub enum Error {
    /// Unique constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),

    /// Updated [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    NotFound(#[error(not(source))] user::Id),
}

impl Error {
    /// Checks if this [`Error`] is a violation of the specified unique
    /// `constraint`, or of any one if [`None`].
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |x| x == *c),
            Self::NotFound(_) => false,
        }
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.users.read().await.by_id.get(by.by()).cloned())
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Username>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Username>>,
    ) -> Result<Self::Ok, Self::Err> {
        let username = by.into_inner();
        Ok(self
            .users
            .read()
            .await
            .by_id
            .values()
            .find(|u| &u.username == username)
            .cloned())
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Email>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self
            .users
            .read()
            .await
            .by_id
            .values()
            .find(|u| u.email.as_ref() == Some(email))
            .cloned())
    }
}

impl Database<Insert<User>> for Memory {
    type Ok = user::Id;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(mut user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut users = self.users.write().await;

        let id = user::Id::from(users.last_id + 1);
        user.id = id;
        users
            .check_unique(&user)
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;

        users.last_id += 1;
        _ = users.by_id.insert(id, user);
        Ok(id)
    }
}

impl Database<Update<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut users = self.users.write().await;

        if !users.by_id.contains_key(&user.id) {
            return Err(tracerr::new!(database::Error::from(Error::NotFound(
                user.id
            ))));
        }
        users
            .check_unique(&user)
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;

        _ = users.by_id.insert(user.id, user);
        Ok(())
    }
}
