//! [`Command`] for updating a [`user::Password`].

use common::operations::{By, Select, Update};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretBox, SecretString};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::Password;
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for updating a [`user::Password`].
#[derive(Clone, Debug)]
pub struct UpdateUserPassword {
    /// ID of the [`User`] which [`Password`] should be updated.
    pub user_id: user::Id,

    /// Current [`Password`] of the [`User`].
    pub old_password: SecretString,

    /// New [`Password`] of the [`User`].
    pub new_password: SecretBox<user::Password>,
}

impl<Db> Command<UpdateUserPassword> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Update<User>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateUserPassword,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateUserPassword {
            user_id,
            old_password,
            new_password,
        } = cmd;

        let mut user = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| tracerr::new!(E::UserNotExists(user_id)))?;
        if !user.password_hash.verify(old_password.expose_secret()) {
            return Err(tracerr::new!(E::WrongPassword));
        }

        user.password_hash =
            user::PasswordHash::new(new_password.expose_secret())
                .map_err(tracerr::from_and_wrap!(=> E))?;
        self.database()
            .execute(Update(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tracing::info!(username = %user.username, "password changed");

        Ok(user)
    }
}

/// Error of [`UpdateUserPassword`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// New [`Password`] failed to be hashed.
    #[display("{_0}")]
    Hash(user::HashError),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),

    /// Wrong old [`Password`] provided.
    #[display("Wrong old password")]
    #[from(ignore)]
    WrongPassword,
}

#[cfg(test)]
mod spec {
    use common::operations::Insert;
    use secrecy::{SecretBox, SecretString};

    use crate::{
        domain::{
            principal::spec::user,
            user::{Password, Role, Status},
        },
        infra::{Database as _, Memory},
        token::{Codec, KeyPolicy},
        Command as _, Config, Service,
    };

    use super::{ExecutionError, UpdateUserPassword};

    fn service() -> Service<Memory> {
        let tokens = Codec::new(
            &SecretString::from("short".to_owned()),
            std::time::Duration::from_secs(60),
            KeyPolicy::Pad,
        )
        .unwrap();
        Service::new(Config { tokens }, Memory::default())
    }

    fn cmd(id: crate::domain::user::Id, old: &str) -> UpdateUserPassword {
        UpdateUserPassword {
            user_id: id,
            old_password: SecretString::from(old.to_owned()),
            new_password: SecretBox::new(Box::new(
                Password::new("654321").unwrap(),
            )),
        }
    }

    #[tokio::test]
    async fn replaces_hash_when_old_password_matches() {
        let svc = service();
        let id = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();

        let updated = svc.execute(cmd(id, "123456")).await.unwrap();

        assert!(updated.password_hash.verify("654321"));
        assert!(!updated.password_hash.verify("123456"));
    }

    #[tokio::test]
    async fn rejects_wrong_old_password() {
        let svc = service();
        let id = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();

        let err = svc.execute(cmd(id, "nope!!")).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongPassword));
    }
}
