//! Principal Resolver: [`Query`] collection resolving a [`Principal`] out of
//! the user directory.
//!
//! Nothing is cached, so every resolution observes the latest [`Role`] and
//! [`Status`] of the [`User`].
//!
//! [`Role`]: crate::domain::user::Role
//! [`Status`]: crate::domain::user::Status

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{user, Principal, User},
    infra::{database, Database},
    Service,
};

use super::Query;

/// Resolves a [`Principal`] by the identity (username) of its [`User`].
#[derive(Clone, Debug)]
pub struct ByIdentity(pub String);

/// Resolves a [`Principal`] by the [`user::Id`] of its [`User`].
#[derive(Clone, Copy, Debug)]
pub struct ById(pub user::Id);

/// Checks whether the [`Principal`] of the identity exists and may access
/// the API.
#[derive(Clone, Debug)]
pub struct IsAccountValid(pub String);

/// Lists the permissions of the [`Principal`] of the identity.
///
/// An unknown identity has no permissions.
#[derive(Clone, Debug)]
pub struct PermissionsOf(pub String);

impl<Db> Query<ByIdentity> for Service<Db>
where
    Db: for<'l> Database<
        Select<By<Option<User>, &'l user::Username>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Principal;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        ByIdentity(identity): ByIdentity,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        // A malformed identity cannot belong to any `User`.
        let Some(username) = user::Username::new(identity.as_str()) else {
            return Err(tracerr::new!(E::IdentityNotFound(identity)));
        };

        self.database()
            .execute(Select(By::new(&username)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .as_ref()
            .map(Principal::from)
            .ok_or_else(|| tracerr::new!(E::IdentityNotFound(identity)))
    }
}

impl<Db> Query<ById> for Service<Db>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Principal;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, ById(id): ById) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        self.database()
            .execute(Select(By::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .as_ref()
            .map(Principal::from)
            .ok_or_else(|| tracerr::new!(E::IdentityNotFound(id.to_string())))
    }
}

impl<Db> Query<IsAccountValid> for Service<Db>
where
    Self: Query<ByIdentity, Ok = Principal, Err = Traced<ExecutionError>>,
{
    type Ok = bool;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        IsAccountValid(identity): IsAccountValid,
    ) -> Result<Self::Ok, Self::Err> {
        match self.execute(ByIdentity(identity)).await {
            Ok(p) => Ok(p.check_access().is_ok()),
            Err(e) if e.as_ref().is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<Db> Query<PermissionsOf> for Service<Db>
where
    Self: Query<ByIdentity, Ok = Principal, Err = Traced<ExecutionError>>,
{
    type Ok = Vec<String>;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        PermissionsOf(identity): PermissionsOf,
    ) -> Result<Self::Ok, Self::Err> {
        match self.execute(ByIdentity(identity)).await {
            Ok(p) => Ok(p.permissions().map(ToOwned::to_owned).collect()),
            Err(e) if e.as_ref().is_not_found() => Ok(vec![]),
            Err(e) => Err(e),
        }
    }
}

/// Error of resolving a [`Principal`].
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// No [`User`] has the identity.
    #[display("`User({_0})` does not exist")]
    #[from(ignore)]
    IdentityNotFound(#[error(not(source))] String),
}

impl ExecutionError {
    /// Checks whether this [`ExecutionError`] means an absent identity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IdentityNotFound(_))
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{Insert, Update};
    use secrecy::SecretString;

    use crate::{
        domain::{
            principal::spec::user,
            user::{Role, Status},
        },
        infra::{Database as _, Memory},
        token::{Codec, KeyPolicy},
        Config, Query as _, Service,
    };

    use super::{
        ById, ByIdentity, ExecutionError, IsAccountValid, PermissionsOf,
    };

    fn service() -> Service<Memory> {
        let tokens = Codec::new(
            &SecretString::from("short".to_owned()),
            std::time::Duration::from_secs(60),
            KeyPolicy::Pad,
        )
        .unwrap();
        Service::new(Config { tokens }, Memory::default())
    }

    #[tokio::test]
    async fn resolves_by_identity_and_id() {
        let svc = service();
        let id = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();

        let by_name = svc.execute(ByIdentity("lee".into())).await.unwrap();
        let by_id = svc.execute(ById(id)).await.unwrap();

        assert_eq!(by_name.id, id);
        assert_eq!(by_id.username, by_name.username);
        assert!(by_name.has_role(Role::Sales));
    }

    #[tokio::test]
    async fn absent_identity_is_not_found() {
        let svc = service();

        for identity in ["ghost", "", "has space"] {
            let err = svc
                .execute(ByIdentity(identity.into()))
                .await
                .unwrap_err();
            assert!(matches!(
                err.as_ref(),
                ExecutionError::IdentityNotFound(_),
            ));
        }
        assert!(!svc.execute(IsAccountValid("ghost".into())).await.unwrap());
        assert!(svc
            .execute(PermissionsOf("ghost".into()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn observes_changes_without_caching() {
        let svc = service();
        let id = svc
            .database()
            .execute(Insert(user(0, "lee", Some(Role::Sales), Status::Active)))
            .await
            .unwrap();
        assert!(svc.execute(IsAccountValid("lee".into())).await.unwrap());

        let mut u = user(0, "lee", Some(Role::Manager), Status::Inactive);
        u.id = id;
        svc.database().execute(Update(u)).await.unwrap();

        let p = svc.execute(ById(id)).await.unwrap();
        assert!(p.has_role(Role::Manager));
        assert!(!p.enabled);
        assert!(!svc.execute(IsAccountValid("lee".into())).await.unwrap());
        assert!(svc
            .execute(PermissionsOf("lee".into()))
            .await
            .unwrap()
            .contains(&"export:read".to_owned()));
    }
}
