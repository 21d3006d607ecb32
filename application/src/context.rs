//! [`Context`]-related definitions.

use axum::{async_trait, extract::FromRequestParts};
use service::domain::{
    user::{self, Role},
    Principal,
};

use crate::{
    gate::{Authentication, Session},
    Error, Service,
};

/// Request context answering authorization questions about the
/// [`Principal`] bound to the current request.
///
/// Every check is total: an anonymous request simply answers `false` or
/// [`None`].
#[derive(Clone, Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// [`Session`] bound to the current request, if any.
    session: Option<Session>,
}

impl Context {
    /// Creates a new [`Context`] for the provided [`Authentication`].
    #[must_use]
    pub fn new(service: Service, auth: Option<&Authentication>) -> Self {
        Self {
            service,
            session: auth.and_then(Authentication::session).cloned(),
        }
    }

    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the bound [`Session`], if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the bound [`Principal`], if any.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(|s| &*s.principal)
    }

    /// Checks whether the current request is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Checks whether the current request is anonymous.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        !self.is_authenticated()
    }

    /// Returns the [`user::Username`] of the bound [`Principal`].
    #[must_use]
    pub fn current_identity(&self) -> Option<&user::Username> {
        self.principal().map(|p| &p.username)
    }

    /// Returns the [`user::Id`] of the bound [`Principal`].
    #[must_use]
    pub fn current_user_id(&self) -> Option<user::Id> {
        self.principal().map(|p| p.id)
    }

    /// Returns the [`Role`] of the bound [`Principal`].
    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        self.principal().and_then(|p| p.role)
    }

    /// Returns the [`user::Department`] of the bound [`Principal`].
    #[must_use]
    pub fn current_department(&self) -> Option<&user::Department> {
        self.principal().and_then(|p| p.department.as_ref())
    }

    /// Returns all the authorities of the bound [`Principal`], empty if
    /// anonymous.
    pub fn current_authorities(&self) -> impl Iterator<Item = &str> {
        self.principal().into_iter().flat_map(Principal::authorities)
    }

    /// Checks whether the bound [`Principal`] has the given [`Role`].
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.principal().is_some_and(|p| p.has_role(role))
    }

    /// Checks whether the bound [`Principal`] has any of the given [`Role`]s.
    ///
    /// `false` for no [`Role`]s at all.
    #[must_use]
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }

    /// Checks whether the bound [`Principal`] has all of the given [`Role`]s.
    ///
    /// `true` for no [`Role`]s at all, as long as the request is
    /// authenticated.
    #[must_use]
    pub fn has_all_roles(&self, roles: &[Role]) -> bool {
        self.is_authenticated() && roles.iter().all(|r| self.has_role(*r))
    }

    /// Checks whether the bound [`Principal`] is granted the given
    /// `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.principal().is_some_and(|p| p.has_permission(permission))
    }

    /// Checks whether the bound [`Principal`] is granted any of the given
    /// `permissions`.
    #[must_use]
    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has_permission(p))
    }

    /// Checks whether the bound [`Principal`] is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Checks whether the bound [`Principal`] is a manager.
    #[must_use]
    pub fn is_manager(&self) -> bool {
        self.has_role(Role::Manager)
    }

    /// Checks whether the bound [`Principal`] is a salesperson.
    #[must_use]
    pub fn is_sales(&self) -> bool {
        self.has_role(Role::Sales)
    }

    /// Checks whether the bound [`Principal`] is an administrator or a
    /// manager.
    #[must_use]
    pub fn is_admin_or_manager(&self) -> bool {
        self.has_any_role(&[Role::Admin, Role::Manager])
    }

    /// Checks whether the bound [`Principal`] may access resources owned by
    /// the [`User`] with the given `owner` ID.
    ///
    /// [`User`]: service::domain::User
    #[must_use]
    pub fn can_access_user_resource(&self, owner: user::Id) -> bool {
        self.is_admin() || self.current_user_id() == Some(owner)
    }

    /// Checks whether the bound [`Principal`] may manage the given
    /// `department`.
    ///
    /// Managers may manage their own department only.
    #[must_use]
    pub fn can_manage_department(&self, department: &str) -> bool {
        if self.is_admin() {
            return true;
        }
        self.is_manager()
            && !department.is_empty()
            && self
                .current_department()
                .is_some_and(|d| d.as_ref() == department)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;

        Ok(Self::new(service, parts.extensions.get::<Authentication>()))
    }
}

#[cfg(test)]
pub(crate) mod spec {
    use std::{sync::Arc, time::Duration};

    use common::DateTime;
    use secrecy::SecretString;
    use service::{
        domain::{
            user::{
                self, Department, Password, PasswordHash, RealName, Role,
                Status, Username,
            },
            Principal, User,
        },
        infra::{Directory, Memory},
        token,
    };

    use crate::{
        gate::{Anonymity, Authentication, Session},
        Service,
    };

    use super::Context;

    /// Creates a [`Service`] over an empty in-memory directory.
    pub(crate) fn service() -> Service {
        let tokens = token::Codec::new(
            &SecretString::from("context-spec-secret".to_owned()),
            Duration::from_secs(3600),
            token::KeyPolicy::Pad,
        )
        .unwrap();
        Service::new(
            service::Config { tokens },
            Directory::Memory(Memory::default()),
        )
    }

    fn principal(id: i64, role: Option<Role>, department: &str) -> Principal {
        #[expect(unsafe_code, reason = "test fixture")]
        let username = unsafe { Username::new_unchecked(format!("u{id}")) };
        Principal::from(&User {
            id: id.into(),
            username,
            password_hash: PasswordHash::new(
                &Password::new("123456").unwrap(),
            )
            .unwrap(),
            real_name: RealName::new("Test User").unwrap(),
            email: None,
            phone: None,
            role,
            status: Status::Active,
            department: Department::new(department),
            avatar_url: None,
            last_login_at: None,
            created_at: DateTime::now().coerce(),
        })
    }

    fn context(principal: Option<Principal>) -> Context {
        let auth = match principal {
            Some(p) => Authentication::Authenticated(Session {
                principal: Arc::new(p),
                expires_at: DateTime::now().coerce(),
                remaining: Duration::from_secs(60),
            }),
            None => Authentication::Anonymous(Anonymity::NoToken),
        };
        Context::new(service(), Some(&auth))
    }

    #[test]
    fn anonymous_answers_nothing() {
        let ctx = context(None);

        assert!(ctx.is_anonymous());
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.current_identity(), None);
        assert_eq!(ctx.current_user_id(), None);
        assert_eq!(ctx.current_role(), None);
        assert_eq!(ctx.current_authorities().count(), 0);
        assert!(!ctx.has_role(Role::Sales));
        assert!(!ctx.has_all_roles(&[]));
        assert!(!ctx.has_permission("visit:read"));
        assert!(!ctx.is_admin_or_manager());
        assert!(!ctx.can_access_user_resource(user::Id::from(1)));
        assert!(!ctx.can_manage_department("Sales Dept"));
    }

    #[test]
    fn admin_accesses_any_user_resource() {
        let ctx = context(Some(principal(1, Some(Role::Admin), "System")));

        assert!(ctx.is_admin());
        assert!(ctx.is_admin_or_manager());
        assert!(ctx.can_access_user_resource(user::Id::from(1)));
        assert!(ctx.can_access_user_resource(user::Id::from(42)));
        assert!(ctx.can_manage_department("Anything"));
    }

    #[test]
    fn sales_accesses_own_resources_only() {
        let ctx = context(Some(principal(7, Some(Role::Sales), "Sales Dept")));

        assert!(ctx.is_sales());
        assert_eq!(ctx.current_role(), Some(Role::Sales));
        assert_eq!(ctx.current_user_id(), Some(user::Id::from(7)));
        assert_eq!(ctx.current_identity().map(AsRef::as_ref), Some("u7"));
        assert!(ctx.can_access_user_resource(user::Id::from(7)));
        assert!(!ctx.can_access_user_resource(user::Id::from(8)));
        assert!(!ctx.can_manage_department("Sales Dept"));
        assert!(ctx.has_permission("visit:write"));
        assert!(!ctx.has_permission("user:write"));
        assert!(ctx.has_any_permission(&["user:write", "customer:read"]));
        assert!(ctx.current_authorities().any(|a| a == "ROLE_SALES"));
    }

    #[test]
    fn manager_manages_own_department() {
        let ctx =
            context(Some(principal(3, Some(Role::Manager), "North Branch")));

        assert!(ctx.can_manage_department("North Branch"));
        assert!(!ctx.can_manage_department("South Branch"));
        assert!(!ctx.can_manage_department(""));
        assert_eq!(
            ctx.current_department().map(AsRef::as_ref),
            Some("North Branch"),
        );
    }

    #[test]
    fn role_sets() {
        let ctx = context(Some(principal(2, Some(Role::Manager), "HQ")));

        assert!(ctx.has_any_role(&[Role::Admin, Role::Manager]));
        assert!(!ctx.has_any_role(&[]));
        assert!(ctx.has_all_roles(&[]));
        assert!(ctx.has_all_roles(&[Role::Manager]));
        assert!(!ctx.has_all_roles(&[Role::Manager, Role::Admin]));
    }

    #[test]
    fn roleless_principal_is_authenticated_without_rights() {
        let ctx = context(Some(principal(5, None, "HQ")));

        assert!(ctx.is_authenticated());
        assert_eq!(ctx.current_role(), None);
        assert!(!ctx.has_any_role(Role::ALL));
        assert!(ctx.can_access_user_resource(user::Id::from(5)));
    }
}
