//! [`Principal`] definitions.

use std::collections::BTreeSet;

use derive_more::{Display, Error};

use crate::domain::{
    user::{self, Role, Status},
    Permission, User,
};

/// Resolved authorization identity of a [`User`].
///
/// Built fresh out of a [`User`] record on every resolution and never
/// persisted.
#[derive(Clone, Debug)]
pub struct Principal {
    /// ID of the [`User`].
    pub id: user::Id,

    /// [`user::Username`] of the [`User`].
    pub username: user::Username,

    /// [`user::RealName`] of the [`User`].
    pub real_name: user::RealName,

    /// [`Role`] of the [`User`], if recognized.
    pub role: Option<Role>,

    /// [`user::Department`] of the [`User`].
    pub department: Option<user::Department>,

    /// [`Status`] of the [`User`].
    pub status: Status,

    /// Indicator whether the account is enabled.
    pub enabled: bool,

    /// Indicator whether the account is not locked.
    pub non_locked: bool,

    /// Indicator whether the account is not expired.
    pub non_expired: bool,

    /// Indicator whether the account credentials are not expired.
    pub credentials_non_expired: bool,

    /// Granted [`Permission`]s together with the [`Role`] marker.
    authorities: BTreeSet<String>,
}

impl Principal {
    /// Returns all the authorities of this [`Principal`]: its
    /// [`Permission`]s and its [`Role`] marker (e.g. `ROLE_SALES`).
    pub fn authorities(&self) -> impl Iterator<Item = &str> {
        self.authorities.iter().map(String::as_str)
    }

    /// Returns the [`Permission`]s of this [`Principal`], without the [`Role`]
    /// marker.
    pub fn permissions(&self) -> impl Iterator<Item = &str> {
        self.authorities()
            .filter(|a| !a.starts_with(Role::MARKER_PREFIX))
    }

    /// Checks whether this [`Principal`] holds the given `authority`.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// Checks whether this [`Principal`] holds the marker of the given
    /// [`Role`].
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.has_authority(&role.marker())
    }

    /// Checks whether this [`Principal`] is granted the given [`Permission`].
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        !permission.starts_with(Role::MARKER_PREFIX)
            && self.has_authority(permission)
    }

    /// Checks whether the account state of this [`Principal`] allows access.
    ///
    /// # Errors
    ///
    /// With the first failed account-state flag.
    pub fn check_access(&self) -> Result<(), BlockedError> {
        use BlockedError as E;

        if !self.enabled {
            return Err(E::Disabled);
        }
        if !self.non_locked {
            return Err(E::Locked);
        }
        if !self.non_expired {
            return Err(E::Expired);
        }
        if !self.credentials_non_expired {
            return Err(E::CredentialsExpired);
        }
        Ok(())
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        let mut authorities = Permission::of(user.role)
            .iter()
            .map(ToString::to_string)
            .collect::<BTreeSet<_>>();
        if let Some(role) = user.role {
            _ = authorities.insert(role.marker());
        }

        Self {
            id: user.id,
            username: user.username.clone(),
            real_name: user.real_name.clone(),
            role: user.role,
            department: user.department.clone(),
            status: user.status,
            enabled: user.status == Status::Active,
            non_locked: user.status != Status::Inactive,
            non_expired: true,
            credentials_non_expired: true,
            authorities,
        }
    }
}

/// Account state blocking a [`Principal`] from access.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum BlockedError {
    /// Account is disabled.
    #[display("Account is disabled")]
    Disabled,

    /// Account is locked.
    #[display("Account is locked")]
    Locked,

    /// Account is expired.
    #[display("Account is expired")]
    Expired,

    /// Account credentials are expired.
    #[display("Account credentials are expired")]
    CredentialsExpired,
}

#[cfg(test)]
pub(crate) mod spec {
    use common::DateTime;

    use crate::domain::user::{
        self, PasswordHash, RealName, Role, Status, User, Username,
    };

    use super::{BlockedError, Principal};

    /// Builds a [`User`] without hashing any password.
    pub(crate) fn user(
        id: i64,
        username: &str,
        role: Option<Role>,
        status: Status,
    ) -> User {
        #[expect(unsafe_code, reason = "test fixture")]
        let username = unsafe { Username::new_unchecked(username) };
        User {
            id: id.into(),
            username,
            password_hash: PasswordHash::new(
                &user::Password::new("123456").unwrap(),
            )
            .unwrap(),
            real_name: RealName::new("Test User").unwrap(),
            email: None,
            phone: None,
            role,
            status,
            department: user::Department::new("Sales Dept"),
            avatar_url: None,
            last_login_at: None,
            created_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn active_principal_carries_permissions_and_marker() {
        let p =
            Principal::from(&user(1, "lee", Some(Role::Sales), Status::Active));

        assert!(p.has_role(Role::Sales));
        assert!(!p.has_role(Role::Admin));
        assert!(p.has_authority("ROLE_SALES"));
        assert!(p.has_permission("visit:write"));
        assert!(!p.has_permission("user:write"));
        assert!(!p.has_permission("ROLE_SALES"));
        assert!(p.permissions().all(|a| !a.starts_with("ROLE_")));
        assert_eq!(p.authorities().count(), p.permissions().count() + 1);
        assert_eq!(p.check_access(), Ok(()));
    }

    #[test]
    fn inactive_is_both_disabled_and_locked() {
        let p = Principal::from(&user(
            2,
            "gone",
            Some(Role::Manager),
            Status::Inactive,
        ));

        assert!(!p.enabled);
        assert!(!p.non_locked);
        assert!(p.non_expired);
        assert!(p.credentials_non_expired);
        assert_eq!(p.check_access(), Err(BlockedError::Disabled));
    }

    #[test]
    fn missing_role_resolves_without_authorities() {
        let p = Principal::from(&user(3, "nobody", None, Status::Active));

        assert_eq!(p.authorities().count(), 0);
        assert_eq!(p.check_access(), Ok(()));
    }
}
