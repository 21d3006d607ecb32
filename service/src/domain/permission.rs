//! [`Permission`] catalog.

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};

use crate::domain::user::Role;

/// Fine-grained capability of the form `resource:action`.
#[derive(
    Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Reading users.
    pub const USER_READ: Self = Self::from_static("user:read");
    /// Creating and updating users.
    pub const USER_WRITE: Self = Self::from_static("user:write");
    /// Deleting users.
    pub const USER_DELETE: Self = Self::from_static("user:delete");

    /// Reading schools.
    pub const SCHOOL_READ: Self = Self::from_static("school:read");
    /// Creating and updating schools.
    pub const SCHOOL_WRITE: Self = Self::from_static("school:write");
    /// Deleting schools.
    pub const SCHOOL_DELETE: Self = Self::from_static("school:delete");

    /// Reading departments.
    pub const DEPARTMENT_READ: Self = Self::from_static("department:read");
    /// Creating and updating departments.
    pub const DEPARTMENT_WRITE: Self = Self::from_static("department:write");
    /// Deleting departments.
    pub const DEPARTMENT_DELETE: Self =
        Self::from_static("department:delete");

    /// Reading customers.
    pub const CUSTOMER_READ: Self = Self::from_static("customer:read");
    /// Creating and updating customers.
    pub const CUSTOMER_WRITE: Self = Self::from_static("customer:write");
    /// Deleting customers.
    pub const CUSTOMER_DELETE: Self = Self::from_static("customer:delete");

    /// Reading visit records.
    pub const VISIT_READ: Self = Self::from_static("visit:read");
    /// Creating and updating visit records.
    pub const VISIT_WRITE: Self = Self::from_static("visit:write");
    /// Deleting visit records.
    pub const VISIT_DELETE: Self = Self::from_static("visit:delete");

    /// Reading dashboard statistics.
    pub const DASHBOARD_READ: Self = Self::from_static("dashboard:read");

    /// Exporting data.
    pub const EXPORT_READ: Self = Self::from_static("export:read");

    /// Changing system configuration.
    pub const SYSTEM_CONFIG: Self = Self::from_static("system:config");

    /// Creates a new [`Permission`] out of a static string.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a new [`Permission`] out of any string.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the string form of this [`Permission`].
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the [`Permission`]s granted to the given [`Role`].
    ///
    /// A missing [`Role`] is granted nothing.
    #[must_use]
    pub fn of(role: Option<Role>) -> &'static [Self] {
        let Some(role) = role else {
            tracing::warn!("no `Role` assigned, granting no permissions");
            return &[];
        };
        CATALOG
            .iter()
            .find_map(|(r, perms)| (*r == role).then_some(*perms))
            .unwrap_or_else(|| {
                tracing::warn!(%role, "`Role` missing from the catalog");
                &[]
            })
    }

    /// Returns the [`Permission`]s granted to the [`Role`] named `role`,
    /// either plainly (`SALES`) or as a marker (`ROLE_SALES`).
    ///
    /// An unknown name is granted nothing.
    #[must_use]
    pub fn of_role_name(role: &str) -> &'static [Self] {
        match Role::from_marker(role) {
            Some(r) => Self::of(Some(r)),
            None => {
                tracing::warn!(role, "unknown `Role`, granting no permissions");
                &[]
            }
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Static [`Role`] to [`Permission`]s table.
static CATALOG: [(Role, &[Permission]); 3] = [
    (
        Role::Admin,
        &[
            Permission::USER_READ,
            Permission::USER_WRITE,
            Permission::USER_DELETE,
            Permission::SCHOOL_READ,
            Permission::SCHOOL_WRITE,
            Permission::SCHOOL_DELETE,
            Permission::DEPARTMENT_READ,
            Permission::DEPARTMENT_WRITE,
            Permission::DEPARTMENT_DELETE,
            Permission::CUSTOMER_READ,
            Permission::CUSTOMER_WRITE,
            Permission::CUSTOMER_DELETE,
            Permission::VISIT_READ,
            Permission::VISIT_WRITE,
            Permission::VISIT_DELETE,
            Permission::DASHBOARD_READ,
            Permission::EXPORT_READ,
            Permission::SYSTEM_CONFIG,
        ],
    ),
    (
        Role::Manager,
        &[
            Permission::USER_READ,
            Permission::SCHOOL_READ,
            Permission::DEPARTMENT_READ,
            Permission::CUSTOMER_READ,
            Permission::CUSTOMER_WRITE,
            Permission::CUSTOMER_DELETE,
            Permission::VISIT_READ,
            Permission::VISIT_WRITE,
            Permission::VISIT_DELETE,
            Permission::DASHBOARD_READ,
            Permission::EXPORT_READ,
        ],
    ),
    (
        Role::Sales,
        &[
            Permission::SCHOOL_READ,
            Permission::DEPARTMENT_READ,
            Permission::CUSTOMER_READ,
            Permission::CUSTOMER_WRITE,
            Permission::VISIT_READ,
            Permission::VISIT_WRITE,
            Permission::VISIT_DELETE,
            Permission::DASHBOARD_READ,
        ],
    ),
];
