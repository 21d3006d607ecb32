//! [`User`] definitions.

pub mod session;

use std::sync::LazyLock;

use argon2::{Argon2, PasswordHasher as _, PasswordVerifier as _};
#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret};
use serde::{Deserialize, Serialize};

/// Account of the user directory.
#[derive(Clone, Debug)]
pub struct User {
    /// ID of this [`User`].
    pub id: Id,

    /// [`Username`] of this [`User`].
    pub username: Username,

    /// [`PasswordHash`] of this [`User`].
    pub password_hash: PasswordHash,

    /// [`RealName`] of this [`User`].
    pub real_name: RealName,

    /// [`Email`] of this [`User`].
    pub email: Option<Email>,

    /// [`Phone`] of this [`User`].
    pub phone: Option<Phone>,

    /// [`Role`] of this [`User`].
    ///
    /// [`None`] if the stored role is missing or not recognized.
    pub role: Option<Role>,

    /// [`Status`] of this [`User`].
    pub status: Status,

    /// [`Department`] this [`User`] belongs to.
    pub department: Option<Department>,

    /// URL of this [`User`]'s avatar.
    pub avatar_url: Option<String>,

    /// [`DateTime`] of this [`User`]'s last successful login.
    pub last_login_at: Option<LastLoginDateTime>,

    /// [`DateTime`] when this [`User`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`User`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(i64);

/// Unique login name of a [`User`].
///
/// Serves as the subject of issued session tokens.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Username(String);

impl Username {
    /// Creates a new [`Username`] without checking its format.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `username` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    /// Creates a new [`Username`] if the given `username` is valid.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Option<Self> {
        let username = username.into();
        Self::check(&username).then_some(Self(username))
    }

    /// Checks whether the given `username` is a valid [`Username`]:
    /// - 1 to 50 characters long;
    /// - no whitespace or control characters.
    fn check(username: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Username`] invariants.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^\s\p{Cc}]{1,50}$").expect("valid regex")
        });

        REGEX.is_match(username.as_ref())
    }
}

impl FromStr for Username {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Username`")
    }
}

/// Display name of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct RealName(String);

impl RealName {
    /// Creates a new [`RealName`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`RealName`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.chars().count() <= 100
    }
}

impl FromStr for RealName {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `RealName`")
    }
}

/// Department a [`User`] belongs to.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Department(String);

impl Department {
    /// Creates a new [`Department`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        (!name.trim().is_empty() && name.chars().count() <= 100)
            .then_some(Self(name))
    }
}

impl FromStr for Department {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Department`")
    }
}

/// Plain password of a [`User`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Password(String);

impl Password {
    /// Creates a new [`Password`] if the given `password` is valid.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Option<Self> {
        let password = password.into();
        Self::check(&password).then_some(Self(password))
    }

    /// Checks whether the given `password` is 6 to 20 characters long.
    fn check(password: impl AsRef<str>) -> bool {
        (6..=20).contains(&password.as_ref().chars().count())
    }
}

impl FromStr for Password {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Password`")
    }
}

impl CloneableSecret for Password {}
impl Zeroize for Password {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// [Argon2] hash of a [`Password`] in the [PHC string format].
///
/// [Argon2]: https://en.wikipedia.org/wiki/Argon2
/// [PHC string format]: https://github.com/P-H-C/phc-string-format
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes the given [`Password`] with a random salt.
    ///
    /// # Errors
    ///
    /// If the OS random source or the hasher fails.
    pub fn new(password: &Password) -> Result<Self, HashError> {
        let mut salt = [0u8; 16];
        getrandom::getrandom(&mut salt).map_err(HashError::Random)?;
        let salt = password_hash::SaltString::encode_b64(&salt)
            .map_err(HashError::Hash)?;
        Argon2::default()
            .hash_password(password.0.as_bytes(), &salt)
            .map(|h| Self(h.to_string()))
            .map_err(HashError::Hash)
    }

    /// Checks whether the given `password` matches this [`PasswordHash`].
    ///
    /// A malformed stored hash never matches.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        password_hash::PasswordHash::new(&self.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

/// Error of hashing a [`Password`].
#[derive(Clone, Debug, Display, Error)]
pub enum HashError {
    /// OS random source failed to produce a salt.
    #[display("Failed to generate salt: {_0}")]
    Random(#[error(not(source))] getrandom::Error),

    /// [`Argon2`] failed to produce a hash.
    #[display("Failed to hash password: {_0}")]
    Hash(#[error(not(source))] password_hash::Error),
}

/// Email address of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` looks like an email address.
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Email`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
        });

        let address = address.as_ref();
        address.len() <= 100 && REGEX.is_match(address)
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

/// Phone number of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Phone(String);

impl Phone {
    /// Creates a new [`Phone`] if the given `number` is valid.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        Self::check(&number).then_some(Self(number))
    }

    /// Checks whether the given `number` is a valid [`Phone`].
    fn check(number: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Phone`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^\+?[\d\s-]{5,20}$").expect("valid regex")
        });

        REGEX.is_match(number.as_ref())
    }
}

impl FromStr for Phone {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Phone`")
    }
}

define_kind! {
    #[doc = "Coarse access class of a [`User`]."]
    enum Role {
        #[doc = "Administrator with access to every resource."]
        Admin = 1,

        #[doc = "Manager of customers and visits."]
        Manager = 2,

        #[doc = "Salesperson working with own customers and visits."]
        Sales = 3,
    }
}

impl Role {
    /// Prefix of a [`Role`] marker authority.
    pub const MARKER_PREFIX: &'static str = "ROLE_";

    /// Returns a human-readable description of this [`Role`].
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::Manager => "Manager",
            Self::Sales => "Sales",
        }
    }

    /// Returns the marker authority of this [`Role`] (e.g. `ROLE_ADMIN`).
    #[must_use]
    pub fn marker(self) -> String {
        format!("{}{self}", Self::MARKER_PREFIX)
    }

    /// Parses a [`Role`] out of its marker authority.
    ///
    /// The `ROLE_` prefix is optional.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        marker
            .strip_prefix(Self::MARKER_PREFIX)
            .unwrap_or(marker)
            .parse()
            .ok()
    }
}

define_kind! {
    #[doc = "Account status of a [`User`]."]
    enum Status {
        #[doc = "Account may log in and use the API."]
        Active = 1,

        #[doc = "Account is blocked."]
        Inactive = 2,
    }
}

impl Status {
    /// Returns a human-readable description of this [`Status`].
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Disabled",
        }
    }
}

/// [`DateTime`] when a [`User`] was created.
pub type CreationDateTime = DateTimeOf<(User, unit::Creation)>;

/// [`DateTime`] of a [`User`]'s last successful login.
pub type LastLoginDateTime = DateTimeOf<(User, unit::LastLogin)>;
