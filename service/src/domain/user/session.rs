//! Session token definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::User;

/// Signed session token.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `token` must be a token signed by this service.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(token: String) -> Self {
        Self(token)
    }
}

/// Kind of a [`Token`].
///
/// Access and refresh tokens are never interchangeable.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Short-lived [`Token`] authorizing API calls.
    ///
    /// Tokens without an explicit kind are treated as access tokens.
    #[default]
    #[display("access")]
    Access,

    /// Long-lived [`Token`] used only to mint new access tokens.
    #[display("refresh")]
    Refresh,
}

/// Claims carried by a [`Token`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Claims {
    /// Username of the [`User`] this [`Token`] was issued to.
    pub sub: String,

    /// [`Kind`] of the [`Token`].
    #[serde(rename = "type", default)]
    pub kind: Kind,

    /// Role marker authorities (e.g. `ROLE_SALES`).
    ///
    /// Always empty for [`Kind::Refresh`] tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Unique ID of the [`Token`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// [`DateTime`] when the [`Token`] was issued.
    #[serde(rename = "iat", with = "common::datetime::serde::unix_timestamp")]
    pub issued_at: IssuanceDateTime,

    /// [`DateTime`] when the [`Token`] expires.
    #[serde(rename = "exp", with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,
}

/// [`DateTime`] of a [`Token`] issuance.
pub type IssuanceDateTime = DateTimeOf<(Token, unit::Issuance)>;

/// [`DateTime`] of a [`Token`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Token, unit::Expiration)>;
