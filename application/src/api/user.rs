//! [`User`]-related definitions.

use serde::Serialize;
use service::domain::{self, Principal};

/// Public view of a [`domain::User`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// ID of this [`User`].
    pub id: domain::user::Id,

    /// Username of this [`User`].
    pub username: String,

    /// Real name of this [`User`].
    pub real_name: String,

    /// Email of this [`User`].
    pub email: Option<String>,

    /// Phone of this [`User`].
    pub phone: Option<String>,

    /// Role of this [`User`], if recognized.
    pub role: Option<String>,

    /// Human-readable description of the [`User::role`].
    pub role_description: Option<&'static str>,

    /// Account status of this [`User`].
    pub status: String,

    /// Human-readable description of the [`User::status`].
    pub status_description: &'static str,

    /// Department of this [`User`].
    pub department: Option<String>,

    /// Avatar URL of this [`User`].
    pub avatar_url: Option<String>,

    /// RFC 3339 moment of the last login of this [`User`].
    pub last_login_time: Option<String>,

    /// RFC 3339 moment of this [`User`] creation.
    pub create_time: String,
}

impl From<&domain::User> for User {
    fn from(user: &domain::User) -> Self {
        Self {
            id: user.id,
            username: user.username.to_string(),
            real_name: user.real_name.to_string(),
            email: user.email.as_ref().map(ToString::to_string),
            phone: user.phone.as_ref().map(ToString::to_string),
            role: user.role.map(|r| r.to_string()),
            role_description: user.role.map(domain::user::Role::description),
            status: user.status.to_string(),
            status_description: user.status.description(),
            department: user.department.as_ref().map(ToString::to_string),
            avatar_url: user.avatar_url.clone(),
            last_login_time: user
                .last_login_at
                .as_ref()
                .map(|t| t.to_rfc3339()),
            create_time: user.created_at.to_rfc3339(),
        }
    }
}

/// [`User`] together with everything its [`Principal`] is granted.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    /// Public view of the [`User`].
    #[serde(flatten)]
    pub user: User,

    /// Permissions of the [`Principal`], without the role marker.
    pub permissions: Vec<String>,

    /// Every authority of the [`Principal`].
    pub authorities: Vec<String>,
}

impl Info {
    /// Combines the [`domain::User`] with its freshly resolved [`Principal`].
    #[must_use]
    pub fn new(user: &domain::User, principal: &Principal) -> Self {
        Self {
            user: user.into(),
            permissions: principal.permissions().map(Into::into).collect(),
            authorities: principal.authorities().map(Into::into).collect(),
        }
    }
}

pub mod session {
    //! Session-related definitions.

    use serde::Serialize;
    use service::{command, domain};

    /// Result of a successful login.
    #[derive(Clone, Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LoginResult {
        /// Access token.
        pub token: String,

        /// Refresh token.
        pub refresh_token: String,

        /// Scheme of the [`LoginResult::token`].
        pub token_type: &'static str,

        /// ID of the logged in user.
        pub user_id: domain::user::Id,

        /// Username of the logged in user.
        pub username: String,

        /// Real name of the logged in user.
        pub real_name: String,

        /// Role of the logged in user.
        pub role: Option<String>,

        /// Human-readable description of the [`LoginResult::role`].
        pub role_description: Option<&'static str>,

        /// Department of the logged in user.
        pub department: Option<String>,

        /// Avatar URL of the logged in user.
        pub avatar_url: Option<String>,

        /// RFC 3339 moment of the login.
        pub login_time: String,

        /// RFC 3339 moment of the access token expiration.
        pub expire_time: String,
    }

    impl From<command::create_user_session::Output> for LoginResult {
        fn from(output: command::create_user_session::Output) -> Self {
            let command::create_user_session::Output {
                access_token,
                refresh_token,
                user,
                expires_at,
            } = output;

            Self {
                token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                token_type: "Bearer",
                user_id: user.id,
                username: user.username.to_string(),
                real_name: user.real_name.to_string(),
                role: user.role.map(|r| r.to_string()),
                role_description: user
                    .role
                    .map(domain::user::Role::description),
                department: user.department.map(|d| d.to_string()),
                avatar_url: user.avatar_url,
                login_time: user
                    .last_login_at
                    .map_or_else(common::DateTime::now, |t| t.coerce())
                    .to_rfc3339(),
                expire_time: expires_at.to_rfc3339(),
            }
        }
    }

    /// Result of a successful token refresh.
    #[derive(Clone, Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RefreshResult {
        /// New access token.
        pub token: String,

        /// Scheme of the [`RefreshResult::token`].
        pub token_type: &'static str,

        /// Username the token is issued to.
        pub username: String,

        /// RFC 3339 moment of the access token expiration.
        pub expire_time: String,
    }

    impl From<command::refresh_user_session::Output> for RefreshResult {
        fn from(output: command::refresh_user_session::Output) -> Self {
            let command::refresh_user_session::Output {
                token,
                user,
                expires_at,
            } = output;

            Self {
                token: token.to_string(),
                token_type: "Bearer",
                username: user.username.to_string(),
                expire_time: expires_at.to_rfc3339(),
            }
        }
    }

    /// Validity of the presented access token.
    #[derive(Clone, Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Verification {
        /// Always `true`, as invalid tokens never reach the handler.
        pub valid: bool,

        /// Username of the bound principal.
        pub username: String,

        /// RFC 3339 moment of the access token expiration.
        pub expires_at: String,

        /// Remaining validity of the access token in milliseconds.
        pub remaining_millis: u64,
    }
}
