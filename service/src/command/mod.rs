//! [`Command`] definition.

pub mod authorize_user_session;
pub mod create_user;
pub mod create_user_session;
pub mod refresh_user_session;
pub mod update_user_password;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession, create_user::CreateUser,
    create_user_session::CreateUserSession,
    refresh_user_session::RefreshUserSession,
    update_user_password::UpdateUserPassword,
};
