//! Domain definitions.

pub mod permission;
pub mod principal;
pub mod user;

pub use self::{permission::Permission, principal::Principal, user::User};
