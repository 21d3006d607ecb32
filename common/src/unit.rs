//! Marker types distinguishing [`DateTimeOf`] kinds.
//!
//! [`DateTimeOf`]: crate::DateTimeOf

/// Marker of an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker of a credential issuance.
#[derive(Clone, Copy, Debug)]
pub struct Issuance;

/// Marker of a credential expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker of the last successful login.
#[derive(Clone, Copy, Debug)]
pub struct LastLogin;
