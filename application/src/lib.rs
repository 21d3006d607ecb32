//! Application provides HTTP API for interacting with the [`Service`].

#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod api;
pub mod args;
pub mod bootstrap;
pub mod config;
mod context;
pub mod error;
pub mod gate;
pub mod policy;

use axum::{middleware, Extension, Router};
// Used in binary.
use axum_client_ip as _;
use refinery as _;
use tower_http as _;
use tracing_subscriber as _;
#[cfg(test)]
use tower as _;

pub use self::{
    args::Args,
    config::Config,
    context::Context,
    error::{AsError, Error},
    gate::Gate,
    policy::Policy,
};

/// [`Service`] with filled infrastructure dependencies.
///
/// [`Service`]: service::Service
pub type Service = service::Service<service::infra::Directory>;

/// Protects the provided `routes` with the request [`Gate`] and the route
/// [`Policy`].
///
/// Every request is authenticated first, then authorized, and only then
/// routed.
#[must_use]
pub fn secure(routes: Router, gate: Gate, policy: Policy) -> Router {
    let service = gate.service().clone();
    routes
        .layer(middleware::from_fn_with_state(policy, policy::authorize))
        .layer(middleware::from_fn_with_state(gate, gate::authenticate))
        .layer(Extension(service))
}

/// Builds the whole protected HTTP API.
#[must_use]
pub fn router(gate: Gate, policy: Policy) -> Router {
    secure(api::router(), gate, policy)
}
