//! Route-level authorization.
//!
//! Every request is matched against a central [`RULES`] table of path
//! patterns and HTTP methods. The first matching [`Rule`] decides the
//! required [`Access`], and unmatched requests require authentication only.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse as _, Response},
    Json,
};
use common::DateTime;
use http::{Method, StatusCode};
use service::domain::{user::Role, Principal};
use tracing as log;

use crate::gate::{Anonymity, Authentication};

/// [`Access`] required for a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    /// Anyone, including anonymous requests.
    Public,

    /// Any authenticated [`Principal`].
    Authenticated,

    /// Authenticated [`Principal`] having any of the listed [`Role`]s.
    Roles(&'static [Role]),
}

/// Entry of the [`RULES`] table.
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Path pattern: either an exact path, or a `/base/**` matching the
    /// `/base` itself and everything below it.
    pub pattern: &'static str,

    /// HTTP methods this [`Rule`] applies to, or any if [`None`].
    pub methods: Option<&'static [Method]>,

    /// Required [`Access`].
    pub access: Access,
}

impl Rule {
    /// Checks whether this [`Rule`] applies to the request.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.methods.map_or(true, |m| m.contains(method))
            && matches_pattern(self.pattern, path)
    }
}

const ANY_ROLE: &[Role] = &[Role::Admin, Role::Manager, Role::Sales];
const ADMIN_OR_MANAGER: &[Role] = &[Role::Admin, Role::Manager];
const ADMIN: &[Role] = &[Role::Admin];

const GET: &[Method] = &[Method::GET];
const POST: &[Method] = &[Method::POST];
const WRITE: &[Method] = &[Method::POST, Method::PUT, Method::DELETE];
const NOT_DELETE: &[Method] = &[Method::GET, Method::POST, Method::PUT];
const DELETE: &[Method] = &[Method::DELETE];
const CRUD: &[Method] =
    &[Method::GET, Method::POST, Method::PUT, Method::DELETE];

/// Shortcut for declaring a [`Rule`].
const fn rule(
    pattern: &'static str,
    methods: Option<&'static [Method]>,
    access: Access,
) -> Rule {
    Rule {
        pattern,
        methods,
        access,
    }
}

/// Route authorization table, first match wins.
pub static RULES: &[Rule] = &[
    rule("/actuator/**", None, Access::Public),
    rule("/swagger-ui/**", None, Access::Public),
    rule("/v3/api-docs/**", None, Access::Public),
    rule("/favicon.ico", None, Access::Public),
    rule("/error", None, Access::Public),
    rule("/", None, Access::Public),
    rule("/auth/login", Some(POST), Access::Public),
    rule("/auth/register", Some(POST), Access::Public),
    rule("/auth/refresh", Some(POST), Access::Public),
    rule("/auth/verify", Some(GET), Access::Authenticated),
    rule("/auth/user-info", Some(GET), Access::Authenticated),
    rule("/auth/logout", Some(POST), Access::Authenticated),
    rule("/auth/change-password", Some(POST), Access::Authenticated),
    rule("/users/**", Some(GET), Access::Roles(ADMIN_OR_MANAGER)),
    rule("/users/**", Some(WRITE), Access::Roles(ADMIN)),
    rule("/schools/**", Some(GET), Access::Roles(ANY_ROLE)),
    rule("/schools/**", Some(WRITE), Access::Roles(ADMIN)),
    rule("/departments/**", Some(GET), Access::Roles(ANY_ROLE)),
    rule("/departments/**", Some(WRITE), Access::Roles(ADMIN)),
    rule("/customers/**", Some(NOT_DELETE), Access::Roles(ANY_ROLE)),
    rule("/customers/**", Some(DELETE), Access::Roles(ADMIN_OR_MANAGER)),
    rule("/visits/**", Some(CRUD), Access::Roles(ANY_ROLE)),
    rule("/dashboard/**", Some(GET), Access::Roles(ANY_ROLE)),
    rule("/files/upload", Some(POST), Access::Roles(ANY_ROLE)),
    rule("/files/download/**", Some(GET), Access::Roles(ANY_ROLE)),
    rule("/export/**", Some(GET), Access::Roles(ADMIN_OR_MANAGER)),
    rule("/admin/**", None, Access::Roles(ADMIN)),
    rule("/config/**", None, Access::Roles(ADMIN)),
];

/// Matches the `path` against the `pattern` of a [`Rule`].
fn matches_pattern(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix("/**") {
        Some(base) => path
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        None => pattern == path,
    }
}

/// Returns the [`Access`] required for the request.
#[must_use]
pub fn required(method: &Method, path: &str) -> Access {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    RULES
        .iter()
        .find(|r| r.matches(method, path))
        .map_or(Access::Authenticated, |r| r.access)
}

/// Reason of a request being denied.
#[derive(Clone, Copy, Debug)]
pub enum Denial<'a> {
    /// Request is anonymous, while the route requires authentication.
    Unauthenticated(Option<&'a Anonymity>),

    /// Authenticated [`Principal`] lacks the required [`Role`]s.
    Forbidden(&'a Principal),
}

/// Decides whether a request with the provided [`Authentication`] may
/// proceed.
///
/// # Errors
///
/// With the [`Denial`] reason if it may not.
pub fn check<'a>(
    method: &Method,
    path: &str,
    auth: Option<&'a Authentication>,
) -> Result<(), Denial<'a>> {
    let principal = auth
        .and_then(Authentication::session)
        .map(|s| &*s.principal);
    match (required(method, path), principal) {
        (Access::Public, _) => Ok(()),
        (Access::Authenticated | Access::Roles(_), None) => {
            let reason = match auth {
                Some(Authentication::Anonymous(a)) => Some(a),
                Some(Authentication::Authenticated(_)) | None => None,
            };
            Err(Denial::Unauthenticated(reason))
        }
        (Access::Authenticated, Some(_)) => Ok(()),
        (Access::Roles(roles), Some(p)) => {
            if roles.iter().any(|r| p.has_role(*r)) {
                Ok(())
            } else {
                Err(Denial::Forbidden(p))
            }
        }
    }
}

/// Route authorization state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Policy {
    /// Indicator whether denial bodies carry debug details.
    pub debug: bool,
}

impl Policy {
    /// Renders the response of the provided [`Denial`].
    #[must_use]
    pub fn deny(
        &self,
        method: &Method,
        path: &str,
        denial: Denial<'_>,
    ) -> Response {
        let now = DateTime::now().to_rfc3339();
        let (status, mut body) = match denial {
            Denial::Unauthenticated(reason) => {
                log::warn!(
                    %method,
                    path,
                    reason = reason.map_or("UNKNOWN", Anonymity::code),
                    "unauthenticated request rejected",
                );
                let body = serde_json::json!({
                    "code": StatusCode::UNAUTHORIZED.as_u16(),
                    "message": "Authentication failed, please log in",
                    "data": null,
                    "timestamp": now,
                    "path": path,
                    "detail": unauthenticated_detail(path, reason),
                });
                (StatusCode::UNAUTHORIZED, body)
            }
            Denial::Forbidden(p) => {
                log::warn!(
                    %method,
                    path,
                    username = %p.username,
                    reason = "ROLE_FORBIDDEN",
                    "forbidden request rejected",
                );
                let body = serde_json::json!({
                    "code": StatusCode::FORBIDDEN.as_u16(),
                    "message": "Access denied, insufficient permissions",
                    "data": null,
                    "timestamp": now,
                    "path": path,
                    "detail": forbidden_detail(method, path, p.role),
                    "suggestion": forbidden_suggestion(path, p.role),
                });
                (StatusCode::FORBIDDEN, body)
            }
        };

        if self.debug {
            body["debug"] = match denial {
                Denial::Unauthenticated(reason) => serde_json::json!({
                    "method": method.as_str(),
                    "reason": reason.map_or("UNKNOWN", Anonymity::code),
                    "authenticated": false,
                }),
                Denial::Forbidden(p) => serde_json::json!({
                    "method": method.as_str(),
                    "reason": "ROLE_FORBIDDEN",
                    "username": p.username.as_ref(),
                    "authenticated": true,
                    "authorities": p.authorities().collect::<Vec<_>>(),
                }),
            };
        }

        (status, Json(body)).into_response()
    }
}

/// Explains why an anonymous request to the `path` is rejected.
fn unauthenticated_detail(path: &str, reason: Option<&Anonymity>) -> String {
    if let Some(Anonymity::Rejected(e)) = reason {
        return match e.code {
            "TOKEN_EXPIRED" => {
                "Access token expired, please refresh it or log in again"
            }
            "TOKEN_MALFORMED" | "TOKEN_EMPTY" => {
                "Access token format is wrong, please log in again"
            }
            _ => "Access token is invalid, please log in again",
        }
        .to_owned();
    }
    if matches_pattern("/admin/**", path) {
        return "This resource requires administrator privileges, please log \
                in as an administrator"
            .to_owned();
    }
    if matches_pattern("/manager/**", path) {
        return "This resource requires administrator or manager \
                privileges, please log in first"
            .to_owned();
    }
    match reason {
        Some(Anonymity::NoToken) => {
            "Please provide a valid access token in the request header"
                .to_owned()
        }
        Some(Anonymity::BadPrefix(prefix)) => {
            format!("Access token must start with '{prefix}'")
        }
        Some(Anonymity::Skipped | Anonymity::Rejected(_)) | None => {
            "Authentication failed, please check your login status".to_owned()
        }
    }
}

/// Explains why a request of a [`Principal`] with the `role` is forbidden.
fn forbidden_detail(
    method: &Method,
    path: &str,
    role: Option<Role>,
) -> String {
    let detail = if matches_pattern("/admin/**", path)
        || matches_pattern("/users/**", path)
    {
        "This operation requires administrator privileges"
    } else if matches_pattern("/manager/**", path)
        || matches_pattern("/export/**", path)
    {
        "This operation requires administrator or manager privileges"
    } else if method == Method::DELETE {
        "Deleting requires higher privileges"
    } else if method == Method::PUT || method == Method::PATCH {
        "Modifying requires corresponding privileges"
    } else if method == Method::POST {
        "Creating requires corresponding privileges"
    } else {
        return format!(
            "Current role is {}, which cannot access this resource",
            role.map_or("UNKNOWN", Role::description),
        );
    };
    detail.to_owned()
}

/// Suggests how a [`Principal`] with the `role` may get access to the
/// `path`.
fn forbidden_suggestion(path: &str, role: Option<Role>) -> &'static str {
    if matches_pattern("/admin/**", path) || matches_pattern("/users/**", path)
    {
        "Please contact the system administrator for the required privileges"
    } else if matches_pattern("/export/**", path)
        || matches_pattern("/manager/**", path)
    {
        "Please contact an administrator or a manager for the required \
         privileges"
    } else if role == Some(Role::Sales) {
        "Please contact your manager or an administrator for the required \
         privileges"
    } else {
        "Please contact the system administrator"
    }
}

/// Middleware enforcing the [`RULES`] table.
///
/// Expects the [`Authentication`] to be already bound by the request gate.
pub async fn authorize(
    State(policy): State<Policy>,
    req: Request,
    next: Next,
) -> Response {
    let denied = check(
        req.method(),
        req.uri().path(),
        req.extensions().get::<Authentication>(),
    )
    .map_err(|d| policy.deny(req.method(), req.uri().path(), d));

    match denied {
        Ok(()) => next.run(req).await,
        Err(res) => res,
    }
}
