//! Request gate binding the [`Principal`] of a presented session token to the
//! request.
//!
//! The gate never rejects a request by itself: a request it fails to
//! authenticate continues as [`Authentication::Anonymous`], and the route
//! [`policy`] decides whether that is acceptable.
//!
//! [`policy`]: crate::policy

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use http::{header::InvalidHeaderName, HeaderName, HeaderValue};
use service::{
    command::{self, Command as _},
    domain::{user::session, Principal},
};
use tracing as log;

use crate::{config, AsError as _, Error, Service};

/// Name of the query parameter carrying a session token.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Name of the cookie carrying a session token.
pub const TOKEN_COOKIE: &str = "jwt";

/// Response header flagging a session token expiring soon.
pub const EXPIRING_HEADER: HeaderName =
    HeaderName::from_static("x-token-expiring");

/// Response header with the remaining validity of an expiring session token,
/// in milliseconds.
pub const REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-token-remaining");

/// Paths passed through without looking for any token.
const SKIPPED: &[&str] = &[
    "/",
    "/auth/login",
    "/auth/register",
    "/auth/refresh",
    "/actuator/health",
    "/error",
    "/favicon.ico",
];

/// Path prefixes passed through without looking for any token.
const SKIPPED_PREFIXES: &[&str] = &["/swagger-ui", "/v3/api-docs"];

/// Request gate state.
#[derive(Clone, Debug)]
pub struct Gate {
    /// [`Service`] authorizing the tokens.
    service: Service,

    /// Header carrying session tokens.
    header: HeaderName,

    /// Prefix of a session token in the [`Gate::header`].
    prefix: Arc<str>,

    /// Remaining validity below which a token is reported as expiring.
    expiring_threshold: Duration,
}

impl Gate {
    /// Creates a new [`Gate`] out of the provided [`config::Jwt`].
    ///
    /// # Errors
    ///
    /// If the [`config::Jwt::header`] is not a valid header name.
    pub fn new(
        service: Service,
        conf: &config::Jwt,
    ) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            service,
            header: conf.header.parse()?,
            prefix: conf.prefix.as_str().into(),
            expiring_threshold: conf.expiring_threshold,
        })
    }

    /// Returns the [`Service`] of this [`Gate`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Checks whether the `path` is passed through without authentication.
    #[must_use]
    pub fn skips(path: &str) -> bool {
        SKIPPED.contains(&path)
            || SKIPPED_PREFIXES.iter().any(|p| {
                path.strip_prefix(p).is_some_and(|rest| {
                    rest.is_empty() || rest.starts_with('/')
                })
            })
    }

    /// Extracts a raw session token out of the `req`uest, looking at the
    /// header, then the query string, then the cookies.
    fn extract(&self, req: &Request) -> Result<String, Anonymity> {
        let mut bad_prefix = false;
        if let Some(value) = req.headers().get(&self.header) {
            let token =
                value.to_str().ok().and_then(|v| bearer_token(v, &self.prefix));
            match token {
                Some(token) => return Ok(token.to_owned()),
                None => bad_prefix = true,
            }
        }

        let from_query =
            Query::<HashMap<String, String>>::try_from_uri(req.uri())
                .ok()
                .and_then(|Query(mut q)| q.remove(TOKEN_QUERY_PARAM))
                .filter(|t| !t.trim().is_empty());
        if let Some(token) = from_query {
            return Ok(token);
        }

        let from_cookie = CookieJar::from_headers(req.headers())
            .get(TOKEN_COOKIE)
            .map(|c| c.value().to_owned())
            .filter(|t| !t.trim().is_empty());
        if let Some(token) = from_cookie {
            return Ok(token);
        }

        Err(if bad_prefix {
            Anonymity::BadPrefix(Arc::clone(&self.prefix))
        } else {
            Anonymity::NoToken
        })
    }

    /// Authenticates a request to the `path` by its extracted `token`.
    async fn authenticate(
        &self,
        token: Result<String, Anonymity>,
        path: String,
    ) -> Authentication {
        let token = match token {
            Ok(token) => token,
            Err(reason) => return Authentication::Anonymous(reason),
        };

        let res = self
            .service
            .execute(command::AuthorizeUserSession { token })
            .await;
        match res {
            Ok(command::authorize_user_session::Output {
                principal,
                claims,
            }) => {
                let remaining = self
                    .service
                    .tokens()
                    .remaining(&claims)
                    .unwrap_or_default();
                Authentication::Authenticated(Session {
                    principal: Arc::new(principal),
                    expires_at: claims.expires_at,
                    remaining,
                })
            }
            Err(e) => {
                let e = e.into_error();
                log::warn!(
                    code = e.code,
                    path = %path,
                    "request stays anonymous: {}",
                    e.message,
                );
                Authentication::Anonymous(Anonymity::Rejected(e))
            }
        }
    }
}

/// Strips the `prefix` off the `header` value, returning the bearer token.
///
/// [`None`] if the `prefix` is absent or nothing follows it.
#[must_use]
pub fn bearer_token<'v>(header: &'v str, prefix: &str) -> Option<&'v str> {
    header
        .strip_prefix(prefix)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Outcome of authenticating a request, stored in its extensions.
#[derive(Clone, Debug)]
pub enum Authentication {
    /// Request carries a valid session token of an active [`Principal`].
    Authenticated(Session),

    /// Request is anonymous for the given reason.
    Anonymous(Anonymity),
}

impl Authentication {
    /// Returns the bound [`Session`], if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(s) => Some(s),
            Self::Anonymous(_) => None,
        }
    }
}

/// Session bound to a request.
#[derive(Clone, Debug)]
pub struct Session {
    /// Freshly resolved [`Principal`].
    pub principal: Arc<Principal>,

    /// Expiration of the presented session token.
    pub expires_at: session::ExpirationDateTime,

    /// Remaining validity of the presented session token on authentication.
    pub remaining: Duration,
}

/// Reason of a request staying anonymous.
#[derive(Clone, Debug)]
pub enum Anonymity {
    /// Path is passed through without authentication.
    Skipped,

    /// No session token presented.
    NoToken,

    /// Header is present, but doesn't start with the expected prefix.
    BadPrefix(Arc<str>),

    /// Presented session token is rejected.
    Rejected(Error),
}

impl Anonymity {
    /// Returns the code of this [`Anonymity`] reason.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Skipped => "SKIPPED",
            Self::NoToken => "TOKEN_MISSING",
            Self::BadPrefix(_) => "TOKEN_BAD_PREFIX",
            Self::Rejected(e) => e.code,
        }
    }
}

/// Middleware authenticating every request passing through.
///
/// The [`Authentication`] is scoped to the request and dropped together
/// with it.
pub async fn authenticate(
    State(gate): State<Gate>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth = if Gate::skips(req.uri().path()) {
        Authentication::Anonymous(Anonymity::Skipped)
    } else {
        let token = gate.extract(&req);
        gate.authenticate(token, req.uri().path().to_owned()).await
    };

    let expiring = auth
        .session()
        .map(|s| s.remaining)
        .filter(|left| *left < gate.expiring_threshold);

    _ = req.extensions_mut().insert(auth);
    let mut res = next.run(req).await;

    if let Some(left) = expiring {
        let millis = u64::try_from(left.as_millis()).unwrap_or(u64::MAX);
        let headers = res.headers_mut();
        _ = headers.insert(EXPIRING_HEADER, HeaderValue::from_static("true"));
        _ = headers.insert(REMAINING_HEADER, HeaderValue::from(millis));
    }
    res
}

#[cfg(test)]
mod spec {
    use super::{bearer_token, Gate};

    #[test]
    fn strips_configured_prefix() {
        assert_eq!(bearer_token("Bearer abc.def", "Bearer "), Some("abc.def"));
        assert_eq!(bearer_token("Token abc", "Token "), Some("abc"));
        assert_eq!(bearer_token("Bearer ", "Bearer "), None);
        assert_eq!(bearer_token("bearer abc", "Bearer "), None);
        assert_eq!(bearer_token("abc", "Bearer "), None);
    }

    #[test]
    fn skips_public_paths_only() {
        for path in [
            "/",
            "/auth/login",
            "/auth/register",
            "/auth/refresh",
            "/actuator/health",
            "/swagger-ui",
            "/swagger-ui/index.html",
            "/v3/api-docs/swagger-config",
            "/favicon.ico",
            "/error",
        ] {
            assert!(Gate::skips(path), "{path}");
        }
        for path in [
            "/auth/verify",
            "/auth/user-info",
            "/customers",
            "/swagger-uix",
            "/auth/login/extra",
        ] {
            assert!(!Gate::skips(path), "{path}");
        }
    }
}
