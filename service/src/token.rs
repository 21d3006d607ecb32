//! Session [`Token`] codec.
//!
//! Tokens are [JWT]s signed with HMAC-SHA-512 by a single process-wide secret.
//!
//! [JWT]: https://datatracker.ietf.org/doc/html/rfc7519

use std::{borrow::Cow, fmt, sync::Arc, time::Duration};

use common::DateTime;
use derive_more::{Debug, Display, From};
use jsonwebtoken::{
    errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tracerr::Traced;

use crate::domain::user::session::{Claims, ExpirationDateTime, Kind, Token};

/// Source of the current [`DateTime`].
pub type Clock = Arc<dyn Fn() -> DateTime + Send + Sync>;

/// Policy applied to a signing secret shorter than [`Codec::MIN_SECRET_LEN`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
    /// Pad the secret with a fixed repeating filler, warning about it.
    #[default]
    Pad,

    /// Refuse the secret.
    Strict,
}

/// Issuer and verifier of session [`Token`]s.
#[derive(Clone, Debug)]
pub struct Codec {
    /// Key signing issued [`Token`]s.
    #[debug(skip)]
    encoding_key: EncodingKey,

    /// Key verifying presented [`Token`]s.
    #[debug(skip)]
    decoding_key: DecodingKey,

    /// Rules of decoding presented [`Token`]s.
    validation: Validation,

    /// Lifetime of access [`Token`]s.
    ttl: Duration,

    /// [`Clock`] used for issuance and expiry checks.
    #[debug(skip)]
    clock: Clock,
}

impl Codec {
    /// Signing algorithm.
    pub const ALGORITHM: Algorithm = Algorithm::HS512;

    /// Minimum length of a signing secret in bytes.
    pub const MIN_SECRET_LEN: usize = 64;

    /// Lifetime of refresh [`Token`]s, in access [`Token`] lifetimes.
    pub const REFRESH_TTL_FACTOR: u32 = 7;

    /// Filler padding short secrets under [`KeyPolicy::Pad`].
    const FILLER: &'static [u8] = b"0123456789abcdef";

    /// Creates a new [`Codec`] signing with the given `secret` and issuing
    /// access [`Token`]s living for `ttl`.
    ///
    /// # Errors
    ///
    /// If the `secret` is too short under [`KeyPolicy::Strict`].
    pub fn new(
        secret: &SecretString,
        ttl: Duration,
        policy: KeyPolicy,
    ) -> Result<Self, WeakSecretError> {
        let key = Self::signing_key(secret.expose_secret().as_bytes(), policy)?;

        let mut validation = Validation::new(Self::ALGORITHM);
        // Expiry is checked against the `Clock` instead.
        validation.validate_exp = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            validation,
            ttl,
            clock: Arc::new(DateTime::now),
        })
    }

    /// Replaces the [`Clock`] of this [`Codec`].
    #[must_use]
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Returns the lifetime of access [`Token`]s.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the current [`DateTime`] of this [`Codec`]'s [`Clock`].
    #[must_use]
    pub fn now(&self) -> DateTime {
        (self.clock)()
    }

    /// Derives the signing key out of the raw `secret`.
    fn signing_key(
        secret: &[u8],
        policy: KeyPolicy,
    ) -> Result<Cow<'_, [u8]>, WeakSecretError> {
        let len = secret.len();
        if len >= Self::MIN_SECRET_LEN {
            return Ok(Cow::Borrowed(secret));
        }
        match policy {
            KeyPolicy::Strict => Err(WeakSecretError {
                len,
                min: Self::MIN_SECRET_LEN,
            }),
            KeyPolicy::Pad => {
                tracing::warn!(
                    len,
                    min = Self::MIN_SECRET_LEN,
                    "signing secret is too short and is padded with a fixed \
                     filler, never use it in production",
                );
                let mut key = secret.to_vec();
                let missing = Self::MIN_SECRET_LEN - len;
                key.extend(Self::FILLER.iter().cycle().take(missing));
                Ok(Cow::Owned(key))
            }
        }
    }

    /// Issues a new access [`Token`] for the `subject` with the given `roles`.
    ///
    /// # Errors
    ///
    /// If the [`Token`] fails to be encoded.
    pub fn issue_access_token<R: Into<String>>(
        &self,
        subject: &str,
        roles: impl IntoIterator<Item = R>,
    ) -> Result<Token, Traced<IssueError>> {
        let now = self.now();
        self.sign(&Claims {
            sub: subject.to_owned(),
            kind: Kind::Access,
            roles: roles.into_iter().map(Into::into).collect(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
            issued_at: now.coerce(),
            expires_at: (now + self.ttl).coerce(),
        })
    }

    /// Issues a new refresh [`Token`] for the `subject`.
    ///
    /// # Errors
    ///
    /// If the [`Token`] fails to be encoded.
    pub fn issue_refresh_token(
        &self,
        subject: &str,
    ) -> Result<Token, Traced<IssueError>> {
        let now = self.now();
        self.sign(&Claims {
            sub: subject.to_owned(),
            kind: Kind::Refresh,
            roles: vec![],
            jti: Some(uuid::Uuid::new_v4().to_string()),
            issued_at: now.coerce(),
            expires_at: (now + self.ttl * Self::REFRESH_TTL_FACTOR).coerce(),
        })
    }

    /// Signs the provided [`Claims`].
    fn sign(&self, claims: &Claims) -> Result<Token, Traced<IssueError>> {
        let token = jsonwebtoken::encode(
            &Header::new(Self::ALGORITHM),
            claims,
            &self.encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> IssueError))?;

        // SAFETY: Just signed by this `Codec`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        Ok(unsafe { Token::new_unchecked(token) })
    }

    /// Verifies the signature and expiry of the `token`, returning its
    /// [`Claims`].
    ///
    /// # Errors
    ///
    /// With the exact reason of the `token` being invalid.
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        let res = self.decode(token);
        if let Err(e) = &res {
            tracing::debug!(cause = e.code(), "token verification failed: {e}");
        }
        res
    }

    /// Decodes the `token` without logging failures.
    fn decode(&self, token: &str) -> Result<Claims, Error> {
        if token.trim().is_empty() {
            return Err(Error::Empty);
        }
        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding_key,
            &self.validation,
        )?
        .claims;
        if self.now() >= claims.expires_at.coerce() {
            return Err(Error::Expired);
        }
        Ok(claims)
    }

    /// Returns the subject of the `token`, if it verifies.
    #[must_use]
    pub fn subject_of(&self, token: &str) -> Option<String> {
        self.verify(token).ok().map(|c| c.sub)
    }

    /// Returns the role claims of the `token`, or nothing if it doesn't
    /// verify.
    #[must_use]
    pub fn roles_of(&self, token: &str) -> Vec<String> {
        self.verify(token).map(|c| c.roles).unwrap_or_default()
    }

    /// Returns the ID of the `token`, if it verifies and carries one.
    #[must_use]
    pub fn jwt_id(&self, token: &str) -> Option<String> {
        self.verify(token).ok().and_then(|c| c.jti)
    }

    /// Checks whether the `token` verifies as an access [`Token`].
    #[must_use]
    pub fn is_access_token(&self, token: &str) -> bool {
        self.verify(token).is_ok_and(|c| c.kind == Kind::Access)
    }

    /// Checks whether the `token` verifies as a refresh [`Token`].
    #[must_use]
    pub fn is_refresh_token(&self, token: &str) -> bool {
        self.verify(token).is_ok_and(|c| c.kind == Kind::Refresh)
    }

    /// Checks whether the `token` is expired or doesn't verify at all.
    #[must_use]
    pub fn is_expired(&self, token: &str) -> bool {
        self.verify(token).is_err()
    }

    /// Returns the expiration [`DateTime`] of the `token`, if it verifies.
    #[must_use]
    pub fn expires_at(&self, token: &str) -> Option<ExpirationDateTime> {
        self.verify(token).ok().map(|c| c.expires_at)
    }

    /// Returns how long the `token` stays valid, which is zero for a token
    /// that doesn't verify.
    #[must_use]
    pub fn remaining_validity(&self, token: &str) -> Duration {
        self.verify(token)
            .ok()
            .and_then(|c| self.remaining(&c))
            .unwrap_or_default()
    }

    /// Returns how long the verified [`Claims`] stay valid.
    #[must_use]
    pub fn remaining(&self, claims: &Claims) -> Option<Duration> {
        claims.expires_at.duration_since(&self.now())
    }

    /// Checks whether the `token` expires within the `threshold`.
    ///
    /// A token that doesn't verify is always expiring.
    #[must_use]
    pub fn is_expiring_soon(&self, token: &str, threshold: Duration) -> bool {
        self.verify(token)
            .ok()
            .and_then(|c| self.remaining(&c))
            .map_or(true, |left| left < threshold)
    }

    /// Mints a new access [`Token`] out of a valid refresh [`Token`], for the
    /// same subject and with the given `roles`.
    ///
    /// Refresh [`Token`]s carry no roles, so the caller decides which `roles`
    /// to embed.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::InvalidRefreshToken`] if the `refresh_token` doesn't
    ///   verify or isn't a refresh [`Token`];
    /// - [`RefreshError::Issue`] if the new [`Token`] fails to be encoded.
    pub fn refresh_access_token<R: Into<String>>(
        &self,
        refresh_token: &str,
        roles: impl IntoIterator<Item = R>,
    ) -> Result<Token, Traced<RefreshError>> {
        let claims = self
            .verify(refresh_token)
            .ok()
            .filter(|c| c.kind == Kind::Refresh)
            .ok_or_else(|| tracerr::new!(RefreshError::InvalidRefreshToken))?;

        self.issue_access_token(&claims.sub, roles)
            .map_err(tracerr::map_from_and_wrap!())
    }
}

/// Reason of a [`Token`] failing verification.
#[derive(Clone, Copy, Debug, Display, derive_more::Error, Eq, PartialEq)]
pub enum Error {
    /// No [`Token`] provided.
    #[display("Token is empty")]
    Empty,

    /// [`Token`] is not a well-formed JWT with expected claims.
    #[display("Token is malformed")]
    Malformed,

    /// [`Token`] signature doesn't match its contents.
    #[display("Token signature is invalid")]
    BadSignature,

    /// [`Token`] is expired.
    #[display("Token is expired")]
    Expired,

    /// [`Token`] is signed in an unsupported way.
    #[display("Token is unsupported")]
    Unsupported,
}

impl Error {
    /// Returns the code of this [`Error`].
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Empty => "TOKEN_EMPTY",
            Self::Malformed => "TOKEN_MALFORMED",
            Self::BadSignature => "TOKEN_BAD_SIGNATURE",
            Self::Expired => "TOKEN_EXPIRED",
            Self::Unsupported => "TOKEN_UNSUPPORTED",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        let kind = e.kind();
        if matches!(kind, ErrorKind::InvalidSignature) {
            Self::BadSignature
        } else if matches!(kind, ErrorKind::ExpiredSignature) {
            Self::Expired
        } else if matches!(
            kind,
            ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::MissingAlgorithm
                | ErrorKind::InvalidKeyFormat
        ) {
            Self::Unsupported
        } else {
            Self::Malformed
        }
    }
}

/// Error of issuing a [`Token`].
#[derive(Debug, Display, derive_more::Error, From)]
#[display("Failed to encode a JSON Web Token: {_0}")]
pub struct IssueError(jsonwebtoken::errors::Error);

/// Error of [`Codec::refresh_access_token()`].
#[derive(Debug, Display, derive_more::Error, From)]
pub enum RefreshError {
    /// Provided refresh [`Token`] is invalid, expired or not a refresh one.
    #[display("Invalid refresh token")]
    InvalidRefreshToken,

    /// New access [`Token`] failed to be issued.
    #[display("{_0}")]
    Issue(IssueError),
}

/// Signing secret refused under [`KeyPolicy::Strict`].
#[derive(Clone, Copy, Debug, derive_more::Error, Eq, PartialEq)]
pub struct WeakSecretError {
    /// Length of the refused secret in bytes.
    pub len: usize,

    /// Minimum required length in bytes.
    pub min: usize,
}

impl fmt::Display for WeakSecretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signing secret is {} bytes long, while at least {} bytes required",
            self.len, self.min,
        )
    }
}

#[cfg(test)]
mod spec {
    use std::{
        collections::BTreeSet,
        sync::{
            atomic::{AtomicI64, Ordering},
            Arc,
        },
        time::Duration,
    };

    use common::DateTime;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use secrecy::SecretString;

    use super::{Codec, Error, KeyPolicy, RefreshError, WeakSecretError};

    const SECRET: &str =
        "a-test-secret-that-is-definitely-longer-than-sixty-four-bytes-0123";
    const TTL: Duration = Duration::from_secs(60 * 60);
    const START: i64 = 1_700_000_000;

    /// [`Codec`] with a manually driven clock, in seconds.
    fn codec() -> (Codec, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(START));
        let clock = Arc::clone(&now);
        let secret = SecretString::from(SECRET.to_owned());
        let codec = Codec::new(&secret, TTL, KeyPolicy::Strict)
            .unwrap()
            .with_clock(move || {
                DateTime::from_unix_timestamp(clock.load(Ordering::SeqCst))
                    .unwrap()
            });
        (codec, now)
    }

    fn advance(clock: &AtomicI64, secs: i64) {
        _ = clock.fetch_add(secs, Ordering::SeqCst);
    }

    /// Swaps the payload of `token` with the one of `other`, keeping the
    /// signature of `token`.
    fn splice(token: &str, other: &str) -> String {
        let parts = token.split('.').collect::<Vec<_>>();
        let payload = other.split('.').nth(1).unwrap();
        format!("{}.{payload}.{}", parts[0], parts[2])
    }

    #[test]
    fn access_token_roundtrips_subject_and_roles() {
        let (codec, _) = codec();
        let token = codec
            .issue_access_token("alice", ["ROLE_SALES", "ROLE_MANAGER"])
            .unwrap();

        let claims = codec.verify(token.as_ref()).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(codec.subject_of(token.as_ref()).as_deref(), Some("alice"));
        assert_eq!(
            codec
                .roles_of(token.as_ref())
                .into_iter()
                .collect::<BTreeSet<_>>(),
            BTreeSet::from([
                "ROLE_MANAGER".to_owned(),
                "ROLE_SALES".to_owned(),
            ]),
        );
        assert_eq!(
            codec.expires_at(token.as_ref()).unwrap().unix_timestamp(),
            START + 3600,
        );
        assert!(codec.jwt_id(token.as_ref()).is_some());
    }

    #[test]
    fn token_expires_deterministically() {
        let (codec, now) = codec();
        let token = codec.issue_access_token("alice", ["ROLE_SALES"]).unwrap();

        advance(&now, 3599);
        assert!(codec.verify(token.as_ref()).is_ok());
        assert_eq!(
            codec.remaining_validity(token.as_ref()),
            Duration::from_secs(1),
        );

        advance(&now, 1);
        assert_eq!(codec.verify(token.as_ref()), Err(Error::Expired));
        assert!(codec.is_expired(token.as_ref()));

        advance(&now, 86_400);
        assert_eq!(codec.verify(token.as_ref()), Err(Error::Expired));
        assert_eq!(codec.remaining_validity(token.as_ref()), Duration::ZERO);
        assert!(codec.subject_of(token.as_ref()).is_none());
        assert!(codec.roles_of(token.as_ref()).is_empty());
    }

    #[test]
    fn access_and_refresh_are_mutually_exclusive() {
        let (codec, _) = codec();
        let access = codec.issue_access_token("bob", ["ROLE_ADMIN"]).unwrap();
        let refresh = codec.issue_refresh_token("bob").unwrap();

        assert!(codec.is_access_token(access.as_ref()));
        assert!(!codec.is_refresh_token(access.as_ref()));
        assert!(codec.is_refresh_token(refresh.as_ref()));
        assert!(!codec.is_access_token(refresh.as_ref()));

        assert!(codec.roles_of(refresh.as_ref()).is_empty());
        assert_eq!(
            codec.expires_at(refresh.as_ref()).unwrap().unix_timestamp(),
            START + 7 * 3600,
        );
    }

    #[test]
    fn missing_type_claim_means_access() {
        let (codec, _) = codec();
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &serde_json::json!({
                "sub": "legacy",
                "iat": START,
                "exp": START + 60,
            }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(codec.is_access_token(&token));
        assert!(!codec.is_refresh_token(&token));
        assert_eq!(codec.subject_of(&token).as_deref(), Some("legacy"));
    }

    #[test]
    fn distinguishes_failure_causes() {
        let (codec, _) = codec();
        let alice = codec.issue_access_token("alice", ["ROLE_SALES"]).unwrap();
        let admin = codec.issue_access_token("admin", ["ROLE_ADMIN"]).unwrap();

        assert_eq!(codec.verify(""), Err(Error::Empty));
        assert_eq!(codec.verify("   "), Err(Error::Empty));
        assert_eq!(codec.verify("not-a-token"), Err(Error::Malformed));
        assert_eq!(
            codec.verify(&splice(alice.as_ref(), admin.as_ref())),
            Err(Error::BadSignature),
        );

        let other = Codec::new(
            &SecretString::from(SECRET.replace('a', "b")),
            TTL,
            KeyPolicy::Strict,
        )
        .unwrap();
        assert_eq!(
            codec.verify(other.issue_refresh_token("x").unwrap().as_ref()),
            Err(Error::BadSignature),
        );

        let hs256 = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({"sub": "x", "iat": START, "exp": START + 60}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(codec.verify(&hs256), Err(Error::Unsupported));
    }

    #[test]
    fn refresh_rejects_access_expired_and_tampered() {
        let (codec, now) = codec();
        let access = codec.issue_access_token("alice", ["ROLE_SALES"]).unwrap();
        let refresh = codec.issue_refresh_token("alice").unwrap();
        let mallory = codec.issue_refresh_token("mallory").unwrap();

        for bad in [
            access.as_ref().to_owned(),
            splice(refresh.as_ref(), mallory.as_ref()),
            "garbage".to_owned(),
        ] {
            let err =
                codec.refresh_access_token(&bad, ["ROLE_SALES"]).unwrap_err();
            assert!(matches!(err.as_ref(), RefreshError::InvalidRefreshToken));
        }

        advance(&now, 7 * 3600);
        let err = codec
            .refresh_access_token(refresh.as_ref(), ["ROLE_SALES"])
            .unwrap_err();
        assert!(matches!(err.as_ref(), RefreshError::InvalidRefreshToken));
    }

    #[test]
    fn refresh_mints_new_later_access_token() {
        let (codec, now) = codec();
        let access = codec.issue_access_token("alice", ["ROLE_SALES"]).unwrap();
        let refresh = codec.issue_refresh_token("alice").unwrap();

        advance(&now, 600);
        let renewed = codec
            .refresh_access_token(refresh.as_ref(), ["ROLE_MANAGER"])
            .unwrap();

        assert_ne!(renewed, access);
        assert!(codec.is_access_token(renewed.as_ref()));
        assert_eq!(
            codec.subject_of(renewed.as_ref()).as_deref(),
            Some("alice"),
        );
        assert_eq!(codec.roles_of(renewed.as_ref()), ["ROLE_MANAGER"]);
        assert!(
            codec.expires_at(renewed.as_ref()).unwrap()
                > codec.expires_at(access.as_ref()).unwrap(),
        );
        assert!(codec.is_refresh_token(refresh.as_ref()));
    }

    #[test]
    fn expiring_soon_threshold() {
        let (codec, now) = codec();
        let token = codec.issue_access_token("alice", ["ROLE_SALES"]).unwrap();
        let threshold = Duration::from_secs(30 * 60);

        assert!(!codec.is_expiring_soon(token.as_ref(), threshold));
        advance(&now, 31 * 60);
        assert!(codec.is_expiring_soon(token.as_ref(), threshold));
        assert!(codec.is_expiring_soon("garbage", threshold));
    }

    #[test]
    fn short_secret_policies() {
        let short = SecretString::from("short".to_owned());

        assert_eq!(
            Codec::new(&short, TTL, KeyPolicy::Strict).unwrap_err(),
            WeakSecretError { len: 5, min: 64 },
        );

        let padded = Codec::new(&short, TTL, KeyPolicy::Pad).unwrap();
        let explicit = Codec::new(
            &SecretString::from(format!(
                "short{}",
                "0123456789abcdef".repeat(4).get(..59).unwrap(),
            )),
            TTL,
            KeyPolicy::Strict,
        )
        .unwrap();
        let token = padded.issue_access_token("alice", ["ROLE_SALES"]).unwrap();

        assert_eq!(
            explicit.subject_of(token.as_ref()).as_deref(),
            Some("alice"),
        );
    }
}
