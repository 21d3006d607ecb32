//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use secrecy::SecretString;
use serde::Deserialize;
use service::token::{self, KeyPolicy};
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: Server,

    /// Service configuration.
    #[serde(default)]
    pub service: Service,

    /// Database configuration.
    #[serde(default)]
    pub database: Database,

    /// Default administrator account configuration.
    #[serde(default)]
    pub bootstrap: Bootstrap,

    /// Security configuration.
    #[serde(default)]
    pub security: Security,

    /// Log configuration.
    #[serde(default)]
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Session token configuration.
    pub jwt: Jwt,
}

/// Session [JWT] configuration.
///
/// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
#[derive(Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Jwt {
    /// Secret signing the tokens.
    #[default(SecretString::from("visit-management-secret".to_owned()))]
    pub secret: SecretString,

    /// Lifetime of access tokens.
    ///
    /// Refresh tokens live 7 times longer.
    #[default(time::Duration::from_secs(24 * 60 * 60))]
    #[serde(with = "humantime_serde")]
    pub expiration: time::Duration,

    /// Name of the HTTP header carrying access tokens.
    #[default("Authorization".to_owned())]
    pub header: String,

    /// Prefix of the access token in the [`Jwt::header`].
    #[default("Bearer ".to_owned())]
    pub prefix: String,

    /// Policy for a [`Jwt::secret`] shorter than the signing algorithm
    /// requires.
    pub key_policy: KeyPolicy,

    /// Remaining validity below which responses are marked as having an
    /// expiring token.
    #[default(time::Duration::from_secs(30 * 60))]
    #[serde(with = "humantime_serde")]
    pub expiring_threshold: time::Duration,
}

impl TryFrom<&Jwt> for service::Config {
    type Error = token::WeakSecretError;

    fn try_from(jwt: &Jwt) -> Result<Self, Self::Error> {
        Ok(Self {
            tokens: token::Codec::new(
                &jwt.secret,
                jwt.expiration,
                jwt.key_policy,
            )?,
        })
    }
}

/// Database configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Database {
    /// Storage of the user directory.
    pub backend: Backend,

    /// Postgres configuration.
    pub postgres: Postgres,
}

/// Storage of the user directory.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// [`Postgres`] database.
    #[default]
    Postgres,

    /// Process memory, lost on restart.
    Memory,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Default administrator account, created on startup if its username is
/// free.
#[derive(Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Bootstrap {
    /// Indicator whether the account should be created at all.
    #[default(true)]
    pub enabled: bool,

    /// Username of the account.
    #[default("admin".to_owned())]
    pub username: String,

    /// Initial password of the account.
    #[default(SecretString::from("123456".to_owned()))]
    pub password: SecretString,

    /// Real name of the account holder.
    #[default("System Administrator".to_owned())]
    pub real_name: String,

    /// Department of the account.
    #[default("System".to_owned())]
    pub department: String,
}

/// Security configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Security {
    /// Indicator whether 401 and 403 responses carry debug details.
    pub debug: bool,
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use secrecy::ExposeSecret as _;
    use service::token::KeyPolicy;

    use super::{Backend, Config};

    #[test]
    fn defaults_without_file() {
        let conf = Config::new("definitely-missing-config-file").unwrap();

        assert_eq!(conf.server.port, 8080);
        assert_eq!(conf.service.jwt.header, "Authorization");
        assert_eq!(conf.service.jwt.prefix, "Bearer ");
        assert_eq!(
            conf.service.jwt.expiration,
            Duration::from_secs(24 * 60 * 60),
        );
        assert_eq!(
            conf.service.jwt.expiring_threshold,
            Duration::from_secs(30 * 60),
        );
        assert_eq!(conf.service.jwt.key_policy, KeyPolicy::Pad);
        assert_eq!(conf.database.backend, Backend::Postgres);
        assert_eq!(conf.bootstrap.username, "admin");
        assert_eq!(conf.bootstrap.password.expose_secret(), "123456");
        assert!(!conf.security.debug);
    }

    #[test]
    fn short_secret_follows_key_policy() {
        let mut conf = Config::default();
        assert!(service::Config::try_from(&conf.service.jwt).is_ok());

        conf.service.jwt.key_policy = KeyPolicy::Strict;
        assert!(service::Config::try_from(&conf.service.jwt).is_err());
    }
}
