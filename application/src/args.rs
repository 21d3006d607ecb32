//! [`Args`] definitions.

use clap::Parser;

/// Server of the visit management system.
///
/// Every configuration value may also be overridden with a `CONF.`-prefixed
/// environment variable (e.g. `CONF.service.jwt.secret`).
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file, skipped if absent.
    #[arg(short, long, env = "CONF_FILE", default_value = "config.toml")]
    pub config: String,
}

impl Args {
    /// Parses command line arguments.
    ///
    /// # Errors
    ///
    /// If the command line arguments are malformed.
    pub fn parse() -> Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }
}
