//! Postgres [`Database`] implementation.

mod impls;

use deadpool_postgres::{Pool, Runtime};
use derive_more::{Display, Error as StdError, From};
use tokio_postgres::{error::SqlState, NoTls};
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use deadpool_postgres::Config;

/// Postgres user directory.
#[derive(Clone, Debug)]
pub struct Postgres {
    /// Pool of connections to the database.
    pool: Pool,
}

impl Postgres {
    /// Creates a new [`Postgres`] client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If failed to create a connection pool.
    pub fn new(conf: &Config) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self { pool })
    }

    /// Acquires a connection from the pool.
    async fn client(
        &self,
    ) -> Result<deadpool_postgres::Client, Traced<database::Error>> {
        self.pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

/// Postgres database [`Error`].
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// Connection or query error.
    #[display("Postgres error: {_0}")]
    Connection(tokio_postgres::Error),

    /// Error of creating a new connection pool.
    #[display("Failed to create a new connection pool: {_0}")]
    PoolCreation(deadpool_postgres::CreatePoolError),

    /// Connection pool error.
    #[display("Connection pool error: {_0}")]
    Pool(deadpool_postgres::PoolError),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::Connection(e) => {
                e.code() == Some(&SqlState::UNIQUE_VIOLATION)
                    && constraint.map_or(true, |c| {
                        e.as_db_error().and_then(|e| e.constraint()) == Some(c)
                    })
            }
            Self::Pool(..) | Self::PoolCreation(..) => false,
        }
    }
}
