//! [`Directory`] definitions.

use derive_more::From;
use tracerr::Traced;

#[cfg(feature = "postgres")]
use super::Postgres;
use super::{Database, Error, Memory};

/// User directory backed by one of the supported [`Database`]s, chosen at
/// startup.
#[derive(Clone, Debug, From)]
pub enum Directory {
    /// [`Memory`] directory.
    Memory(Memory),

    /// [`Postgres`] directory.
    #[cfg(feature = "postgres")]
    Postgres(Postgres),
}

#[cfg(feature = "postgres")]
impl<Op, T> Database<Op> for Directory
where
    Memory: Database<Op, Ok = T, Err = Traced<Error>>,
    Postgres: Database<Op, Ok = T, Err = Traced<Error>>,
{
    type Ok = T;
    type Err = Traced<Error>;

    async fn execute(&self, op: Op) -> Result<Self::Ok, Self::Err> {
        match self {
            Self::Memory(db) => db.execute(op).await,
            Self::Postgres(db) => db.execute(op).await,
        }
        .map_err(tracerr::wrap!())
    }
}

#[cfg(not(feature = "postgres"))]
impl<Op, T> Database<Op> for Directory
where
    Memory: Database<Op, Ok = T, Err = Traced<Error>>,
{
    type Ok = T;
    type Err = Traced<Error>;

    async fn execute(&self, op: Op) -> Result<Self::Ok, Self::Err> {
        let Self::Memory(db) = self;
        db.execute(op).await.map_err(tracerr::wrap!())
    }
}
