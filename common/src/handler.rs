//! [`Handler`] abstraction shared by commands, queries and storages.

use std::future::Future;

/// Asynchronous handler of some `Args`.
///
/// Commands, queries and database operations are all expressed as
/// [`Handler`] implementations differing only by their `Args`.
pub trait Handler<Args = ()> {
    /// Type of a successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided `args`.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
