//! Reusable SQL statement handles over named, pooled connection sources.
//!
//! A [`ConnectionRegistry`] discovers connection providers in a [`namespace`] and hands out
//! connections by name. Statement handles ([`Update`], [`Insert`], [`Select`],
//! [`StoredProcedure`]) bind `?` arguments, execute, expose typed results, and release what they
//! acquired on `close()`.

pub mod args;
pub mod coercion;
pub mod driver;
pub mod error;
pub mod namespace;
pub mod placeholders;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod statement;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use args::{Arg, InOutParam, OutParam, OutputValue};
pub use driver::Connection;
pub use error::{ErrorKind, SqlHandleError};
pub use registry::{ConnectionRegistry, ConnectionSource, RegistryConfig};
pub use results::{DbRow, ResultSet};
pub use statement::{Insert, ResultCursor, Select, Statement, StoredProcedure, Update};
pub use types::{ColumnRef, RowValues, SqlType};

/// Name and version of this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl std::fmt::Display for ReleaseInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[must_use]
pub fn release_info() -> ReleaseInfo {
    ReleaseInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    }
}
