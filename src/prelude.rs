//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::args;
pub use crate::args::{Arg, InOutParam, OutParam, OutputValue};
pub use crate::coercion::{FromColumn, format_statement};
pub use crate::driver::{Connection, ConnectionProvider};
pub use crate::error::{ErrorKind, SqlHandleError};
pub use crate::namespace::{Binding, InMemoryNamespace, Namespace};
pub use crate::registry::{ConnectionRegistry, DEFAULT_SOURCE_ALIAS, RegistryConfig};
pub use crate::results::{DbRow, ResultSet};
pub use crate::statement::{
    Insert, ResultCursor, RowMapper, Select, Statement, StoredProcedure, Update,
};
pub use crate::types::{ColumnRef, RowValues, SqlType};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresOptions, PostgresProvider};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteProvider};
