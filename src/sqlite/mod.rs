//! `SQLite` driver backed by `rusqlite` and a bb8 pool.
//!
//! Blocking `rusqlite` work runs on `spawn_blocking`. `SQLite` has no stored procedures, so
//! callable statements run as queries whose first row carries the OUT values.

mod config;
mod connection;
mod params;
mod query;
mod statement;

pub use config::{
    SharedSqliteConnection, SqliteManager, SqliteOptions, SqliteOptionsBuilder, SqliteProvider,
};
pub use connection::SqliteConnection;
pub use query::build_result_set;
pub use statement::SqliteStatement;
