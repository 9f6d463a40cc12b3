//! PostgreSQL driver backed by `tokio-postgres` and a bb8 pool.
//!
//! `?` markers are rewritten to `$N` before preparing. Parameters are encoded against the
//! types the server reports for the prepared statement.

mod config;
mod connection;
mod params;
mod query;
mod statement;

pub use config::{PgManager, PostgresOptions, PostgresProvider};
pub use connection::PostgresConnection;
pub use query::{build_result_set_from_statement, postgres_extract_value};
pub use statement::PostgresStatement;
