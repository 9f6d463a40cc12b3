//! Reusable statement handles.
//!
//! Every handle wraps a [`StatementCore`]: SQL text, ordered arguments, an optional source name
//! and an optional caller-supplied connection. `execute()` acquires a connection when none is
//! bound, binds the arguments and runs the statement; `close()` releases everything the handle
//! acquired itself and leaves it ready to run again.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sql_handles::prelude::*;
//!
//! # async fn demo(registry: Arc<ConnectionRegistry>) -> Result<(), SqlHandleError> {
//! let mut update = Update::with_sql(Arc::clone(&registry), "update t set x = ? where id = ?");
//! update.set_args(args![5, 1]);
//! update.execute().await?;
//! assert_eq!(update.row_count(), 1);
//! update.close().await;
//!
//! let mut select = Select::with_sql(registry, "select id, name from t");
//! select.execute().await?;
//! while select.next() {
//!     println!("{}", select.get_line(","));
//! }
//! select.close().await;
//! # Ok(()) }
//! ```

use crate::args::Arg;
use crate::driver::Connection;

/// Constructors and consuming builder forms common to all handle types.
macro_rules! statement_handle {
    ($ty:ident) => {
        impl $crate::statement::Statement for $ty {
            fn core(&self) -> &$crate::statement::StatementCore {
                &self.core
            }

            fn core_mut(&mut self) -> &mut $crate::statement::StatementCore {
                &mut self.core
            }
        }

        impl ::std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("sql", &self.core.sql())
                    .field("source_name", &self.core.source_name())
                    .field("ownership", &self.core.ownership())
                    .field("open", &self.core.is_open())
                    .finish()
            }
        }

        impl $ty {
            /// Handle with SQL text set.
            pub fn with_sql(
                registry: ::std::sync::Arc<$crate::registry::ConnectionRegistry>,
                sql: impl Into<String>,
            ) -> Self {
                let mut handle = Self::new(registry);
                handle.core.set_sql(sql.into());
                handle
            }

            #[must_use]
            pub fn with_args(mut self, args: Vec<$crate::args::Arg>) -> Self {
                self.core.set_args(args);
                self
            }

            #[must_use]
            pub fn with_source(mut self, name: &str) -> Self {
                self.core.set_source_name(Some(name.to_string()));
                self
            }

            #[must_use]
            pub fn with_connection(mut self, connection: $crate::driver::Connection) -> Self {
                self.core.set_connection(Some(connection));
                self
            }

            /// Same as [`close_with(true)`](Self::close_with).
            pub async fn close(&mut self) {
                self.close_with(true).await;
            }
        }
    };
}

pub(crate) use statement_handle;

mod cursor;
mod lifecycle;
mod mutation;
mod procedure;
mod select;

pub use cursor::{Cursor, ResultCursor, RowMapper};
pub use lifecycle::{Ownership, StatementCore};
pub use mutation::{Insert, Update};
pub use procedure::StoredProcedure;
pub use select::Select;

/// Configuration shared by every statement kind.
///
/// Setters are ignored while the statement is open (between `execute()` and `close()`), and
/// return the handle so calls can be chained.
pub trait Statement {
    fn core(&self) -> &StatementCore;

    fn core_mut(&mut self) -> &mut StatementCore;

    fn set_sql(&mut self, sql: impl Into<String>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_sql(sql.into());
        self
    }

    /// Choose a registered source; `None` uses the registry default.
    fn set_source_name(&mut self, name: Option<&str>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_source_name(name.map(str::to_string));
        self
    }

    fn set_args(&mut self, args: Vec<Arg>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_args(args);
        self
    }

    fn add_args(&mut self, args: impl IntoIterator<Item = Arg>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().add_args(args);
        self
    }

    fn add_arg(&mut self, arg: impl Into<Arg>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().add_args([arg.into()]);
        self
    }

    /// Run on a caller-managed connection (`Some`) or go back to registry connections (`None`).
    fn set_connection(&mut self, connection: Option<Connection>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_connection(connection);
        self
    }

    fn sql(&self) -> Option<&str> {
        self.core().sql()
    }

    fn args(&self) -> &[Arg] {
        self.core().args()
    }

    fn source_name(&self) -> Option<&str> {
        self.core().source_name()
    }

    fn connection(&self) -> Option<&Connection> {
        self.core().connection()
    }

    fn using_explicit_connection(&self) -> bool {
        self.core().ownership() == Ownership::Explicit
    }

    fn is_open(&self) -> bool {
        self.core().is_open()
    }
}
