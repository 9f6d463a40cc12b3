//! Best-effort mapping between Rust values and driver values.
//!
//! Outbound, every [`Arg`](crate::args::Arg) becomes a
//! [`ParamBinding`](crate::driver::ParamBinding). Inbound, [`FromColumn`] turns a
//! [`RowValues`](crate::types::RowValues) into the requested shape
//! without ever failing: NULL and unconvertible values read as zero or `None`.

mod format;
mod inbound;
mod outbound;

pub use format::{format_statement, render_value};
pub use inbound::FromColumn;
pub use outbound::{bind_arg, bind_args};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
