use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum SqlHandleError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    /// A previous initialization attempt failed; the registry never retries.
    #[error("Connection registry initialization failed: no sources available")]
    RegistryUninitialized,

    #[error("No connection sources were found during registry initialization")]
    NoSourcesAvailable,

    #[error("Connection source \"{0}\" is unrecognized or is not initialized")]
    UnknownSource(String),

    #[error("Statement was not closed since its prior execution")]
    AlreadyOpen,

    #[error("Statement has no SQL text to execute")]
    NoSql,

    #[error("SQL execution failed: {0}")]
    ExecutionFailed(#[source] Box<SqlHandleError>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Namespace error: {0}")]
    NamespaceError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

/// Coarse classification of [`SqlHandleError`], independent of the driver in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RegistryUninitialized,
    NoSourcesAvailable,
    UnknownSource,
    AlreadyOpen,
    NoSql,
    ExecutionFailed,
    Config,
    Namespace,
    Connection,
    Parameter,
    Driver,
    Other,
}

impl SqlHandleError {
    /// Wrap a prepare/bind/execute failure, leaving an existing wrapper untouched.
    #[must_use]
    pub fn execution_failed(cause: SqlHandleError) -> Self {
        match cause {
            already @ SqlHandleError::ExecutionFailed(_) => already,
            other => SqlHandleError::ExecutionFailed(Box::new(other)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            #[cfg(feature = "sqlite")]
            SqlHandleError::SqliteError(_) => ErrorKind::Driver,
            #[cfg(feature = "postgres")]
            SqlHandleError::PostgresError(_) => ErrorKind::Driver,
            SqlHandleError::RegistryUninitialized => ErrorKind::RegistryUninitialized,
            SqlHandleError::NoSourcesAvailable => ErrorKind::NoSourcesAvailable,
            SqlHandleError::UnknownSource(_) => ErrorKind::UnknownSource,
            SqlHandleError::AlreadyOpen => ErrorKind::AlreadyOpen,
            SqlHandleError::NoSql => ErrorKind::NoSql,
            SqlHandleError::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
            SqlHandleError::ConfigError(_) => ErrorKind::Config,
            SqlHandleError::NamespaceError(_) => ErrorKind::Namespace,
            SqlHandleError::ConnectionError(_) => ErrorKind::Connection,
            SqlHandleError::ParameterError(_) => ErrorKind::Parameter,
            SqlHandleError::Other(_) => ErrorKind::Other,
        }
    }

    /// The underlying cause of an `ExecutionFailed`, or `self` for every other variant.
    #[must_use]
    pub fn root_cause(&self) -> &SqlHandleError {
        match self {
            SqlHandleError::ExecutionFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_failed_does_not_double_wrap() {
        let err = SqlHandleError::execution_failed(SqlHandleError::UnknownSource("x".into()));
        let again = SqlHandleError::execution_failed(err);
        assert_eq!(again.kind(), ErrorKind::ExecutionFailed);
        assert_eq!(again.root_cause().kind(), ErrorKind::UnknownSource);
    }

    #[test]
    fn root_cause_of_plain_error_is_itself() {
        let err = SqlHandleError::NoSql;
        assert!(matches!(err.root_cause(), SqlHandleError::NoSql));
        assert_eq!(err.to_string(), "Statement has no SQL text to execute");
    }
}
