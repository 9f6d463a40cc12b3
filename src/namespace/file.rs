//! JSON namespace files.
//!
//! ```json
//! {
//!   "env": {
//!     "sql": {
//!       "main": { "driver": "sqlite", "dbPath": "app.db" },
//!       "reporting": {
//!         "warehouse": { "driver": "postgres", "url": "postgres://localhost/wh" }
//!       },
//!       "notes": "not a source"
//!     }
//!   }
//! }
//! ```
//!
//! An object with a `driver` key is a connection provider, any other object is a nested context,
//! and every other JSON value is an unrelated binding.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{Binding, InMemoryNamespace};
use crate::driver::ConnectionProvider;
use crate::error::SqlHandleError;

/// Provider definition found in a namespace file, selected by its `driver` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum ProviderSpec {
    #[cfg(feature = "sqlite")]
    Sqlite(crate::sqlite::SqliteOptions),
    #[cfg(feature = "postgres")]
    Postgres(crate::postgres::PostgresOptions),
}

impl ProviderSpec {
    /// Create the provider. Pools open connections on first checkout, so this must run inside a
    /// Tokio runtime but performs no I/O.
    ///
    /// # Errors
    /// Returns `ConfigError` if the definition is invalid.
    pub fn into_provider(self) -> Result<Arc<dyn ConnectionProvider>, SqlHandleError> {
        match self {
            #[cfg(feature = "sqlite")]
            ProviderSpec::Sqlite(options) => {
                Ok(Arc::new(crate::sqlite::SqliteProvider::new_lazy(options)))
            }
            #[cfg(feature = "postgres")]
            ProviderSpec::Postgres(options) => {
                Ok(Arc::new(crate::postgres::PostgresProvider::new_lazy(&options)?))
            }
        }
    }
}

/// Read and parse a namespace file.
///
/// # Errors
/// Returns `NamespaceError` if the file cannot be read or is not a valid namespace document.
pub fn load_namespace_file(path: impl AsRef<Path>) -> Result<InMemoryNamespace, SqlHandleError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        SqlHandleError::NamespaceError(format!(
            "cannot read namespace file {}: {e}",
            path.display()
        ))
    })?;
    parse_namespace(&text)
}

/// Parse a namespace document.
///
/// # Errors
/// Returns `NamespaceError` for malformed JSON, a non-object root, or an invalid provider.
pub fn parse_namespace(json: &str) -> Result<InMemoryNamespace, SqlHandleError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SqlHandleError::NamespaceError(format!("invalid namespace JSON: {e}")))?;
    namespace_from_value(&value, "")
}

fn namespace_from_value(value: &Value, at: &str) -> Result<InMemoryNamespace, SqlHandleError> {
    let Value::Object(map) = value else {
        return Err(SqlHandleError::NamespaceError(format!(
            "namespace at \"{at}\" must be a JSON object"
        )));
    };
    let mut ns = InMemoryNamespace::new();
    for (name, child) in map {
        let path = format!("{at}/{name}");
        match child {
            Value::Object(fields) if fields.contains_key("driver") => {
                let spec: ProviderSpec = serde_json::from_value(child.clone()).map_err(|e| {
                    SqlHandleError::NamespaceError(format!("invalid provider at \"{path}\": {e}"))
                })?;
                ns.bind_path(name, Binding::Provider(spec.into_provider()?));
            }
            Value::Object(_) => {
                ns = ns.with_context(name, namespace_from_value(child, &path)?);
            }
            other => ns.bind_path(
                name,
                Binding::Other {
                    type_name: json_type_name(other).to_string(),
                },
            ),
        }
    }
    Ok(ns)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{Namespace, lookup_path};

    #[test]
    fn rejects_non_object_root() {
        let err = parse_namespace("[1, 2]").unwrap_err();
        assert!(matches!(err, SqlHandleError::NamespaceError(_)));
    }

    #[test]
    fn scalars_become_other_bindings() {
        let ns = parse_namespace(r#"{"a": {"b": 1, "c": "x"}}"#).unwrap();
        let root: Arc<dyn Namespace> = Arc::new(ns);
        let Some(Binding::Other { type_name }) = lookup_path(&root, "a/b").unwrap() else {
            panic!("expected other binding");
        };
        assert_eq!(type_name, "number");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn provider_objects_become_providers() {
        let ns = parse_namespace(r#"{"db": {"driver": "sqlite", "dbPath": ":memory:"}}"#).unwrap();
        let root: Arc<dyn Namespace> = Arc::new(ns);
        let Some(Binding::Provider(provider)) = lookup_path(&root, "db").unwrap() else {
            panic!("expected provider");
        };
        assert_eq!(provider.driver_name(), "sqlite");
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let err = parse_namespace(r#"{"db": {"driver": "oracle"}}"#).unwrap_err();
        assert!(err.to_string().contains("invalid provider"));
    }
}
