use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::SqlHandleError;

pub const DEFAULT_ROOT_NAMESPACE: &str = "env/sql";
pub const DEFAULT_CONFIG_FILE: &str = "sql-handles.json";
pub const DEFAULT_NAMESPACE_FILE: &str = "sql-handles-namespace.json";

pub const ENV_CONFIG_FILE: &str = "SQL_HANDLES_CONFIG";
pub const ENV_NAMESPACE_FILE: &str = "SQL_HANDLES_NAMESPACE";
pub const ENV_ROOT_NAMESPACE: &str = "SQL_HANDLES_ROOT_NAMESPACE";
pub const ENV_DATA_SOURCE_NAMES: &str = "SQL_HANDLES_DATA_SOURCE_NAMES";
pub const ENV_DEFAULT_DATA_SOURCE_NAME: &str = "SQL_HANDLES_DEFAULT_DATA_SOURCE_NAME";

/// Registry discovery settings.
///
/// Recognized keys are `rootNamespace`, `dataSourceNames` (comma separated; disables the recursive
/// search) and `defaultDataSourceName`. Missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    pub root_namespace: String,
    pub data_source_names: Option<String>,
    pub default_data_source_name: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_namespace: DEFAULT_ROOT_NAMESPACE.to_string(),
            data_source_names: None,
            default_data_source_name: None,
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub fn with_root_namespace(mut self, root: impl Into<String>) -> Self {
        self.root_namespace = root.into();
        self
    }

    #[must_use]
    pub fn with_data_source_names(mut self, names: impl Into<String>) -> Self {
        self.data_source_names = Some(names.into());
        self
    }

    #[must_use]
    pub fn with_default_data_source_name(mut self, name: impl Into<String>) -> Self {
        self.default_data_source_name = Some(name.into());
        self
    }

    /// The explicit source list, if one is configured and non-blank.
    #[must_use]
    pub fn source_names(&self) -> Option<Vec<String>> {
        let raw = self.data_source_names.as_deref()?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// The configured default override, if non-blank.
    #[must_use]
    pub fn default_source_name(&self) -> Option<&str> {
        self.default_data_source_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    /// Returns `ConfigError` if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, SqlHandleError> {
        serde_json::from_str(json)
            .map_err(|e| SqlHandleError::ConfigError(format!("invalid registry config: {e}")))
    }

    /// Build from flat key/value pairs. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            config.apply(key.as_ref(), value.into());
        }
        config
    }

    /// Parse `key=value` lines; blank lines and lines starting with `#` or `!` are skipped.
    ///
    /// # Errors
    /// Returns `ConfigError` for a non-comment line without `=` or `:`.
    pub fn from_properties_str(text: &str) -> Result<Self, SqlHandleError> {
        let mut pairs = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once(['=', ':']) else {
                return Err(SqlHandleError::ConfigError(format!(
                    "line {}: expected key=value",
                    lineno + 1
                )));
            };
            pairs.push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(Self::from_pairs(pairs))
    }

    /// Load a configuration file: JSON for `.json`, `key=value` lines otherwise.
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, SqlHandleError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!(path = %path.display(), "registry config not found: using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(SqlHandleError::ConfigError(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), "loading registry config");
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            Self::from_json_str(&text)
        } else {
            Self::from_properties_str(&text)
        }
    }

    /// Load the file named by `SQL_HANDLES_CONFIG` (default `sql-handles.json`), then apply any
    /// `SQL_HANDLES_*` key overrides from the environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration file is malformed.
    pub fn from_env() -> Result<Self, SqlHandleError> {
        let path =
            std::env::var(ENV_CONFIG_FILE).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load_file(path)?;
        for (var, key) in [
            (ENV_ROOT_NAMESPACE, "rootNamespace"),
            (ENV_DATA_SOURCE_NAMES, "dataSourceNames"),
            (ENV_DEFAULT_DATA_SOURCE_NAME, "defaultDataSourceName"),
        ] {
            if let Ok(value) = std::env::var(var) {
                config.apply(key, value);
            }
        }
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: String) {
        match key {
            "rootNamespace" => self.root_namespace = value,
            "dataSourceNames" => self.data_source_names = Some(value),
            "defaultDataSourceName" => self.default_data_source_name = Some(value),
            other => debug!(key = other, "ignoring unknown registry config key"),
        }
    }
}
