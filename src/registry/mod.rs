//! Named connection sources.
//!
//! A [`ConnectionRegistry`] discovers every connection provider bound under a root path of a
//! [`Namespace`], elects a default, and hands out connections by name. Discovery runs at most
//! once: the registry latches either ready or failed, and a failed registry never retries.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, error, warn};

use crate::driver::{Connection, ConnectionProvider};
use crate::error::SqlHandleError;
use crate::namespace::{Namespace, file::load_namespace_file};

mod config;
mod discovery;

pub use config::{
    DEFAULT_CONFIG_FILE, DEFAULT_NAMESPACE_FILE, DEFAULT_ROOT_NAMESPACE, ENV_CONFIG_FILE,
    ENV_DATA_SOURCE_NAMES, ENV_DEFAULT_DATA_SOURCE_NAME, ENV_NAMESPACE_FILE, ENV_ROOT_NAMESPACE,
    RegistryConfig,
};

/// Reserved name under which the elected default source is also registered.
pub const DEFAULT_SOURCE_ALIAS: &str = "DEFAULT";

static GLOBAL: OnceLock<Arc<ConnectionRegistry>> = OnceLock::new();

/// A named provider of live connections.
#[derive(Clone)]
pub struct ConnectionSource {
    name: String,
    provider: Arc<dyn ConnectionProvider>,
}

impl ConnectionSource {
    pub fn new(name: &str, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            name: name.to_string(),
            provider,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.provider
    }
}

impl fmt::Debug for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSource")
            .field("name", &self.name)
            .field("driver", &self.provider.driver_name())
            .finish()
    }
}

#[derive(Debug, Clone)]
enum ConfigSource {
    Inline(RegistryConfig),
    File(PathBuf),
    Env,
}

#[derive(Debug, Clone)]
enum NamespaceSource {
    Inline(Arc<dyn Namespace>),
    File(PathBuf),
    Missing,
}

#[derive(Debug)]
struct Sources {
    by_name: IndexMap<String, ConnectionSource>,
    default_name: Option<String>,
}

#[derive(Debug)]
enum Phase {
    Uninitialized,
    Ready(Sources),
    Failed,
}

/// Resolves logical source names to live connections.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sql_handles::prelude::*;
///
/// # async fn demo() -> Result<(), SqlHandleError> {
/// let provider = SqliteOptions::builder("app.db").build().await?;
/// let ns = InMemoryNamespace::new().with_provider("env/sql/app", Arc::new(provider));
/// let registry = Arc::new(ConnectionRegistry::new(Arc::new(ns), RegistryConfig::default()));
///
/// let conn = registry.acquire(None).await?;
/// registry.release(None, conn).await;
/// # Ok(()) }
/// ```
pub struct ConnectionRegistry {
    config: ConfigSource,
    namespace: NamespaceSource,
    state: Mutex<Phase>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new(namespace: Arc<dyn Namespace>, config: RegistryConfig) -> Self {
        Self::builder().namespace(namespace).config(config).build()
    }

    #[must_use]
    pub fn builder() -> ConnectionRegistryBuilder {
        ConnectionRegistryBuilder::default()
    }

    /// Install the process-wide registry. Fails (returning it) if one is already installed.
    ///
    /// # Errors
    /// Returns the given registry back when a global registry already exists.
    pub fn install_global(
        registry: Arc<ConnectionRegistry>,
    ) -> Result<(), Arc<ConnectionRegistry>> {
        GLOBAL.set(registry)
    }

    /// The process-wide registry. Unless one was installed, it is built on first use from
    /// `SQL_HANDLES_CONFIG`/`SQL_HANDLES_*` configuration and the namespace file named by
    /// `SQL_HANDLES_NAMESPACE`.
    pub fn global() -> Arc<ConnectionRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let namespace_file = std::env::var(ENV_NAMESPACE_FILE)
                .unwrap_or_else(|_| DEFAULT_NAMESPACE_FILE.to_string());
            Arc::new(
                Self::builder()
                    .config_from_env()
                    .namespace_file(namespace_file)
                    .build(),
            )
        }))
    }

    fn lock_state(&self) -> MutexGuard<'_, Phase> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run discovery now instead of on the first acquire. Returns `true` when the registry is
    /// ready, including with zero sources.
    ///
    /// Provider pools are created here, so call it from within a Tokio runtime.
    pub fn initialize(&self) -> bool {
        let mut state = self.lock_state();
        self.ensure_initialized(&mut state);
        matches!(*state, Phase::Ready(_))
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(*self.lock_state(), Phase::Ready(_))
    }

    #[must_use]
    pub fn initialization_failed(&self) -> bool {
        matches!(*self.lock_state(), Phase::Failed)
    }

    /// Real name of the elected default source, initializing the registry if needed.
    /// `None` when initialization failed or found no sources.
    #[must_use]
    pub fn default_source_name(&self) -> Option<String> {
        let mut state = self.lock_state();
        self.ensure_initialized(&mut state);
        match &*state {
            Phase::Ready(sources) => sources.default_name.clone(),
            _ => None,
        }
    }

    /// Every registered name, the default alias included, in registration order. Initializes
    /// the registry if needed; empty when initialization failed or found no sources.
    #[must_use]
    pub fn list_source_names(&self) -> Vec<String> {
        let mut state = self.lock_state();
        self.ensure_initialized(&mut state);
        match &*state {
            Phase::Ready(sources) => sources.by_name.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Look up a source, initializing the registry if needed. `None` selects the default.
    ///
    /// # Errors
    /// `RegistryUninitialized` after a failed initialization, `NoSourcesAvailable` when nothing
    /// was discovered, `UnknownSource` for an unregistered name.
    pub fn source(&self, name: Option<&str>) -> Result<ConnectionSource, SqlHandleError> {
        let mut state = self.lock_state();
        self.ensure_initialized(&mut state);
        let sources = match &*state {
            Phase::Ready(sources) => sources,
            Phase::Failed | Phase::Uninitialized => {
                return Err(SqlHandleError::RegistryUninitialized);
            }
        };
        if sources.by_name.is_empty() {
            return Err(SqlHandleError::NoSourcesAvailable);
        }
        let name = name.unwrap_or(DEFAULT_SOURCE_ALIAS);
        sources
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| SqlHandleError::UnknownSource(name.to_string()))
    }

    /// Get a connection from the named source (`None` for the default).
    ///
    /// # Errors
    /// The lookup errors of [`source`](Self::source), or the provider's own error unchanged.
    pub async fn acquire(&self, name: Option<&str>) -> Result<Connection, SqlHandleError> {
        let source = self.source(name)?;
        debug!(
            source = %source.name,
            requested = name.unwrap_or(DEFAULT_SOURCE_ALIAS),
            "acquiring connection"
        );
        source.provider.connect().await
    }

    /// Give a connection back. Pending work is rolled back; failures are logged, never returned.
    pub async fn release(&self, name: Option<&str>, conn: Connection) {
        let name = name.unwrap_or(DEFAULT_SOURCE_ALIAS);
        match conn.release().await {
            Ok(()) => debug!(source = name, "released connection"),
            Err(err) => warn!(source = name, error = %err, "error while releasing connection"),
        }
    }

    fn ensure_initialized(&self, state: &mut Phase) {
        if !matches!(state, Phase::Uninitialized) {
            return;
        }
        *state = match self.discover() {
            Ok(sources) => {
                if sources.by_name.is_empty() {
                    warn!("registry initialized without sources");
                }
                Phase::Ready(sources)
            }
            Err(err) => {
                error!(error = %err, "connection registry failed to initialize");
                Phase::Failed
            }
        };
    }

    fn discover(&self) -> Result<Sources, SqlHandleError> {
        let config = match &self.config {
            ConfigSource::Inline(config) => config.clone(),
            ConfigSource::File(path) => RegistryConfig::load_file(path)?,
            ConfigSource::Env => RegistryConfig::from_env()?,
        };
        let namespace: Arc<dyn Namespace> = match &self.namespace {
            NamespaceSource::Inline(ns) => Arc::clone(ns),
            NamespaceSource::File(path) => Arc::new(load_namespace_file(path)?),
            NamespaceSource::Missing => {
                return Err(SqlHandleError::NamespaceError(
                    "no namespace was configured for the registry".into(),
                ));
            }
        };

        let discovered = discovery::discover(&namespace, &config)?;
        let default_name = discovery::elect_default(&discovered, &config);
        let mut by_name = discovered.sources;
        if let Some(default) = &default_name
            && let Some(source) = by_name.get(default).cloned()
        {
            debug!(default = %default, "using default source");
            by_name.insert(DEFAULT_SOURCE_ALIAS.to_string(), source);
        }
        Ok(Sources {
            by_name,
            default_name,
        })
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("config", &self.config)
            .field("namespace", &self.namespace)
            .field("state", &*self.lock_state())
            .finish()
    }
}

/// Builder for [`ConnectionRegistry`]. Nothing is read or resolved until initialization.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistryBuilder {
    config: Option<ConfigSource>,
    namespace: Option<NamespaceSource>,
}

impl ConnectionRegistryBuilder {
    #[must_use]
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = Some(ConfigSource::Inline(config));
        self
    }

    /// Read configuration from a file at initialization; a missing file means defaults.
    #[must_use]
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(ConfigSource::File(path.into()));
        self
    }

    /// Read configuration with [`RegistryConfig::from_env`] at initialization.
    #[must_use]
    pub fn config_from_env(mut self) -> Self {
        self.config = Some(ConfigSource::Env);
        self
    }

    #[must_use]
    pub fn namespace(mut self, namespace: Arc<dyn Namespace>) -> Self {
        self.namespace = Some(NamespaceSource::Inline(namespace));
        self
    }

    /// Load the namespace from a JSON file at initialization.
    #[must_use]
    pub fn namespace_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.namespace = Some(NamespaceSource::File(path.into()));
        self
    }

    #[must_use]
    pub fn build(self) -> ConnectionRegistry {
        ConnectionRegistry {
            config: self
                .config
                .unwrap_or_else(|| ConfigSource::Inline(RegistryConfig::default())),
            namespace: self.namespace.unwrap_or(NamespaceSource::Missing),
            state: Mutex::new(Phase::Uninitialized),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ErrorKind;
    use crate::namespace::InMemoryNamespace;

    #[derive(Debug)]
    struct RefusingProvider(&'static str);

    #[async_trait]
    impl ConnectionProvider for RefusingProvider {
        fn driver_name(&self) -> &'static str {
            "fake"
        }

        async fn connect(&self) -> Result<Connection, SqlHandleError> {
            Err(SqlHandleError::ConnectionError(self.0.to_string()))
        }
    }

    fn provider(tag: &'static str) -> Arc<dyn ConnectionProvider> {
        Arc::new(RefusingProvider(tag))
    }

    fn registry(ns: InMemoryNamespace, config: RegistryConfig) -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(ns), config)
    }

    fn abc() -> InMemoryNamespace {
        InMemoryNamespace::new()
            .with_provider("env/sql/A", provider("a"))
            .with_provider("env/sql/B", provider("b"))
            .with_provider("env/sql/C", provider("c"))
    }

    #[test]
    fn first_discovered_source_is_default() {
        let reg = registry(abc(), RegistryConfig::default());
        assert!(reg.initialize());
        assert_eq!(reg.default_source_name().as_deref(), Some("A"));
        assert_eq!(reg.list_source_names(), vec!["A", "B", "C", "DEFAULT"]);
    }

    #[test]
    fn listing_names_initializes_on_demand() {
        let reg = registry(abc(), RegistryConfig::default());
        assert!(!reg.is_initialized());
        assert_eq!(reg.list_source_names(), vec!["A", "B", "C", "DEFAULT"]);
        assert!(reg.is_initialized());

        let reg = registry(abc(), RegistryConfig::default());
        assert_eq!(reg.default_source_name().as_deref(), Some("A"));
        assert!(reg.is_initialized());
    }

    #[test]
    fn configured_default_wins() {
        let reg = registry(abc(), RegistryConfig::default().with_default_data_source_name("B"));
        assert!(reg.initialize());
        assert_eq!(reg.default_source_name().as_deref(), Some("B"));
    }

    #[test]
    fn unknown_configured_default_falls_back() {
        let reg = registry(abc(), RegistryConfig::default().with_default_data_source_name("Z"));
        assert!(reg.initialize());
        assert_eq!(reg.default_source_name().as_deref(), Some("A"));
    }

    #[test]
    fn explicit_list_skips_recursive_search() {
        let ns = abc().with_provider("env/sql/nested/D", provider("d"));
        let reg = registry(
            ns,
            RegistryConfig::default().with_data_source_names("C, nested/D, missing"),
        );
        assert!(reg.initialize());
        assert_eq!(reg.list_source_names(), vec!["C", "nested/D", "DEFAULT"]);
        assert_eq!(reg.default_source_name().as_deref(), Some("C"));
    }

    #[test]
    fn recursive_search_joins_paths_and_skips_others() {
        let ns = InMemoryNamespace::new()
            .with_provider("env/sql/top", provider("t"))
            .with_other("env/sql/readme", "string")
            .with_provider("env/sql/east/orders", provider("o"))
            .with_provider("env/sql/east/archive/2019", provider("x"));
        let reg = registry(ns, RegistryConfig::default());
        assert!(reg.initialize());
        assert_eq!(
            reg.list_source_names(),
            vec!["top", "east/orders", "east/archive/2019", "DEFAULT"]
        );
    }

    #[tokio::test]
    async fn empty_namespace_reports_no_sources() {
        let ns = InMemoryNamespace::new().with_context("env/sql", InMemoryNamespace::new());
        let reg = registry(ns, RegistryConfig::default());
        assert!(reg.initialize());
        assert!(reg.is_initialized());
        let err = reg.acquire(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSourcesAvailable);
    }

    #[tokio::test]
    async fn failed_initialization_is_latched() {
        let reg = registry(InMemoryNamespace::new(), RegistryConfig::default());
        for _ in 0..3 {
            let err = reg.acquire(Some("A")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RegistryUninitialized);
        }
        assert!(reg.initialization_failed());
        assert!(!reg.initialize());
        assert!(reg.list_source_names().is_empty());
    }

    #[tokio::test]
    async fn acquire_resolves_names_and_propagates_driver_errors() {
        let reg = registry(abc(), RegistryConfig::default());
        let err = reg.acquire(Some("nope")).await.unwrap_err();
        assert!(matches!(err, SqlHandleError::UnknownSource(ref n) if n == "nope"));

        let err = reg.acquire(Some("B")).await.unwrap_err();
        assert!(matches!(err, SqlHandleError::ConnectionError(ref m) if m == "b"));

        let err = reg.acquire(None).await.unwrap_err();
        assert!(matches!(err, SqlHandleError::ConnectionError(ref m) if m == "a"));
    }

    #[test]
    fn missing_namespace_fails_initialization() {
        let reg = ConnectionRegistry::builder().build();
        assert!(!reg.initialize());
        assert!(reg.initialization_failed());
    }
}
