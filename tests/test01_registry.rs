#![cfg(feature = "sqlite")]

mod common;

use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

use common::sqlite_provider;
use sql_handles::prelude::*;

/// Wraps a namespace and counts `list_bindings` calls per context path.
#[derive(Debug, Clone)]
struct CountingNamespace {
    path: String,
    inner: Arc<dyn Namespace>,
    walks: Arc<Mutex<HashMap<String, usize>>>,
}

impl CountingNamespace {
    fn root(inner: InMemoryNamespace) -> Self {
        Self {
            path: String::new(),
            inner: Arc::new(inner),
            walks: Arc::default(),
        }
    }

    fn child(&self, name: &str, binding: Binding) -> Binding {
        match binding {
            Binding::Context(inner) => Binding::Context(Arc::new(CountingNamespace {
                path: format!("{}/{name}", self.path),
                inner,
                walks: Arc::clone(&self.walks),
            })),
            other => other,
        }
    }

    fn walks(&self) -> HashMap<String, usize> {
        self.walks.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl Namespace for CountingNamespace {
    fn list_bindings(&self) -> Result<Vec<(String, Binding)>, SqlHandleError> {
        if let Ok(mut walks) = self.walks.lock() {
            *walks.entry(self.path.clone()).or_default() += 1;
        }
        Ok(self
            .inner
            .list_bindings()?
            .into_iter()
            .map(|(name, binding)| {
                let binding = self.child(&name, binding);
                (name, binding)
            })
            .collect())
    }

    fn lookup(&self, name: &str) -> Result<Option<Binding>, SqlHandleError> {
        Ok(self
            .inner
            .lookup(name)?
            .map(|binding| self.child(name, binding)))
    }
}

#[tokio::test]
async fn recursive_discovery_registers_slash_joined_names() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let ns = InMemoryNamespace::new()
        .with_provider("env/sql/alpha", sqlite_provider(&dir, "a.db").await?)
        .with_provider("env/sql/reports/beta", sqlite_provider(&dir, "b.db").await?)
        .with_other("env/sql/banner", "String");
    let registry = ConnectionRegistry::new(Arc::new(ns), RegistryConfig::default());

    assert!(registry.initialize());
    let names = registry.list_source_names();
    assert!(names.contains(&"alpha".to_string()));
    assert!(names.contains(&"reports/beta".to_string()));
    assert!(names.contains(&DEFAULT_SOURCE_ALIAS.to_string()));
    assert!(!names.contains(&"banner".to_string()));
    assert_eq!(registry.default_source_name().as_deref(), Some("alpha"));

    let conn = registry.acquire(Some("reports/beta")).await?;
    assert_eq!(conn.driver_name(), "sqlite");
    registry.release(Some("reports/beta"), conn).await;
    Ok(())
}

#[tokio::test]
async fn explicit_list_registers_exactly_the_listed_names() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let ns = InMemoryNamespace::new()
        .with_provider("env/sql/one", sqlite_provider(&dir, "1.db").await?)
        .with_provider("env/sql/two", sqlite_provider(&dir, "2.db").await?)
        .with_provider("env/sql/three", sqlite_provider(&dir, "3.db").await?);
    let config = RegistryConfig::default().with_data_source_names("three, one, missing");
    let registry = ConnectionRegistry::new(Arc::new(ns), config);

    // listing initializes on demand
    let names = registry.list_source_names();
    assert_eq!(names.len(), 3, "names: {names:?}");
    assert!(names.contains(&"three".to_string()));
    assert!(names.contains(&"one".to_string()));
    assert!(!names.contains(&"two".to_string()));
    assert_eq!(registry.default_source_name().as_deref(), Some("three"));

    let err = registry.acquire(Some("two")).await.expect_err("two was not listed");
    assert_eq!(err.kind(), ErrorKind::UnknownSource);
    Ok(())
}

#[tokio::test]
async fn configured_default_wins() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let ns = InMemoryNamespace::new()
        .with_provider("env/sql/one", sqlite_provider(&dir, "1.db").await?)
        .with_provider("env/sql/two", sqlite_provider(&dir, "2.db").await?);
    let config = RegistryConfig::default().with_default_data_source_name("two");
    let registry = ConnectionRegistry::new(Arc::new(ns), config);

    assert!(registry.initialize());
    assert_eq!(registry.default_source_name().as_deref(), Some("two"));
    Ok(())
}

#[tokio::test]
async fn empty_root_context_means_no_sources() -> Result<(), Box<dyn Error>> {
    let ns = InMemoryNamespace::new().with_context("env/sql", InMemoryNamespace::new());
    let registry = ConnectionRegistry::new(Arc::new(ns), RegistryConfig::default());

    assert!(registry.initialize());
    assert!(registry.list_source_names().is_empty());
    let err = registry.acquire(None).await.expect_err("no sources");
    assert_eq!(err.kind(), ErrorKind::NoSourcesAvailable);
    Ok(())
}

#[tokio::test]
async fn failed_initialization_is_latched() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let registry = ConnectionRegistry::builder()
        .namespace_file(dir.path().join("does-not-exist.json"))
        .build();

    for _ in 0..3 {
        let err = registry.acquire(None).await.expect_err("latched failure");
        assert_eq!(err.kind(), ErrorKind::RegistryUninitialized);
    }
    assert!(registry.initialization_failed());
    assert!(!registry.initialize());
    assert!(registry.list_source_names().is_empty());
    Ok(())
}

#[tokio::test]
async fn release_of_unknown_source_is_swallowed() -> Result<(), Box<dyn Error>> {
    let fixture = common::single_source().await?;
    let conn = fixture.registry.acquire(None).await?;
    fixture.registry.release(Some("nowhere"), conn).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_walks_each_context_once() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let ns = CountingNamespace::root(
        InMemoryNamespace::new()
            .with_provider("env/sql/main", sqlite_provider(&dir, "main.db").await?)
            .with_provider("env/sql/east/orders", sqlite_provider(&dir, "o.db").await?)
            .with_provider("env/sql/east/archive/old", sqlite_provider(&dir, "x.db").await?)
            .with_context("env/sql/empty", InMemoryNamespace::new()),
    );
    let registry = Arc::new(ConnectionRegistry::new(
        Arc::new(ns.clone()),
        RegistryConfig::default(),
    ));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let conn = registry.acquire(None).await?;
            registry.release(None, conn).await;
            Ok::<_, SqlHandleError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    let walks = ns.walks();
    assert_eq!(walks.len(), 4, "walks: {walks:?}");
    for context in ["/env/sql", "/env/sql/east", "/env/sql/east/archive", "/env/sql/empty"] {
        assert_eq!(walks.get(context), Some(&1), "{context} in {walks:?}");
    }
    assert_eq!(
        registry.list_source_names(),
        vec!["main", "east/orders", "east/archive/old", "DEFAULT"]
    );
    assert_eq!(ns.walks().values().sum::<usize>(), 4);
    Ok(())
}
