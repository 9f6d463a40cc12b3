#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use sql_handles::prelude::*;
use tempfile::TempDir;

/// A registry over SQLite files in a temporary directory.
pub struct Fixture {
    pub dir: TempDir,
    pub registry: Arc<ConnectionRegistry>,
}

pub async fn sqlite_provider(
    dir: &TempDir,
    file: &str,
) -> Result<Arc<dyn ConnectionProvider>, SqlHandleError> {
    let path = dir.path().join(file).to_string_lossy().into_owned();
    let provider = SqliteOptions::builder(path).pool_size(4).build().await?;
    Ok(Arc::new(provider))
}

/// One source, `env/sql/main`, with a `people` table.
pub async fn single_source() -> Result<Fixture, Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let provider = sqlite_provider(&dir, "main.db").await?;
    let ns = InMemoryNamespace::new().with_provider("env/sql/main", provider);
    let registry = Arc::new(ConnectionRegistry::new(
        Arc::new(ns),
        RegistryConfig::default(),
    ));

    let conn = registry.acquire(None).await?;
    conn.execute_batch(
        "CREATE TABLE people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            age INTEGER,
            score REAL,
            joined TEXT
        );
        CREATE TABLE tags (label TEXT);",
    )
    .await?;
    registry.release(None, conn).await;

    Ok(Fixture { dir, registry })
}

pub async fn count_rows(
    registry: &Arc<ConnectionRegistry>,
    table: &str,
) -> Result<i64, SqlHandleError> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let mut select = Select::with_sql(Arc::clone(registry), sql);
    select.execute_precached().await?;
    select.next();
    Ok(select.get_long(1))
}
