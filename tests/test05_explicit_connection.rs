#![cfg(feature = "sqlite")]

mod common;

use std::error::Error;
use std::sync::Arc;

use common::{count_rows, single_source};
use sql_handles::prelude::*;

#[tokio::test]
async fn caller_owned_transaction_can_be_rolled_back() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    let registry = &fixture.registry;

    let conn = registry.acquire(None).await?;
    conn.begin().await?;
    assert!(!conn.is_auto_commit().await?);

    let mut insert = Insert::with_sql(
        Arc::clone(registry),
        "INSERT INTO people (name) VALUES (?)",
    )
    .with_connection(conn.clone());
    assert!(insert.using_explicit_connection());

    for name in ["tx-1", "tx-2"] {
        insert.set_args(args![name]);
        insert.execute().await?;
        assert_eq!(insert.row_count(), 1);
        insert.close().await;
        // close neither commits nor releases a caller's connection
        assert!(insert.connection().is_some_and(|c| c.same_as(&conn)));
        assert!(!conn.is_auto_commit().await?);
    }

    let mut update = Update::with_sql(Arc::clone(registry), "UPDATE people SET age = ?")
        .with_connection(conn.clone())
        .with_args(args![40]);
    update.execute().await?;
    assert_eq!(update.row_count(), 2);
    update.close().await;
    assert!(update.connection().is_some_and(|c| c.same_as(&conn)));

    let mut inside = Select::with_sql(Arc::clone(registry), "SELECT COUNT(*) FROM people")
        .with_connection(conn.clone());
    inside.execute().await?;
    inside.next();
    assert_eq!(inside.get_long(1), 2);
    inside.close().await;

    conn.rollback().await?;
    assert!(conn.is_auto_commit().await?);
    registry.release(None, conn).await;

    assert_eq!(count_rows(registry, "people").await?, 0);
    Ok(())
}

#[tokio::test]
async fn caller_owned_transaction_can_be_committed() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    let registry = &fixture.registry;

    let conn = registry.acquire(None).await?;
    conn.begin().await?;
    let mut insert = Insert::with_sql(
        Arc::clone(registry),
        "INSERT INTO tags (label) VALUES (?)",
    )
    .with_connection(conn.clone())
    .with_args(args!["kept"]);
    insert.execute().await?;
    insert.close().await;
    conn.commit().await?;
    registry.release(None, conn).await;

    assert_eq!(count_rows(registry, "tags").await?, 1);
    Ok(())
}

#[tokio::test]
async fn switching_back_to_registry_connections() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    let registry = &fixture.registry;
    let conn = registry.acquire(None).await?;

    let mut update = Update::with_sql(Arc::clone(registry), "DELETE FROM tags")
        .with_connection(conn.clone());
    update.set_connection(None);
    assert!(!update.using_explicit_connection());
    assert!(update.connection().is_none());

    update.execute().await?;
    assert!(update.connection().is_some_and(|c| !c.same_as(&conn)));
    update.close().await;
    assert!(update.connection().is_none());
    registry.release(None, conn).await;
    Ok(())
}
