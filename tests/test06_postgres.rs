#![cfg(feature = "postgres")]

//! Runs against the server named by `SQL_HANDLES_PG_URL`; skipped when it is unset.

use std::error::Error;
use std::sync::Arc;

use sql_handles::prelude::*;

async fn registry() -> Result<Option<Arc<ConnectionRegistry>>, Box<dyn Error>> {
    let Ok(url) = std::env::var("SQL_HANDLES_PG_URL") else {
        eprintln!("SQL_HANDLES_PG_URL not set; skipping postgres test");
        return Ok(None);
    };
    let provider = PostgresProvider::new(&PostgresOptions::new(url).with_pool_size(2)).await?;
    let ns = InMemoryNamespace::new().with_provider("env/sql/pg", Arc::new(provider));
    Ok(Some(Arc::new(ConnectionRegistry::new(
        Arc::new(ns),
        RegistryConfig::default(),
    ))))
}

#[tokio::test]
async fn statements_run_with_question_mark_placeholders() -> Result<(), Box<dyn Error>> {
    let Some(registry) = registry().await? else {
        return Ok(());
    };
    let conn = registry.acquire(None).await?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS sqlh_people;
         CREATE TABLE sqlh_people (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, age INT4);",
    )
    .await?;
    registry.release(None, conn).await;

    let mut insert = Insert::with_sql(
        Arc::clone(&registry),
        "INSERT INTO sqlh_people (name, age) VALUES (?, ?) RETURNING id",
    )
    .with_args(args!["ada", 36]);
    insert.execute().await?;
    assert_eq!(insert.row_count(), 1);
    assert!(insert.generated_key() > 0);
    insert.close().await;

    let mut update = Update::with_sql(
        Arc::clone(&registry),
        "UPDATE sqlh_people SET age = ? WHERE name = ? AND name <> '?'",
    )
    .with_args(args![37, "ada"]);
    update.execute().await?;
    assert_eq!(update.row_count(), 1);
    update.close().await;

    let mut select = Select::with_sql(
        Arc::clone(&registry),
        "SELECT name, age FROM sqlh_people WHERE id > ?",
    )
    .with_args(args![0]);
    select.execute_precached().await?;
    assert!(select.next());
    assert_eq!(select.get_string("name").as_deref(), Some("ada"));
    assert_eq!(select.get_int("age"), 37);
    Ok(())
}

#[tokio::test]
async fn procedure_inout_is_doubled() -> Result<(), Box<dyn Error>> {
    let Some(registry) = registry().await? else {
        return Ok(());
    };
    let conn = registry.acquire(None).await?;
    conn.execute_batch(
        "CREATE OR REPLACE PROCEDURE sqlh_double(INOUT n INT4)
         LANGUAGE plpgsql AS $$ BEGIN n := n * 2; END $$;",
    )
    .await?;
    registry.release(None, conn).await;

    let value = InOutParam::new(SqlType::Integer, 5);
    let mut call = StoredProcedure::with_sql(Arc::clone(&registry), "CALL sqlh_double(?)")
        .with_args(args![&value]);
    call.execute().await?;
    assert_eq!(value.get_int(), 10);
    call.close().await;
    Ok(())
}

#[tokio::test]
async fn explicit_connection_rollback() -> Result<(), Box<dyn Error>> {
    let Some(registry) = registry().await? else {
        return Ok(());
    };
    let conn = registry.acquire(None).await?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS sqlh_tx; CREATE TABLE sqlh_tx (v INT8);",
    )
    .await?;
    conn.begin().await?;
    let mut insert = Insert::with_sql(Arc::clone(&registry), "INSERT INTO sqlh_tx VALUES (?)")
        .with_connection(conn.clone());
    for v in [1_i64, 2] {
        insert.set_args(args![v]);
        insert.execute().await?;
        insert.close().await;
    }
    conn.rollback().await?;
    registry.release(None, conn).await;

    let mut count = Select::with_sql(Arc::clone(&registry), "SELECT COUNT(*) FROM sqlh_tx");
    count.execute_precached().await?;
    count.next();
    assert_eq!(count.get_long(1), 0);
    Ok(())
}
