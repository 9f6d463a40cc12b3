#![cfg(feature = "sqlite")]

mod common;

use std::error::Error;
use std::sync::Arc;

use common::single_source;
use sql_handles::prelude::*;

async fn seed(registry: &Arc<ConnectionRegistry>) -> Result<(), Box<dyn Error>> {
    let mut insert = Insert::with_sql(
        Arc::clone(registry),
        "INSERT INTO people (name, age, score) VALUES (?, ?, ?)",
    );
    let people = [
        ("ann", Some(31), 1.5),
        ("bob", None, 2.0),
        ("cy \"c\"", Some(7), 0.25),
    ];
    for (name, age, score) in people {
        insert.set_args(args![name, age, score]);
        insert.execute().await?;
        insert.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn getters_are_null_safe_and_cursor_is_forward_only() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    seed(&fixture.registry).await?;

    let mut select = Select::with_sql(
        Arc::clone(&fixture.registry),
        "SELECT name, age, score FROM people ORDER BY id",
    );

    // nothing executed yet
    assert!(!select.next());
    assert_eq!(select.get_int(1), 0);
    assert_eq!(select.get_string("name"), None);
    assert_eq!(select.column_count(), 0);

    select.execute().await?;
    assert_eq!(select.column_count(), 3);
    assert_eq!(select.column_name(2), Some("age"));
    assert_eq!(select.column_names(), vec!["name", "age", "score"]);

    // before the first next()
    assert_eq!(select.get_string(1), None);

    assert!(select.next());
    assert_eq!(select.get_string("name").as_deref(), Some("ann"));
    assert_eq!(select.get_int("AGE"), 31);
    assert_eq!(select.get_line("|"), "ann|31|1.5");

    assert!(select.next());
    assert!(select.is_null(2));
    assert_eq!(select.get_long(2), 0);
    assert!(!select.get_bool(2));
    assert_eq!(select.get_line(","), "bob,null,2");
    assert_eq!(select.get_csv_line(), "\"bob\",\"\",\"2\"");

    assert!(select.next());
    assert_eq!(select.get_csv_line(), "\"cy \"\"c\"\"\",\"7\",\"0.25\"");
    assert_eq!(select.get_int("no_such_column"), 0);
    assert_eq!(select.get_int(99), 0);

    assert!(!select.next());
    assert!(!select.next());
    assert_eq!(select.get_string(1), None);

    select.close().await;
    assert!(select.result_set().is_none());
    Ok(())
}

#[tokio::test]
async fn precached_rows_outlive_the_connection() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    seed(&fixture.registry).await?;

    let mut select = Select::with_sql(
        Arc::clone(&fixture.registry),
        "SELECT name FROM people WHERE age IS NOT NULL ORDER BY name",
    );
    select.execute_precached().await?;
    assert!(!select.is_open());
    assert!(select.connection().is_none());

    select.close().await;
    let mut names = Vec::new();
    while select.next() {
        names.extend(select.get_string(1));
    }
    assert_eq!(names, vec!["ann".to_string(), "cy \"c\"".to_string()]);

    // a new execution starts over
    select.execute().await?;
    assert!(select.next());
    select.close().await;
    Ok(())
}

fn drain_names(select: &mut Select) -> Vec<String> {
    let mut names = Vec::new();
    while select.next() {
        names.extend(select.get_string("name"));
    }
    names
}

#[tokio::test]
async fn select_reruns_after_close_with_identical_rows() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    seed(&fixture.registry).await?;

    let mut select = Select::with_sql(
        Arc::clone(&fixture.registry),
        "SELECT name FROM people ORDER BY id",
    );
    select.execute().await?;
    let first = drain_names(&mut select);
    select.close().await;

    select.execute().await?;
    assert!(select.next());
    let err = select.execute().await.expect_err("select still open");
    assert_eq!(err.kind(), ErrorKind::AlreadyOpen);
    assert_eq!(select.get_string("name").as_deref(), Some("ann"));
    select.close().await;

    select.execute().await?;
    let second = drain_names(&mut select);
    select.close().await;

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn failed_execute_drops_earlier_precached_rows() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    seed(&fixture.registry).await?;

    let mut select = Select::with_sql(Arc::clone(&fixture.registry), "SELECT name FROM people");
    select.execute_precached().await?;
    assert_eq!(select.column_count(), 1);

    select.set_sql("SELECT name FROM no_such_table");
    let err = select.execute().await.expect_err("missing table");
    assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    assert!(!select.next());
    assert_eq!(select.column_count(), 0);
    assert!(select.result_set().is_none());

    select.close().await;
    assert!(!select.next());
    Ok(())
}

#[derive(Debug, PartialEq)]
struct Person {
    name: String,
    age: i32,
}

#[tokio::test]
async fn rows_map_through_closures() -> Result<(), Box<dyn Error>> {
    let fixture = single_source().await?;
    seed(&fixture.registry).await?;

    let mut select = Select::with_sql(
        Arc::clone(&fixture.registry),
        "SELECT name, age FROM people WHERE age > ? ORDER BY age",
    )
    .with_args(args![5]);
    select.execute_precached().await?;

    let people = select.map_rows(|row: &DbRow| Person {
        name: row
            .get("name")
            .and_then(RowValues::as_text)
            .unwrap_or_default()
            .to_string(),
        age: row.get("age").and_then(RowValues::as_int).map_or(0, |v| *v as i32),
    });
    assert_eq!(
        people,
        vec![
            Person { name: "cy \"c\"".into(), age: 7 },
            Person { name: "ann".into(), age: 31 },
        ]
    );
    Ok(())
}
