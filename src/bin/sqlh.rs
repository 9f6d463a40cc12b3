//! `sqlh`: list the sources a registry discovers and run single statements against them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use sql_handles::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Select,
    Update,
    Insert,
    Call,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run statements against named SQL sources")]
struct Cli {
    /// Registry configuration file (JSON or properties). Defaults to the environment.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON namespace file describing the connection sources.
    #[arg(long, default_value = "sql-handles-namespace.json")]
    namespace: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List discovered source names; the default source is marked with `*`.
    Sources,
    /// Execute one statement and print its rows or counts.
    Exec {
        /// Source name; the default source when omitted.
        #[arg(long)]
        source: Option<String>,
        #[arg(long, value_enum, default_value = "select")]
        kind: Kind,
        /// Print rows as CSV instead of delimited text.
        #[arg(long)]
        csv: bool,
        #[arg(long, default_value = "|")]
        delimiter: String,
        sql: String,
        /// Positional `?` arguments. `null` binds NULL; numbers bind as numbers.
        args: Vec<String>,
    },
}

fn parse_arg(raw: &str) -> Arg {
    if raw.eq_ignore_ascii_case("null") {
        Arg::Value(RowValues::Null)
    } else if let Ok(i) = raw.parse::<i64>() {
        Arg::from(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Arg::from(f)
    } else {
        Arg::from(raw)
    }
}

fn print_rows<C: ResultCursor>(cursor: &mut C, csv: bool, delimiter: &str) {
    let names = cursor.column_names();
    if !names.is_empty() {
        println!("{}", names.join(if csv { "," } else { delimiter }));
    }
    while cursor.next() {
        if csv {
            println!("{}", cursor.get_csv_line());
        } else {
            println!("{}", cursor.get_line(delimiter));
        }
    }
}

async fn run(cli: Cli) -> Result<(), SqlHandleError> {
    let builder = ConnectionRegistry::builder().namespace_file(cli.namespace);
    let builder = match cli.config {
        Some(path) => builder.config_file(path),
        None => builder.config_from_env(),
    };
    let registry = Arc::new(builder.build());
    if !registry.initialize() {
        return Err(SqlHandleError::RegistryUninitialized);
    }

    match cli.command {
        Command::Sources => {
            let default = registry.default_source_name();
            for name in registry.list_source_names() {
                let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        Command::Exec {
            source,
            kind,
            csv,
            delimiter,
            sql,
            args,
        } => {
            let args: Vec<Arg> = args.iter().map(|a| parse_arg(a)).collect();
            match kind {
                Kind::Select => {
                    let mut select = Select::with_sql(Arc::clone(&registry), sql).with_args(args);
                    select.set_source_name(source.as_deref());
                    select.execute_precached().await?;
                    print_rows(&mut select, csv, &delimiter);
                }
                Kind::Update => {
                    let mut update = Update::with_sql(Arc::clone(&registry), sql).with_args(args);
                    update.set_source_name(source.as_deref());
                    let result = update.execute().await.map(|u| u.row_count());
                    update.close().await;
                    println!("rows affected: {}", result?);
                }
                Kind::Insert => {
                    let mut insert = Insert::with_sql(Arc::clone(&registry), sql).with_args(args);
                    insert.set_source_name(source.as_deref());
                    let result = insert
                        .execute()
                        .await
                        .map(|i| (i.row_count(), i.generated_key()));
                    insert.close().await;
                    let (rows, key) = result?;
                    println!("rows affected: {rows}, generated key: {key}");
                }
                Kind::Call => {
                    let mut call =
                        StoredProcedure::with_sql(Arc::clone(&registry), sql).with_args(args);
                    call.set_source_name(source.as_deref());
                    let result = call.execute().await.map(|_| ());
                    if result.is_ok() {
                        if call.has_result_set() {
                            print_rows(&mut call, csv, &delimiter);
                        } else {
                            println!("update count: {}", call.update_count());
                        }
                    }
                    call.close().await;
                    result?;
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sqlh: {err}");
            if let SqlHandleError::ExecutionFailed(_) = &err {
                eprintln!("  caused by: {}", err.root_cause());
            }
            ExitCode::FAILURE
        }
    }
}
