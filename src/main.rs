// ABOUTME: Command-line entry point for diffbridge
// ABOUTME: Resolves connections, submits comparisons and prints results as JSON on stdout

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use diffbridge::comparison::{Algorithm, SchemaSubmission};
use diffbridge::{
    AppConfig, ComparisonSide, ConnectionConfigResolver, ConnectionDescriptor, DiffBridge,
    FetchOutcome, TableComparisonOptions,
};

#[derive(Parser)]
#[command(name = "diffbridge")]
#[command(about = "Submit and track cross-database data comparisons", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend base URL (overrides config and DIFFBRIDGE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical backend config for a connection URL or JSON object
    Resolve { connection: String },
    /// Ask the backend to open a connection
    TestConnection { connection: String },
    /// List tables visible through a connection
    ListTables {
        connection: String,
        #[arg(long)]
        schema: Option<String>,
    },
    /// Run a query through the backend
    Query { connection: String, sql: String },
    /// Submit a table comparison
    CompareTables {
        source: String,
        target: String,
        #[arg(long)]
        source_table: String,
        #[arg(long)]
        target_table: Option<String>,
        /// Key column; repeat for composite keys
        #[arg(long = "key")]
        keys: Vec<String>,
        /// Column to compare; repeat to restrict the comparison
        #[arg(long = "column")]
        columns: Vec<String>,
        #[arg(long = "where")]
        where_condition: Option<String>,
        /// auto, hashdiff or joindiff
        #[arg(long)]
        algorithm: Option<String>,
        /// JSON file with full comparison options
        #[arg(long)]
        options: Option<PathBuf>,
        /// Block until the comparison finishes
        #[arg(long)]
        wait: bool,
    },
    /// Compare the full catalogs behind two connections
    CompareSchemas {
        source: String,
        target: String,
        /// Add a severity-tagged summary to the output
        #[arg(long)]
        summarize: bool,
    },
    /// Fetch the result of a submitted comparison
    Result {
        id: String,
        #[arg(long)]
        wait: bool,
        #[arg(long)]
        max_wait_secs: Option<u64>,
    },
    /// Summarize a schema comparison result stored in a JSON file
    Summarize { file: PathBuf },
    /// Recover connection and table from an upstream payload JSON file
    Extract { file: PathBuf },
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A connection argument is either a URL or an inline JSON object.
fn connection_arg(resolver: &ConnectionConfigResolver, raw: &str) -> Result<ConnectionDescriptor> {
    let input = if raw.trim_start().starts_with('{') {
        serde_json::from_str(raw).context("Connection argument is not valid JSON")?
    } else {
        Value::String(raw.to_string())
    };
    Ok(resolver.parse(&input)?)
}

fn fetch_to_json(outcome: FetchOutcome) -> Value {
    match outcome {
        FetchOutcome::Completed(done) => json!({"status": "completed", "outcome": done}),
        FetchOutcome::Pending(status) => json!({"status": status}),
        FetchOutcome::Failed { message } => json!({"status": "failed", "error": message}),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.override_api_url(cli.api_url.as_deref());
    let bridge = DiffBridge::from_config(&config)?;
    let resolver = bridge.resolver();

    match cli.command {
        Commands::Resolve { connection } => {
            let descriptor = connection_arg(resolver, &connection)?;
            let canonical = resolver.to_canonical(&descriptor)?;
            print_json(&json!({
                "canonical": canonical,
                "connection": descriptor.to_string(),
            }))?;
        }
        Commands::TestConnection { connection } => {
            let descriptor = connection_arg(resolver, &connection)?;
            let outcome = bridge.backend().test_connection(&descriptor).await?;
            print_json(&outcome)?;
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Commands::ListTables { connection, schema } => {
            let descriptor = connection_arg(resolver, &connection)?;
            let tables = bridge.backend().list_tables(&descriptor, schema.as_deref()).await?;
            print_json(&tables)?;
        }
        Commands::Query { connection, sql } => {
            let descriptor = connection_arg(resolver, &connection)?;
            print_json(&bridge.backend().execute_query(&descriptor, &sql).await?)?;
        }
        Commands::CompareTables {
            source,
            target,
            source_table,
            target_table,
            keys,
            columns,
            where_condition,
            algorithm,
            options,
            wait,
        } => {
            let mut opts: TableComparisonOptions = match options {
                Some(path) => serde_json::from_value(read_json(&path)?)
                    .with_context(|| format!("{} does not hold comparison options", path.display()))?,
                None => TableComparisonOptions::default(),
            };
            if !keys.is_empty() {
                opts.key_columns = Some(keys);
            }
            if !columns.is_empty() {
                opts.columns = columns;
            }
            if where_condition.is_some() {
                opts.where_condition = where_condition;
            }
            if let Some(name) = algorithm {
                let parsed: Algorithm = serde_json::from_value(Value::String(name.clone()))
                    .with_context(|| format!("Unknown algorithm '{}'", name))?;
                opts.algorithm = parsed;
            }

            let target_table = target_table.unwrap_or_else(|| source_table.clone());
            let source = ComparisonSide::new(connection_arg(resolver, &source)?, source_table);
            let target = ComparisonSide::new(connection_arg(resolver, &target)?, target_table);
            let handle = bridge.jobs().submit_table_comparison(&source, &target, &opts).await?;

            if wait {
                print_json(&bridge.wait_for(&handle.id).await?)?;
            } else {
                print_json(&handle)?;
            }
        }
        Commands::CompareSchemas {
            source,
            target,
            summarize,
        } => {
            let source = connection_arg(resolver, &source)?;
            let target = connection_arg(resolver, &target)?;
            let outcome = match bridge.jobs().submit_schema_comparison(&source, &target).await? {
                SchemaSubmission::Completed(outcome) => outcome,
                SchemaSubmission::Queued(handle) => bridge.wait_for(&handle.id).await?,
            };
            match (&outcome.result, summarize) {
                (diffbridge::ComparisonResult::Schema(schema), true) => {
                    let summary = bridge.summarizer().summarize(schema);
                    print_json(&json!({"outcome": outcome, "summary": summary}))?;
                }
                _ => print_json(&outcome)?,
            }
        }
        Commands::Result {
            id,
            wait,
            max_wait_secs,
        } => {
            if wait {
                let outcome = match max_wait_secs {
                    Some(secs) => {
                        bridge
                            .retriever()
                            .await_completion(&id, Duration::from_secs(secs), config.polling.poll_interval())
                            .await?
                    }
                    None => bridge.wait_for(&id).await?,
                };
                print_json(&outcome)?;
            } else {
                print_json(&fetch_to_json(bridge.retriever().fetch_once(&id).await?))?;
            }
        }
        Commands::Summarize { file } => {
            let raw = read_json(&file)?;
            let raw = raw.get("result").cloned().unwrap_or(raw);
            print_json(&bridge.summarizer().summarize_raw(&raw)?)?;
        }
        Commands::Extract { file } => {
            let payload = read_json(&file)?;
            let extraction = match &payload {
                Value::Array(items) => bridge.extractor().extract_items(items)?,
                other => bridge.extractor().extract(other)?,
            };
            if !extraction.is_resolved() {
                bail!("No connection could be recovered from {}", file.display());
            }
            print_json(&json!({
                "dialect": extraction.descriptor.dialect_tag(),
                "connection": extraction.descriptor.to_string(),
                "connection_rule": extraction.connection_rule.map(|rule| format!("{:?}", rule)),
                "table": extraction.table,
                "table_rule": extraction.table_rule.map(|rule| format!("{:?}", rule)),
                "tables": extraction.tables,
            }))?;
        }
    }

    Ok(())
}
