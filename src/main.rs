use anyhow::{Context, Result};
use clap::Parser;
use nl2sql::config::PipelineConfig;
use nl2sql::pipeline::{Pipeline, PipelineResult};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const PREVIEW_ROWS: usize = 10;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Answer natural-language questions with SQL against a SQLite database")]
struct Args {
    /// Question to answer; omit for interactive mode
    question: Option<String>,

    /// SQLite database file (or set NL2SQL_DATABASE)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Model name served by Ollama (or set NL2SQL_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama base URL (or set OLLAMA_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Refinement rounds before giving up
    #[arg(long)]
    max_refinements: Option<u32>,

    /// Row cap for queries without their own LIMIT
    #[arg(long)]
    row_limit: Option<usize>,

    /// Print the full result record as JSON
    #[arg(long)]
    json: bool,

    /// Check connectivity and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env).init();

    let args = Args::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(n) = args.max_refinements {
        config.max_refinement_attempts = n;
    }
    if let Some(n) = args.row_limit {
        config.row_limit = n;
    }

    let pipeline = Pipeline::from_config(config)?;

    let report = pipeline.test_connectivity().await;
    println!("Model:    {:?}", report.model);
    println!("Database: {:?}", report.storage);
    // Also the exit status of --check.
    report
        .ensure_ready(&pipeline.config().model)
        .context("backend not ready; start Ollama and pull the model first")?;
    if args.check {
        return Ok(());
    }

    match args.question {
        Some(question) => {
            let result = pipeline.query(&question).await;
            print_result(&result, args.json)?;
        }
        None => interactive(&pipeline, args.json).await?,
    }

    Ok(())
}

async fn interactive(pipeline: &Pipeline, json: bool) -> Result<()> {
    println!("Ask a question, or: schema | tables | sample <table> | refresh | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nquestion> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "schema" => println!("{}", pipeline.snapshot().schema_text),
            "tables" => {
                for name in pipeline.snapshot().table_names() {
                    println!("  {}", name);
                }
            }
            "refresh" => match pipeline.refresh_catalog() {
                Ok(snapshot) => println!("Catalog reloaded: {} tables", snapshot.tables.len()),
                Err(e) => error!("Refresh failed: {}", e),
            },
            lower if lower.starts_with("sample ") => {
                let table = input["sample ".len()..].trim();
                match pipeline.catalog().sample_rows(table, 5) {
                    Ok(rows) => print_rows(&rows),
                    Err(e) => println!("{}", e),
                }
            }
            _ => {
                let result = pipeline.query(input).await;
                print_result(&result, json)?;
            }
        }
    }

    info!("Goodbye");
    Ok(())
}

fn print_result(result: &PipelineResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("\nFinal SQL:");
    println!("{}", result.final_sql.as_deref().unwrap_or("None"));
    println!("\nStatus: {:?}", result.status);
    println!("Refinements: {}", result.refinements);
    if let Some(error) = &result.error {
        println!("Error: {}", error);
    }

    if let Some(execution) = result.execution_result.as_ref().filter(|e| e.success) {
        println!("\nResults ({} rows):", execution.row_count);
        print_rows(&execution.rows);
    }
    Ok(())
}

fn print_rows(rows: &[nl2sql::execution::Row]) {
    let Some(first) = rows.first() else {
        println!("  (no rows)");
        return;
    };

    let headers: Vec<&String> = first.keys().collect();
    let header_line = headers
        .iter()
        .map(|h| h.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
    println!("  {}", header_line);
    println!("  {}", "-".repeat(header_line.len()));

    for row in rows.iter().take(PREVIEW_ROWS) {
        let values: Vec<String> = headers
            .iter()
            .map(|h| match row.get(h.as_str()) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => "NULL".to_string(),
                Some(other) => other.to_string(),
            })
            .collect();
        println!("  {}", values.join(" | "));
    }
    if rows.len() > PREVIEW_ROWS {
        println!("  ... and {} more rows", rows.len() - PREVIEW_ROWS);
    }
}
