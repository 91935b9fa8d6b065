use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use finance_etl::{
    count_accounts, count_categories, count_dangling_references, count_transactions,
    open_database, CsvExtractor, Pipeline, PipelineConfig,
};

#[derive(Parser)]
#[command(version, about = "Load bank statement rows into a normalized SQLite store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize a CSV file and load it in one transaction
    Import {
        /// File to ingest
        csv_path: PathBuf,

        /// SQLite database (created if missing)
        #[arg(long, env = "FINANCE_ETL_DB", default_value = "transactions.db")]
        db: PathBuf,

        /// JSON file with pipeline settings; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Account for rows without one
        #[arg(long)]
        default_account: Option<String>,

        /// chrono date format, repeatable, tried in order
        #[arg(long = "date-format")]
        date_formats: Vec<String>,

        /// Fact rows per INSERT statement
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Field delimiter
        #[arg(long)]
        delimiter: Option<char>,

        /// Print the run report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show table counts for an existing database
    Stats {
        #[arg(long, env = "FINANCE_ETL_DB", default_value = "transactions.db")]
        db: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Import {
            csv_path,
            db,
            config,
            default_account,
            date_formats,
            chunk_size,
            delimiter,
            json,
        } => {
            let mut settings = match config {
                Some(path) => PipelineConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if let Some(account) = default_account {
                settings = settings.with_default_account(account);
            }
            if !date_formats.is_empty() {
                settings = settings.with_date_formats(date_formats);
            }
            if let Some(size) = chunk_size {
                settings = settings.with_chunk_size(size);
            }
            if let Some(d) = delimiter {
                settings = settings.with_delimiter(d);
            }

            run_import(csv_path, db, settings, json)
        }
        Command::Stats { db } => run_stats(db),
    }
}

fn run_import(csv_path: PathBuf, db_path: PathBuf, config: PipelineConfig, json: bool) -> Result<()> {
    println!("🗄️  Import: CSV → normalize → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let extractor = CsvExtractor::new(&csv_path).with_delimiter(config.delimiter);
    let mut pipeline = Pipeline::new(config).context("Invalid pipeline config")?;

    let mut conn = open_database(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let report = pipeline
        .run(&mut conn, &extractor)
        .with_context(|| format!("Import of {} aborted, nothing was written", csv_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for rejection in &report.rejected {
            println!("⚠️  Skipped {}", rejection);
        }
        println!("\n✅ {}", report.summary());
    }

    Ok(())
}

fn run_stats(db_path: PathBuf) -> Result<()> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {} (run `finance-etl import <csv>` first)",
            db_path.display()
        );
    }

    let conn = open_database(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    println!("📊 {}", db_path.display());
    println!("✓ Accounts:     {}", count_accounts(&conn)?);
    println!("✓ Categories:   {}", count_categories(&conn)?);
    println!("✓ Transactions: {}", count_transactions(&conn)?);

    let dangling = count_dangling_references(&conn)?;
    if dangling > 0 {
        println!("❌ Dangling references: {}", dangling);
    }

    Ok(())
}
