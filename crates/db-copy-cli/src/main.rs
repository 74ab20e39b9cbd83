//! db-copy CLI - Copy a table between SQLite and PostgreSQL.

use clap::{Parser, Subcommand};
use db_copy::{create_sample_data, CopyConfig, CopyError, CopyJob, Orchestrator, ProgressUpdate};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "db-copy")]
#[command(about = "Copy a table between SQLite and PostgreSQL databases")]
#[command(version)]
struct Cli {
    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long, global = true)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a table from source to destination database
    Copy {
        /// Path to YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Source database (SQLite path or postgres:// URI)
        #[arg(short, long, required_unless_present = "config")]
        source: Option<String>,

        /// Destination database (SQLite path or postgres:// URI)
        #[arg(short, long, required_unless_present = "config")]
        dest: Option<String>,

        /// Table name to copy
        #[arg(short, long, required_unless_present = "config")]
        table: Option<String>,

        /// Rows per insert batch [default: 1000]
        #[arg(short, long, allow_negative_numbers = true)]
        batch_size: Option<i64>,
    },

    /// Create a sample SQLite database with test data
    Sample {
        /// Path to create the sample SQLite database
        #[arg(short, long, default_value = "sample.db")]
        db: String,

        /// Number of sample records to create
        #[arg(short, long, default_value = "1000")]
        count: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), CopyError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format).map_err(CopyError::Config)?;

    match cli.command {
        Commands::Copy {
            config,
            source,
            dest,
            table,
            batch_size,
        } => {
            // Flags override the file, so validation waits until both are merged
            let mut copy_config = match &config {
                Some(path) => {
                    let loaded = CopyConfig::read_file(path)?;
                    info!("Loaded configuration from {:?}", path);
                    loaded
                }
                None => CopyConfig::default(),
            };

            // Apply overrides
            if let Some(source) = source {
                copy_config.source = source;
            }
            if let Some(dest) = dest {
                copy_config.dest = dest;
            }
            if let Some(table) = table {
                copy_config.table = table;
            }
            if let Some(size) = batch_size {
                copy_config.batch_size = size;
            }

            let job = CopyJob::try_from(copy_config)?;
            let mut orchestrator = Orchestrator::new(job).await?;

            // Enable progress reporting if requested
            let progress_task = if cli.progress {
                let (tx, rx) = mpsc::channel(16);
                orchestrator = orchestrator.with_progress(tx);
                Some(tokio::spawn(print_progress(rx)))
            } else {
                None
            };

            let outcome = orchestrator.run().await;
            if let Some(task) = progress_task {
                let _ = task.await;
            }
            let result = outcome?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nCopy completed!");
                println!("  Table: {}", result.table);
                println!("  Route: {} -> {}", result.source_dialect, result.dest_dialect);
                println!("  Rows: {}", result.rows_copied);
                println!("  Batches: {}", result.batches);
                println!("  Table created: {}", result.table_created);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
            }
        }

        Commands::Sample { db, count } => {
            let inserted = create_sample_data(&db, count).await?;

            if cli.output_json {
                let summary = serde_json::json!({
                    "db": db,
                    "table": db_copy::SAMPLE_TABLE,
                    "records": inserted,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Successfully created sample table '{}' with {} records",
                    db_copy::SAMPLE_TABLE,
                    inserted
                );
            }
        }
    }

    Ok(())
}

async fn print_progress(mut rx: mpsc::Receiver<ProgressUpdate>) {
    while let Some(update) = rx.recv().await {
        if let Ok(line) = serde_json::to_string(&update) {
            eprintln!("{}", line);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
