//! sqlite-pg-migrate CLI - one-shot SQLite to PostgreSQL data copy.

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::config::EXAMPLE_CONFIG;
use sqlite_pg_migrate::{
    health_check, Config, CountStatus, MigrateError, MigrationResult, Migrator, TableOutcome,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Copy a SQLite database into an existing PostgreSQL schema")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Truncate and reload every configured table
    Run {
        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Override rows per INSERT statement
        #[arg(long)]
        batch_size: Option<usize>,

        /// Dry run: show the column plan without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,

    /// Write an annotated starting configuration file
    Init {
        /// Output path for configuration file [default: config.yaml]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
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

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Handle init command separately (doesn't need existing config)
    if let Commands::Init { output, force } = cli.command {
        let path = output.unwrap_or_else(|| PathBuf::from("config.yaml"));
        if path.exists() && !force {
            return Err(MigrateError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        std::fs::write(&path, EXAMPLE_CONFIG)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Init { .. } => unreachable!(), // Handled above
        Commands::Run {
            target_schema,
            batch_size,
            dry_run,
        } => {
            // Apply overrides
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            config.validate()?;

            let migrator = Migrator::connect(config).await?;
            let result = migrator.run(dry_run).await;
            migrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result, dry_run);
            }
        }

        Commands::Validate => {
            let migrator = Migrator::connect(config).await?;
            let report = migrator.validate().await;
            migrator.close().await;
            let report = report?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Row counts:");
                for t in &report.tables {
                    let target = t
                        .target_rows
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "missing".to_string());
                    let status = match t.status() {
                        CountStatus::Match => "OK",
                        CountStatus::Mismatch => "MISMATCH",
                        CountStatus::MissingTarget => "MISSING",
                        CountStatus::Unchecked => "-",
                    };
                    println!(
                        "  {:<24} source={:<10} target={:<10} {}",
                        t.table,
                        t.source_rows.unwrap_or_default(),
                        target,
                        status
                    );
                }
                if report.is_consistent() {
                    println!("\nValidation completed successfully");
                } else {
                    println!("\n{} table(s) differ", report.mismatches().len());
                }
            }
        }

        Commands::HealthCheck => {
            let result = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "health check failed",
                    config.target.display_address(),
                ));
            }
        }
    }

    Ok(())
}

fn print_summary(result: &MigrationResult, dry_run: bool) {
    let status_msg = if dry_run { "Dry run completed!" } else { "Migration completed!" };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);

    for t in &result.tables {
        let outcome = match t.outcome {
            TableOutcome::Migrated => format!("{} rows", t.rows),
            TableOutcome::Planned => format!("{} rows (planned)", t.rows),
            TableOutcome::SkippedEmpty => "skipped (no data)".to_string(),
            TableOutcome::SkippedMissing => "skipped (not in destination)".to_string(),
        };
        println!("  {:<24} {}", t.table, outcome);
    }

    if dry_run {
        return;
    }

    println!(
        "  Tables: {} migrated, {} skipped",
        result.tables_migrated, result.tables_skipped
    );
    println!("  Rows: {}", result.rows_transferred);
    println!("  Throughput: {} rows/sec", result.rows_per_second);

    let warnings: Vec<_> = result
        .sequences
        .iter()
        .filter_map(|s| s.warning.as_ref().map(|w| (&s.table, w)))
        .collect();
    if !warnings.is_empty() {
        println!("  Sequence warnings:");
        for (table, warning) in warnings {
            println!("    {}: {}", table, warning);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --verbosity when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
