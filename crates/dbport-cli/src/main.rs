//! dbport CLI - SQL dialect translation and database conversion scripts.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dbport::config::GenerateMode;
use dbport::core::DatabaseType;
use dbport::{
    Config, ConversionResult, ConvertError, Converter, ObjectNameMode, StatementTranslator,
    TranslateOptions,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "dbport")]
#[command(about = "Translate SQL definitions between dialects and generate conversion scripts")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one SQL definition from one dialect to another
    Translate {
        /// Source dialect (sqlserver, mysql, oracle, postgres, sqlite)
        #[arg(long)]
        source: DatabaseType,

        /// Target dialect
        #[arg(long)]
        target: DatabaseType,

        /// File holding the definition (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Quote every identifier in the output
        #[arg(long)]
        quote_names: bool,

        /// Owner qualifier to rewrite
        #[arg(long)]
        source_owner: Option<String>,

        /// Replacement for --source-owner (dropped when omitted)
        #[arg(long, requires = "source_owner")]
        target_owner: Option<String>,

        /// Also print the target data types written by the translation
        #[arg(long)]
        show_types: bool,
    },

    /// Generate schema and/or data scripts from the configured source
    Generate {
        /// What to generate (overrides options.generate_mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Folder for script files (overrides options.output_folder)
        #[arg(long)]
        output_folder: Option<PathBuf>,
    },

    /// Test database connections
    HealthCheck,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Schema,
    Data,
    Both,
}

impl From<ModeArg> for GenerateMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Schema => GenerateMode::Schema,
            ModeArg::Data => GenerateMode::Data,
            ModeArg::Both => GenerateMode::Both,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ConvertError>() {
            Some(err) => {
                eprintln!("{}", err.format_detailed());
                ExitCode::from(err.exit_code())
            }
            None => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    match cli.command {
        Commands::Translate {
            source,
            target,
            input,
            quote_names,
            source_owner,
            target_owner,
            show_types,
        } => {
            let definition = read_input(input.as_ref())?;
            let translator = StatementTranslator::new(source, target)?.with_options(
                TranslateOptions {
                    name_mode: if quote_names {
                        ObjectNameMode::WithQuotation
                    } else {
                        ObjectNameMode::WithoutQuotation
                    },
                    source_owner,
                    target_owner,
                },
            );
            let translation = translator.translate(&definition);

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&translation)?);
            } else {
                println!("{}", translation.text);
                if show_types && !translation.data_types.is_empty() {
                    let types: Vec<&str> =
                        translation.data_types.iter().map(String::as_str).collect();
                    eprintln!("Data types: {}", types.join(", "));
                }
            }
        }

        Commands::Generate {
            mode,
            output_folder,
        } => {
            let mut config = Config::load(&cli.config)?;
            info!("Loaded configuration from {:?}", cli.config);
            if let Some(mode) = mode {
                config.options.generate_mode = mode.into();
            }
            if let Some(folder) = output_folder {
                config.options.output_folder = folder;
            }
            config.validate()?;

            let cancel_token = setup_signal_handler();
            let result = Converter::new(config)
                .with_cancel(cancel_token)
                .run()
                .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }

            match result.status.as_str() {
                "cancelled" => return Err(ConvertError::Cancelled.into()),
                "completed_with_errors" => {
                    anyhow::bail!("conversion finished with errors; see the log for details")
                }
                _ => {}
            }
        }

        Commands::HealthCheck => {
            let config = Config::load(&cli.config)?;
            let result = Converter::new(config).health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source: {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                if result.target_configured {
                    println!(
                        "  Target: {} ({}ms)",
                        if result.target_connected { "OK" } else { "FAILED" },
                        result.target_latency_ms
                    );
                    if let Some(ref err) = result.target_error {
                        println!("    Error: {}", err);
                    }
                } else {
                    println!("  Target: not configured");
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(ConvertError::connection("health check", "a connection failed").into());
            }
        }
    }

    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading definition from {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading definition from stdin")?;
            Ok(text)
        }
    }
}

fn print_summary(result: &ConversionResult) {
    let headline = match result.status.as_str() {
        "cancelled" => "Conversion cancelled.",
        "completed_with_errors" => "Conversion finished with errors.",
        _ => "Conversion completed!",
    };
    println!("\n{}", headline);
    println!("  Run ID: {}", result.run_id);
    println!("  Database: {}", result.database);
    println!("  Objects fetched: {}", result.objects_fetched);
    println!("  Schema statements: {}", result.schema_statements);
    if let Some(data) = &result.data {
        println!("  Rows transferred: {}", data.rows_transferred);
        println!("  Batches: {}", data.batches);
        if !data.skipped_tables.is_empty() {
            println!("  Skipped tables: {}", data.skipped_tables.join(", "));
        }
        if !data.failed_tables.is_empty() {
            println!("  Failed tables: {}", data.failed_tables.join(", "));
        }
        if data.unreachable_rows > 0 {
            println!("  Unreachable rows: {}", data.unreachable_rows);
        }
    }
    if let Some(path) = &result.schema_file {
        println!("  Schema script: {}", path.display());
    }
    if let Some(path) = &result.data_file {
        println!("  Data script: {}", path.display());
    }
    if result.target_statements > 0 {
        println!("  Statements executed on target: {}", result.target_statements);
    }
    println!("  Duration: {:.2}s", result.duration_seconds);
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries translated text and JSON results.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for kind in [SignalKind::interrupt(), SignalKind::terminate()] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived shutdown signal. Stopping after the current batch...");
                    token.cancel();
                }
                Err(e) => eprintln!("Failed to install signal handler: {}", e),
            }
        });
    }

    cancel_token
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current batch...");
            token.cancel();
        }
    });

    cancel_token
}
