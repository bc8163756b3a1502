//! VLMO Ingest - dataset synchronization tool

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use url::Url;
use vlmo_common::logging::{init_logging, LogConfig, LogLevel};
use vlmo_common::types::DatasetKind;
use vlmo_ingest::report::Reporter;
use vlmo_ingest::{IngestConfig, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "vlmo-ingest")]
#[command(author, version, about = "CVM insider-trading dataset ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Fetch the published archives and merge them into the local datasets
    Sync {
        /// Restrict the run to one dataset kind (consolidated | individual)
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<DatasetKind>,

        /// Directory for the dataset files and their history
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Remote index URL
        #[arg(long)]
        base_url: Option<String>,

        /// Maximum concurrent archive fetches
        #[arg(long)]
        concurrency: Option<usize>,

        /// History slots kept per kind
        #[arg(long)]
        retention: Option<usize>,

        /// Skip TLS certificate verification
        #[arg(long)]
        accept_invalid_certs: bool,
    },
}

fn parse_kind(value: &str) -> std::result::Result<DatasetKind, String> {
    value.parse().map_err(|e| format!("{}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    log_config = log_config.with_file_prefix("vlmo-ingest");
    init_logging(&log_config)?;

    match cli.command {
        Command::Sync {
            kind,
            output,
            base_url,
            concurrency,
            retention,
            accept_invalid_certs,
        } => {
            let mut config = IngestConfig::from_env()?;
            if let Some(output) = output {
                config.datasets_dir = output;
            }
            if let Some(base_url) = base_url {
                config.base_url = Url::parse(&base_url).context("Invalid --base-url")?;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(retention) = retention {
                config.history_retention = retention;
            }
            if accept_invalid_certs {
                config.accept_invalid_certs = true;
            }
            config.validate()?;

            let reporter = Reporter::new(&config.datasets_dir);
            let pipeline = Pipeline::new(config)?;
            let summary = pipeline.run(kind).await?;

            reporter.print_report(&summary);
            reporter.record_run(&summary)?;

            if summary.has_kind_errors() {
                anyhow::bail!("One or more dataset kinds failed to commit");
            }
        },
    }

    info!("Sync complete");
    Ok(())
}
