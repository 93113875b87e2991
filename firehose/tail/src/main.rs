//! Firehose Tail
//!
//! Connects to a streaming endpoint and prints every record as one JSON line
//! on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Keyword filter
//! firehose-tail --username alice --password secret track golang rust
//!
//! # User-id filter, credentials from the environment
//! FIREHOSE_USERNAME=alice FIREHOSE_PASSWORD=secret firehose-tail follow 12 3456
//!
//! # Unfiltered sample against a local endpoint, with verbose logging
//! RUST_LOG=debug FIREHOSE_BASE_URL=http://127.0.0.1:8080 firehose-tail sample
//! ```
//!
//! # Environment Variables
//!
//! - `FIREHOSE_USERNAME`, `FIREHOSE_PASSWORD`: credentials
//! - `FIREHOSE_CONFIG`: TOML config file (same as `--config`)
//! - `FIREHOSE_*`: endpoint and timing overrides, see `StreamConfig::from_env`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! - SIGINT: close the stream and exit

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use firehose_core::{Credentials, StreamClient, StreamConfig};

#[derive(Debug, Parser)]
#[command(name = "firehose-tail", version, about = "Print records from a streaming endpoint")]
struct Cli {
    /// Account username
    #[arg(long, env = "FIREHOSE_USERNAME", default_value = "")]
    username: String,

    /// Account password
    #[arg(long, env = "FIREHOSE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// TOML configuration file; environment variables are used when absent
    #[arg(long, env = "FIREHOSE_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after this many records
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    limit: Option<u64>,

    #[command(subcommand)]
    filter: Filter,
}

#[derive(Debug, Subcommand)]
enum Filter {
    /// Statuses from these user ids
    Follow {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Statuses matching any of these keywords
    Track {
        #[arg(required = true)]
        topics: Vec<String>,
    },
    /// Unfiltered sample
    Sample,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<StreamConfig> {
    match path {
        Some(path) => StreamConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(StreamConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("firehose_tail=info".parse()?)
                .add_directive("firehose_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let (client, mut records) = StreamClient::<serde_json::Value>::with_config(
        Credentials::new(cli.username, cli.password),
        config,
    );

    match &cli.filter {
        Filter::Follow { ids } => client.follow(ids.as_slice()).await,
        Filter::Track { topics } => client.track(topics.as_slice()).await,
        Filter::Sample => client.sample().await,
    }
    .context("Failed to open stream")?;

    info!(filter = ?cli.filter, "Streaming; press Ctrl-C to stop");

    let mut stdout = std::io::stdout().lock();
    let mut printed = 0u64;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            record = records.recv() => {
                let Some(record) = record else { break };
                serde_json::to_writer(&mut stdout, &record)?;
                stdout.write_all(b"\n")?;
                stdout.flush()?;

                printed += 1;
                if cli.limit.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    client.shutdown().await;
    info!(records = printed, stats = ?client.stats(), "Stream closed");
    Ok(())
}
