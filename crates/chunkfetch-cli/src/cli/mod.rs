//! CLI for the chunkfetch range downloader.

mod commands;

use anyhow::Result;
use chunkfetch_core::config::{self, FailureMode, FetchConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_get, run_plan, run_probe};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "chunkfetch")]
#[command(about = "Parallel HTTP range downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL in parallel byte ranges.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        /// Output file (default: last URL path segment in the current directory).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Print every event as a JSON line instead of a progress line.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Show the content length and range support a server reports.
    Probe {
        /// Direct HTTP/HTTPS URL to probe.
        url: String,
    },

    /// Print the range plan for a content length.
    Plan {
        /// Content length in bytes.
        #[arg(long, value_name = "BYTES")]
        length: u64,
        /// Bytes per range (default: from config).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,
    },
}

/// Per-run overrides for `config.toml` values.
#[derive(Debug, Clone, Default, Args)]
pub struct FetchArgs {
    /// Maximum concurrent range fetches.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
    /// Bytes per range.
    #[arg(long, visible_alias = "range-size", value_name = "BYTES")]
    pub chunk_size: Option<u64>,
    /// Retries per range after the first attempt.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
    /// Delay before a retry, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub retry_delay: Option<u64>,
    /// Comma-separated HTTP statuses to retry (e.g. 503,429).
    #[arg(long, value_delimiter = ',', value_name = "CODES")]
    pub retry_on: Option<Vec<u16>>,
    /// Stop every range as soon as one fails for good.
    #[arg(long)]
    pub fail_fast: bool,
    /// Skip the probe and use this content length.
    #[arg(long, value_name = "BYTES")]
    pub content_length: Option<u64>,
}

impl FetchArgs {
    pub fn apply(&self, cfg: &mut FetchConfig) {
        if let Some(n) = self.threads {
            cfg.threads = n;
        }
        if let Some(n) = self.chunk_size {
            cfg.chunk_size = n;
        }
        if let Some(n) = self.retries {
            cfg.retries = n;
        }
        if let Some(ms) = self.retry_delay {
            cfg.retry_delay_ms = ms;
        }
        if let Some(codes) = &self.retry_on {
            cfg.retry_on = codes.clone();
        }
        if self.fail_fast {
            cfg.failure_mode = FailureMode::FailFast;
        }
    }
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                output,
                json,
                fetch,
            } => run_get(cfg, &url, output, &fetch, json).await?,
            CliCommand::Probe { url } => run_probe(&cfg, &url).await?,
            CliCommand::Plan { length, chunk_size } => {
                run_plan(length, chunk_size.unwrap_or(cfg.chunk_size))?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
