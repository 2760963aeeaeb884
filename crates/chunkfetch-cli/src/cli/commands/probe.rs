//! `chunkfetch probe <url>` – show what the server reports.

use anyhow::{Context, Result};
use chunkfetch_core::config::FetchConfig;
use chunkfetch_core::source::{CurlSource, RangeSource};
use chunkfetch_core::CancelToken;

pub async fn run_probe(cfg: &FetchConfig, url: &str) -> Result<()> {
    let source = CurlSource::new(url, cfg.curl_options());
    let probe = tokio::task::spawn_blocking(move || source.probe(&CancelToken::new()))
        .await
        .context("probe task join")?
        .with_context(|| format!("probe {}", url))?;
    match probe.content_length {
        Some(len) => println!("content-length: {} ({:.1} MiB)", len, len as f64 / 1_048_576.0),
        None => println!("content-length: unknown"),
    }
    println!(
        "accept-ranges:  {}",
        if probe.accept_ranges { "bytes" } else { "none" }
    );
    Ok(())
}
