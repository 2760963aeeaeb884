//! `chunkfetch get <url>` – download one URL.

use anyhow::{bail, Context, Result};
use chunkfetch_core::config::FetchConfig;
use chunkfetch_core::{FileAssembler, Job, JobEvent, JobOutcome};
use std::path::PathBuf;
use std::sync::Arc;

use super::progress::print_events;
use crate::cli::FetchArgs;

/// Output name from the last non-empty URL path segment.
pub(crate) fn default_output(url: &str) -> Result<PathBuf> {
    let parsed = url::Url::parse(url).with_context(|| format!("invalid URL {:?}", url))?;
    let name = parsed
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| "index.html".to_string());
    Ok(PathBuf::from(name))
}

pub async fn run_get(
    mut cfg: FetchConfig,
    url: &str,
    output: Option<PathBuf>,
    fetch: &FetchArgs,
    json: bool,
) -> Result<()> {
    fetch.apply(&mut cfg);
    cfg.validate()?;
    let dest = match output {
        Some(p) => p,
        None => default_output(url)?,
    };

    let mut job_cfg = cfg.job_config(url);
    job_cfg.content_length = fetch.content_length;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<JobEvent>();
    let assembler = Arc::new(
        FileAssembler::create(&dest)
            .with_context(|| format!("create output {}", dest.display()))?,
    );
    let job = Arc::new(Job::http(job_cfg, cfg.curl_options(), assembler, tx)?);
    let printer = tokio::spawn(print_events(rx, json));

    job.start()?;
    let mut waiter = tokio::task::spawn_blocking({
        let job = Arc::clone(&job);
        move || job.wait()
    });
    let outcome = tokio::select! {
        res = &mut waiter => res.context("job wait task")??,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("cancelling...");
            job.cancel();
            waiter.await.context("job wait task")??
        }
    };

    // Dropping the job drops its event sender and ends the printer.
    drop(job);
    printer.await.context("event printer task")??;

    match outcome {
        JobOutcome::Finished => {
            if !json {
                println!("saved {}", dest.display());
            }
            Ok(())
        }
        JobOutcome::Failed(e) => bail!("download failed: {}", e),
        JobOutcome::Cancelled => bail!("download cancelled"),
    }
}
