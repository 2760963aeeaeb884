//! Event printer for `chunkfetch get`.

use anyhow::Result;
use chunkfetch_core::progress::{ProgressSnapshot, ProgressStats};
use chunkfetch_core::JobEvent;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

fn format_stats(stats: &ProgressStats) -> String {
    let done_mib = stats.snapshot.loaded as f64 / 1_048_576.0;
    let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    match (stats.snapshot.total, stats.snapshot.percent()) {
        (Some(total), Some(pct)) => format!(
            "  {:.1} / {:.1} MiB ({}%)  {:.2} MiB/s  ETA {}",
            done_mib,
            total as f64 / 1_048_576.0,
            pct,
            rate_mib,
            eta
        ),
        _ => format!("  {:.1} MiB  {:.2} MiB/s", done_mib, rate_mib),
    }
}

/// Print events until the job drops its sender.
///
/// Job progress is printed at most every 500 ms plus once at completion;
/// range errors are printed as they happen. With `json`, every event is
/// printed as one JSON line.
pub async fn print_events(mut rx: UnboundedReceiver<JobEvent>, json: bool) -> Result<()> {
    let started = Instant::now();
    let mut last_print: Option<Instant> = None;
    while let Some(event) = rx.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        match event {
            JobEvent::Start {
                content_length,
                range_count,
            } => match content_length {
                Some(len) => println!("fetching {} bytes in {} ranges", len, range_count),
                None => println!("fetching unknown length in {} range", range_count),
            },
            JobEvent::Progress { loaded, total } => {
                let snapshot = ProgressSnapshot { loaded, total };
                let now = Instant::now();
                let due = last_print.map_or(true, |t| now.duration_since(t) >= PROGRESS_INTERVAL);
                if due || total == Some(loaded) {
                    let stats = ProgressStats {
                        snapshot,
                        elapsed_secs: started.elapsed().as_secs_f64(),
                    };
                    println!("{}", format_stats(&stats));
                    last_print = Some(now);
                }
            }
            JobEvent::RangeError { id, error, fatal } => {
                let what = if fatal { "failed" } else { "retrying" };
                eprintln!("  range {} {}: {}", id, what, error);
            }
            JobEvent::Error { error } => eprintln!("error: {}", error),
            JobEvent::Finish
            | JobEvent::RangeStart { .. }
            | JobEvent::RangeProgress { .. }
            | JobEvent::RangeFinish { .. } => {}
        }
    }
    Ok(())
}
