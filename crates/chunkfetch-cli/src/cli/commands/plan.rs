//! `chunkfetch plan --length L` – print the range plan.

use anyhow::{bail, Result};
use chunkfetch_core::planner::plan_ranges;

pub fn run_plan(length: u64, chunk_size: u64) -> Result<()> {
    print!("{}", format_plan(length, chunk_size)?);
    Ok(())
}

/// Plan table with the `Range` header each request would send.
pub(crate) fn format_plan(length: u64, chunk_size: u64) -> Result<String> {
    if chunk_size == 0 {
        bail!("chunk size must be at least 1 byte");
    }
    let ranges = plan_ranges(Some(length), chunk_size);
    let mut out = format!("{} ranges of up to {} bytes\n", ranges.len(), chunk_size);
    out.push_str(&format!(
        "  {:>6}  {:>14}  {:>14}  {:>12}  {}\n",
        "Id", "Start", "End", "Bytes", "Range"
    ));
    for r in &ranges {
        let end = r.end.unwrap_or(length);
        out.push_str(&format!(
            "  {:>6}  {:>14}  {:>14}  {:>12}  {}\n",
            r.id,
            r.start,
            end,
            end - r.start,
            r.range_header_value().unwrap_or_else(|| "-".into())
        ));
    }
    Ok(out)
}
