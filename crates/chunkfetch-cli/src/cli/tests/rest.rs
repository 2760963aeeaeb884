//! Tests for probe and plan.

use super::parse;
use crate::cli::commands::format_plan;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_probe() {
    match parse(&["chunkfetch", "probe", "https://example.com/file"]) {
        CliCommand::Probe { url } => assert_eq!(url, "https://example.com/file"),
        _ => panic!("expected Probe"),
    }
}

#[test]
fn cli_parse_plan() {
    match parse(&[
        "chunkfetch",
        "plan",
        "--length",
        "10485760",
        "--chunk-size",
        "1048576",
    ]) {
        CliCommand::Plan { length, chunk_size } => {
            assert_eq!(length, 10_485_760);
            assert_eq!(chunk_size, Some(1_048_576));
        }
        _ => panic!("expected Plan"),
    }
}

#[test]
fn plan_lists_range_headers() {
    let out = format_plan(2500, 1000).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "3 ranges of up to 1000 bytes");
    assert_eq!(lines.len(), 5);
    assert!(lines[2].ends_with("bytes=0-999"));
    assert!(lines[4].ends_with("bytes=2000-2499"));
    assert!(lines[4].contains(" 500 "));
}

#[test]
fn plan_rejects_zero_chunk_size() {
    assert!(format_plan(10, 0).is_err());
}

#[test]
fn cli_plan_requires_length() {
    assert!(Cli::try_parse_from(["chunkfetch", "plan"]).is_err());
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["chunkfetch", "pause", "1"]).is_err());
}
