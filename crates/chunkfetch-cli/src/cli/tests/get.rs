//! Tests for the get subcommand and its overrides.

use super::parse;
use crate::cli::commands::default_output;
use crate::cli::{Cli, CliCommand, FetchArgs};
use chunkfetch_core::config::{FailureMode, FetchConfig};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_get_defaults() {
    match parse(&["chunkfetch", "get", "https://example.com/file.iso"]) {
        CliCommand::Get {
            url,
            output,
            json,
            fetch,
        } => {
            assert_eq!(url, "https://example.com/file.iso");
            assert!(output.is_none());
            assert!(!json);
            assert!(fetch.threads.is_none());
            assert!(!fetch.fail_fast);
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_get_output_and_json() {
    match parse(&[
        "chunkfetch",
        "get",
        "https://example.com/x",
        "-o",
        "/tmp/x.bin",
        "--json",
    ]) {
        CliCommand::Get { output, json, .. } => {
            assert_eq!(output.as_deref(), Some(Path::new("/tmp/x.bin")));
            assert!(json);
        }
        _ => panic!("expected Get with -o"),
    }
}

#[test]
fn cli_parse_get_overrides() {
    match parse(&[
        "chunkfetch",
        "get",
        "https://example.com/x",
        "--threads",
        "8",
        "--chunk-size",
        "65536",
        "--retries",
        "5",
        "--retry-delay",
        "250",
        "--retry-on",
        "503,429",
        "--fail-fast",
        "--content-length",
        "1000",
    ]) {
        CliCommand::Get { fetch, .. } => {
            assert_eq!(fetch.threads, Some(8));
            assert_eq!(fetch.chunk_size, Some(65536));
            assert_eq!(fetch.retries, Some(5));
            assert_eq!(fetch.retry_delay, Some(250));
            assert_eq!(fetch.retry_on, Some(vec![503, 429]));
            assert!(fetch.fail_fast);
            assert_eq!(fetch.content_length, Some(1000));
        }
        _ => panic!("expected Get with overrides"),
    }
}

#[test]
fn cli_parse_range_size_alias() {
    match parse(&["chunkfetch", "get", "https://example.com/x", "--range-size", "4096"]) {
        CliCommand::Get { fetch, .. } => assert_eq!(fetch.chunk_size, Some(4096)),
        _ => panic!("expected Get with --range-size"),
    }
}

#[test]
fn cli_get_requires_url() {
    assert!(Cli::try_parse_from(["chunkfetch", "get"]).is_err());
}

#[test]
fn fetch_args_override_config() {
    let args = FetchArgs {
        threads: Some(2),
        retry_on: Some(vec![503]),
        fail_fast: true,
        ..FetchArgs::default()
    };
    let mut cfg = FetchConfig::default();
    args.apply(&mut cfg);
    assert_eq!(cfg.threads, 2);
    assert_eq!(cfg.retry_on, vec![503]);
    assert_eq!(cfg.failure_mode, FailureMode::FailFast);
    assert_eq!(cfg.chunk_size, FetchConfig::default().chunk_size);
}

#[test]
fn default_output_uses_last_segment() {
    assert_eq!(
        default_output("https://example.com/pub/file.iso").unwrap(),
        Path::new("file.iso")
    );
    assert_eq!(
        default_output("https://example.com/dir/").unwrap(),
        Path::new("dir")
    );
    assert_eq!(
        default_output("https://example.com").unwrap(),
        Path::new("index.html")
    );
}
