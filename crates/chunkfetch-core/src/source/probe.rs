//! Content-length discovery: HEAD, falling back to a one-byte range GET for
//! servers that reject HEAD.

use std::str;
use std::time::Duration;

use super::curl::CurlSource;
use super::parse::{parse_head, parse_http_status, parse_range_probe};
use super::{CurlOptions, Probe};
use crate::control::CancelToken;
use crate::retry::FetchError;

/// Probe `url` with default curl options.
pub fn probe(url: &str) -> Result<Probe, FetchError> {
    probe_with(&CurlSource::new(url, CurlOptions::default()), &CancelToken::new())
}

pub(super) fn probe_with(source: &CurlSource, cancel: &CancelToken) -> Result<Probe, FetchError> {
    match head(source, cancel) {
        Ok(p) => Ok(p),
        Err(FetchError::Http(code)) => {
            tracing::debug!(url = source.url(), code, "HEAD rejected, probing with range GET");
            range_get(source, cancel)
        }
        Err(e) => Err(e),
    }
}

/// Collect the final response's header lines; the body is never read.
fn headers_of(
    source: &CurlSource,
    cancel: &CancelToken,
    setup: impl FnOnce(&mut curl::easy::Easy) -> Result<(), curl::Error>,
) -> Result<Vec<String>, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    let mut headers: Vec<String> = Vec::new();
    let mut easy = curl::easy::Easy::new();
    source.configure(&mut easy)?;
    easy.timeout(Duration::from_secs(30))?;
    easy.progress(true)?;
    setup(&mut easy)?;

    let res = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                if line.starts_with("HTTP/") {
                    headers.clear();
                }
                headers.push(line.to_string());
            }
            true
        })?;
        // Stop at the first body byte: headers are all we need.
        transfer.write_function(|_| Ok(0))?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        transfer.perform()
    };
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    match res {
        Ok(()) => {}
        Err(e) if e.is_write_error() && !headers.is_empty() => {}
        Err(e) => return Err(FetchError::Curl(e)),
    }
    match parse_http_status(&headers) {
        Some(code) if (200..300).contains(&code) => Ok(headers),
        Some(code) => Err(FetchError::Http(code as u16)),
        None => Err(FetchError::Http(easy.response_code()? as u16)),
    }
}

fn head(source: &CurlSource, cancel: &CancelToken) -> Result<Probe, FetchError> {
    let headers = headers_of(source, cancel, |easy| easy.nobody(true))?;
    Ok(parse_head(&headers))
}

fn range_get(source: &CurlSource, cancel: &CancelToken) -> Result<Probe, FetchError> {
    let headers = headers_of(source, cancel, |easy| easy.range("0-0"))?;
    Ok(parse_range_probe(&headers))
}
