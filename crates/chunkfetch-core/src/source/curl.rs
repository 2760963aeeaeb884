//! Ranged HTTP GET over libcurl.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::str;
use std::time::Duration;

use super::parse::parse_http_status;
use super::{Probe, RangeSource};
use crate::control::CancelToken;
use crate::planner::ByteRange;
use crate::retry::FetchError;

/// Upper bound on the body buffer reserved up front for one range.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Transfer settings applied to every curl handle of a job.
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for
    /// `low_speed_time`. Keeps stalled connections from hanging a range.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Receive buffer size (None = libcurl default).
    pub buffer_size: Option<usize>,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            buffer_size: None,
            headers: BTreeMap::new(),
        }
    }
}

/// `RangeSource` for an HTTP(S) URL.
#[derive(Debug, Clone)]
pub struct CurlSource {
    url: String,
    opts: CurlOptions,
}

impl CurlSource {
    pub fn new(url: impl Into<String>, opts: CurlOptions) -> Self {
        Self {
            url: url.into(),
            opts,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(super) fn configure(&self, easy: &mut curl::easy::Easy) -> Result<(), curl::Error> {
        easy.url(&self.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.opts.connect_timeout)?;
        easy.low_speed_limit(self.opts.low_speed_limit)?;
        easy.low_speed_time(self.opts.low_speed_time)?;
        if let Some(sz) = self.opts.buffer_size {
            easy.buffer_size(sz)?;
        }
        if !self.opts.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &self.opts.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

impl RangeSource for CurlSource {
    fn probe(&self, cancel: &CancelToken) -> Result<Probe, FetchError> {
        super::probe::probe_with(self, cancel)
    }

    fn fetch(
        &self,
        range: &ByteRange,
        cancel: &CancelToken,
        on_bytes: &mut dyn FnMut(u64),
    ) -> Result<Vec<u8>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let expected = range.len();
        let mut body: Vec<u8> = Vec::with_capacity(expected.unwrap_or(0).min(MAX_PREALLOC) as usize);
        let mut headers: Vec<String> = Vec::new();
        let status = Cell::new(0u32);
        let overflow = Cell::new(false);
        let rejected = Cell::new(false);

        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy)?;
        if let Some(r) = range.curl_range() {
            easy.range(&r)?;
        }
        easy.progress(true)?;

        let perform = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    let line = line.trim_end();
                    if line.starts_with("HTTP/") {
                        headers.clear();
                    }
                    headers.push(line.to_string());
                    if let Some(code) = parse_http_status(&headers) {
                        status.set(code);
                    }
                }
                true
            })?;
            transfer.write_function(|data| {
                if cancel.is_cancelled() {
                    return Ok(0);
                }
                if !(200..300).contains(&status.get()) {
                    rejected.set(true);
                    return Ok(0);
                }
                if let Some(limit) = expected {
                    if body.len() as u64 + data.len() as u64 > limit {
                        overflow.set(true);
                        return Ok(0);
                    }
                }
                body.extend_from_slice(data);
                on_bytes(body.len() as u64);
                Ok(data.len())
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            transfer.perform()
        };

        let code = status.get();
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if let Err(e) = perform {
            if overflow.get() {
                return Err(overflow_error(range, code, body.len() as u64));
            }
            if rejected.get() {
                return Err(FetchError::Http(code as u16));
            }
            return Err(FetchError::Curl(e));
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code as u16));
        }
        if code == 200 && range.start > 0 {
            return Err(FetchError::RangeIgnored { start: range.start });
        }
        if let Some(expected) = expected {
            let received = body.len() as u64;
            if received != expected {
                return Err(FetchError::PartialTransfer { expected, received });
            }
        }
        Ok(body)
    }
}

/// More bytes than the range holds: a full-body 200 means Range was ignored.
fn overflow_error(range: &ByteRange, status: u32, received: u64) -> FetchError {
    if status == 200 {
        FetchError::RangeIgnored { start: range.start }
    } else {
        FetchError::PartialTransfer {
            expected: range.len().unwrap_or(received),
            received,
        }
    }
}
