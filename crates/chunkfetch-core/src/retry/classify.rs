//! Map fetch errors onto retry error kinds.

use super::error::FetchError;
use super::policy::ErrorKind;

/// Classify a curl error. Network-level failures are transport errors;
/// anything else (bad URL, unsupported protocol, TLS setup) is fatal.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_aborted_by_callback() {
        return ErrorKind::Cancelled;
    }
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Transport;
    }
    ErrorKind::Fatal
}

/// Classify a fetch error into an `ErrorKind`.
pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Io(_) | FetchError::PartialTransfer { .. } => ErrorKind::Transport,
        FetchError::Http(code) => ErrorKind::Status(*code),
        FetchError::Cancelled => ErrorKind::Cancelled,
        FetchError::RangeIgnored { .. } | FetchError::Sink(_) => ErrorKind::Fatal,
    }
}
