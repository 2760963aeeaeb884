//! Parse HTTP response header lines.

use super::Probe;

/// Status code from the most recent `HTTP/x y` status line.
pub(crate) fn parse_http_status(lines: &[String]) -> Option<u32> {
    lines.iter().rev().find_map(|line| {
        let line = line.trim();
        if !line.starts_with("HTTP/") {
            return None;
        }
        line.split_whitespace().nth(1)?.parse().ok()
    })
}

fn header<'a>(lines: &'a [String], name: &str) -> Option<&'a str> {
    lines.iter().rev().find_map(|line| {
        let (n, v) = line.split_once(':')?;
        n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

/// `Content-Range: bytes start-end/total` → `(start, end_inclusive, total)`.
/// `total` is `None` for `*`.
pub(crate) fn parse_content_range(lines: &[String]) -> Option<(u64, u64, Option<u64>)> {
    let value = header(lines, "content-range")?;
    let rest = value.strip_prefix("bytes")?.trim();
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?, total))
}

/// Probe result from the headers of a HEAD response.
pub(crate) fn parse_head(lines: &[String]) -> Probe {
    let content_length = header(lines, "content-length").and_then(|v| v.parse::<u64>().ok());
    let accept_ranges = header(lines, "accept-ranges")
        .map(|v| v.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);
    Probe {
        content_length,
        accept_ranges,
    }
}

/// Probe result from the headers of a `Range: bytes=0-0` GET.
pub(crate) fn parse_range_probe(lines: &[String]) -> Probe {
    match (parse_http_status(lines), parse_content_range(lines)) {
        (Some(206), Some((_, _, total))) => Probe {
            content_length: total,
            accept_ranges: true,
        },
        _ => Probe {
            content_length: header(lines, "content-length").and_then(|v| v.parse().ok()),
            accept_ranges: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn head_content_length_and_ranges() {
        let p = parse_head(&lines(&[
            "HTTP/1.1 200 OK",
            "Content-Length: 12345",
            "Accept-Ranges: bytes",
        ]));
        assert_eq!(p.content_length, Some(12345));
        assert!(p.accept_ranges);
    }

    #[test]
    fn head_no_ranges() {
        let p = parse_head(&lines(&["Content-Length: 999", "Accept-Ranges: none"]));
        assert_eq!(p.content_length, Some(999));
        assert!(!p.accept_ranges);
    }

    #[test]
    fn head_without_length() {
        let p = parse_head(&lines(&["HTTP/1.1 200 OK", "Accept-Ranges: bytes"]));
        assert_eq!(p.content_length, None);
    }

    #[test]
    fn status_uses_last_status_line() {
        let l = lines(&["HTTP/1.1 302 Found", "Location: /x", "HTTP/1.1 206 Partial Content"]);
        assert_eq!(parse_http_status(&l), Some(206));
        assert_eq!(parse_http_status(&lines(&["Content-Length: 1"])), None);
    }

    #[test]
    fn content_range_variants() {
        assert_eq!(
            parse_content_range(&lines(&["Content-Range: bytes 0-0/5000"])),
            Some((0, 0, Some(5000)))
        );
        assert_eq!(
            parse_content_range(&lines(&["content-range: bytes 10-19/*"])),
            Some((10, 19, None))
        );
        assert_eq!(parse_content_range(&lines(&["Content-Range: junk"])), None);
    }

    #[test]
    fn range_probe_206_and_200() {
        let p = parse_range_probe(&lines(&[
            "HTTP/1.1 206 Partial Content",
            "Content-Range: bytes 0-0/4096",
            "Content-Length: 1",
        ]));
        assert_eq!(p.content_length, Some(4096));
        assert!(p.accept_ranges);

        let p = parse_range_probe(&lines(&["HTTP/1.1 200 OK", "Content-Length: 4096"]));
        assert_eq!(p.content_length, Some(4096));
        assert!(!p.accept_ranges);
    }
}
