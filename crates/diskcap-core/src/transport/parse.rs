//! Parse raw response header lines and server retry hints.

use std::time::Duration;

/// Split raw header lines (as delivered by libcurl) into the status code and
/// `(name, value)` pairs of the final response. A new status line resets the
/// collected headers, so interim `100 Continue` blocks are dropped.
pub(crate) fn parse_header_lines(lines: &[String]) -> (Option<u32>, Vec<(String, String)>) {
    let mut status = None;
    let mut headers = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            status = line
                .split_whitespace()
                .nth(1)
                .and_then(|code| code.parse::<u32>().ok());
            headers.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    (status, headers)
}

/// Parse a `Retry-After` value given in whole seconds. HTTP-date and other
/// non-numeric forms yield `None` so the caller falls back to its own backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Numeric retry hint from response headers. Millisecond variants
/// (`retry-after-ms`, `x-ms-retry-after-ms`) take precedence over `Retry-After`.
pub fn retry_after_from_headers(headers: &[(String, String)]) -> Option<Duration> {
    let find = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    };
    for name in ["retry-after-ms", "x-ms-retry-after-ms"] {
        if let Some(ms) = find(name).and_then(|v| v.parse::<u64>().ok()) {
            return Some(Duration::from_millis(ms));
        }
    }
    find("retry-after").and_then(parse_retry_after)
}
