//! libcurl-backed transport.

use std::str;

use curl::easy::{Easy, List};

use super::parse::parse_header_lines;
use super::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::operation::Method;

/// Blocking transport built on `curl::easy::Easy`. One handle per call, so a
/// single `CurlTransport` can be shared by every unit of a batch.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    user_agent: Option<String>,
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

impl Transport for CurlTransport {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut header_lines: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        let mut easy = Easy::new();
        easy.url(&request.url).map_err(map_curl_error)?;
        // Async control-plane calls answer 202 + Location; callers poll that themselves.
        easy.follow_location(false).map_err(map_curl_error)?;
        easy.connect_timeout(request.timeouts.connect)
            .map_err(map_curl_error)?;
        easy.timeout(request.timeouts.overall)
            .map_err(map_curl_error)?;
        if let Some(agent) = &self.user_agent {
            easy.useragent(agent).map_err(map_curl_error)?;
        }

        match request.method {
            Method::Get => easy.get(true).map_err(map_curl_error)?,
            Method::Head => easy.nobody(true).map_err(map_curl_error)?,
            other => easy
                .custom_request(other.as_str())
                .map_err(map_curl_error)?,
        }
        if let Some(payload) = &request.body {
            easy.post_fields_copy(payload.as_bytes())
                .map_err(map_curl_error)?;
        } else if matches!(request.method, Method::Put | Method::Post | Method::Patch) {
            easy.post_fields_copy(&[]).map_err(map_curl_error)?;
        }

        let mut list = List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))
                .map_err(map_curl_error)?;
        }
        if request.body.is_some()
            && !request
                .headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        {
            list.append("Content-Type: application/json")
                .map_err(map_curl_error)?;
        }
        easy.http_headers(list).map_err(map_curl_error)?;

        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        header_lines.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(map_curl_error)?;
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(map_curl_error)?;
            transfer.perform().map_err(map_curl_error)?;
        }

        let (parsed_status, headers) = parse_header_lines(&header_lines);
        let status = match parsed_status {
            Some(code) => code,
            None => easy.response_code().map_err(map_curl_error)?,
        };

        Ok(TransportResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

/// Map a curl error onto the transport taxonomy used by the classifier.
fn map_curl_error(e: curl::Error) -> TransportError {
    if e.is_operation_timedout() {
        return TransportError::timeout(e.to_string());
    }
    if e.is_url_malformed()
        || e.is_unsupported_protocol()
        || e.is_bad_function_argument()
        || e.is_unknown_option()
    {
        return TransportError::setup(e.to_string());
    }
    TransportError::connection(e.to_string())
}
