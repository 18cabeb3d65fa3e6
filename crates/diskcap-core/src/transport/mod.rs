//! Transport seam between the retrying executor and the network.
//!
//! The executor only depends on the [`Transport`] trait; [`CurlTransport`] is
//! the libcurl-backed implementation. Calls are blocking and are driven from
//! `spawn_blocking` by the executor.

mod libcurl;
mod parse;

use std::time::Duration;

use crate::operation::Method;

pub use libcurl::CurlTransport;
pub use parse::{parse_retry_after, retry_after_from_headers};

/// Connect and overall timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub connect: Duration,
    pub overall: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            overall: Duration::from_secs(120),
        }
    }
}

/// Fully resolved request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeouts: RequestTimeouts,
}

/// Response received from the remote side (any status).
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u32,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u32, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Server-provided retry delay, if a numeric hint is present.
    pub fn retry_after(&self) -> Option<Duration> {
        retry_after_from_headers(&self.headers)
    }
}

/// What kind of transport failure occurred (no response received).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connection,
    /// Request could not be set up (malformed URL, unsupported protocol).
    Setup,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message)
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Setup, message)
    }
}

/// Performs one network call. Must be safe to call from many threads at once.
pub trait Transport: Send + Sync {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}
