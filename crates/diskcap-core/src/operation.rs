//! Remote operation descriptors and their final results.
//!
//! A descriptor is built by the caller and submitted once; the executor
//! produces exactly one `OperationResult` for it.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// HTTP method of a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote call: method, target, optional body and API version.
///
/// `id` is the caller's stable identity for the call (e.g. a disk name) and is
/// copied into the result so reports can be correlated without relying on
/// completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub id: String,
    pub method: Method,
    pub url: String,
    /// Opaque request body (usually JSON built by the caller).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Stamped as the `api-version` query parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl OperationDescriptor {
    pub fn new(id: impl Into<String>, method: Method, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method,
            url: url.into(),
            body: None,
            api_version: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// URL to send, with `api-version` set to the descriptor's version.
    /// An existing `api-version` parameter is replaced, other parameters kept.
    pub fn effective_url(&self) -> Result<String, url::ParseError> {
        let Some(version) = self.api_version.as_deref() else {
            return Ok(self.url.clone());
        };
        let mut parsed = url::Url::parse(&self.url)?;
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| k != "api-version")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut pairs = parsed.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("api-version", version);
        }
        Ok(parsed.into())
    }
}

/// Terminal status of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Succeeded,
    Failed,
    /// Deadline passed before a terminal state was observed; final state unknown.
    TimedOut,
}

/// Why an operation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No response was received.
    Transport,
    /// Error status that is not retryable, or retries ran out.
    Remote,
    /// Remote throttled every attempt.
    Throttled,
    Credential,
    Canceled,
    Timeout,
    /// Unit task panicked or the request could not be built.
    Internal,
}

/// Final outcome of one descriptor or poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub id: String,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub attempts: u32,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl OperationResult {
    pub fn succeeded(
        id: impl Into<String>,
        status_code: Option<u32>,
        payload: String,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            status: OperationStatus::Succeeded,
            status_code,
            payload: Some(payload),
            error: None,
            failure: None,
            attempts,
            elapsed,
        }
    }

    pub fn failed(
        id: impl Into<String>,
        failure: FailureKind,
        error: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            status: OperationStatus::Failed,
            status_code: None,
            payload: None,
            error: Some(error.into()),
            failure: Some(failure),
            attempts,
            elapsed,
        }
    }

    pub fn timed_out(
        id: impl Into<String>,
        error: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            status: OperationStatus::TimedOut,
            ..Self::failed(id, FailureKind::Timeout, error, attempts, elapsed)
        }
    }

    pub fn canceled(id: impl Into<String>, attempts: u32, elapsed: Duration) -> Self {
        Self::failed(id, FailureKind::Canceled, "canceled", attempts, elapsed)
    }

    /// Attach the HTTP status and body of the last response (for diagnostics).
    pub fn with_response(mut self, status_code: u32, body: String) -> Self {
        self.status_code = Some(status_code);
        self.payload = Some(body);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Succeeded
    }
}

pub(crate) fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_url_without_version_is_unchanged() {
        let d = OperationDescriptor::new("d0", Method::Get, "https://mgmt.example.com/disks/d0");
        assert_eq!(d.effective_url().unwrap(), "https://mgmt.example.com/disks/d0");
    }

    #[test]
    fn effective_url_stamps_and_replaces_api_version() {
        let d = OperationDescriptor::new(
            "snap",
            Method::Put,
            "https://mgmt.example.com/snapshots/s1?api-version=2019-01-01&x=1",
        )
        .with_api_version("2023-04-02");
        let url = d.effective_url().unwrap();
        assert!(url.contains("x=1"));
        assert!(url.contains("api-version=2023-04-02"));
        assert!(!url.contains("2019-01-01"));
    }

    #[test]
    fn effective_url_rejects_relative_path_when_stamping() {
        let d =
            OperationDescriptor::new("bad", Method::Get, "/relative/path").with_api_version("v1");
        assert!(d.effective_url().is_err());
    }

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let json = r#"{"id":"disk-1","method":"PUT","url":"https://h/x","body":"{}"}"#;
        let d: OperationDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.method, Method::Put);
        assert_eq!(d.body.as_deref(), Some("{}"));
        assert!(d.api_version.is_none());
        assert!(d.headers.is_empty());
    }

    #[test]
    fn result_serializes_elapsed_as_millis() {
        let r = OperationResult::timed_out("p", "deadline", 3, Duration::from_millis(1500));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["elapsed_ms"], 1500);
        assert_eq!(v["status"], "TimedOut");
        assert_eq!(v["failure"], "Timeout");
        assert!(v.get("payload").is_none());
    }
}
