//! Classify HTTP statuses, response bodies and transport failures into retry kinds.

use super::error::OpError;
use super::policy::ErrorKind;
use crate::transport::{TransportError, TransportErrorKind};

/// Lower-case fragments that mark a throttling response regardless of status.
const THROTTLE_VOCABULARY: &[&str] = &["too many requests", "retry after", "throttl"];

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        408 => ErrorKind::Timeout,
        409 | 500 | 502 | 504 => ErrorKind::Transient(code as u16),
        _ => ErrorKind::Other,
    }
}

/// True if the body mentions throttling (case-insensitive).
pub fn is_throttling_text(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    THROTTLE_VOCABULARY.iter().any(|term| lower.contains(term))
}

/// Classify an error response using both its status and body text.
pub fn classify_response(code: u32, body: &str) -> ErrorKind {
    match classify_http_status(code) {
        ErrorKind::Other if is_throttling_text(body) => ErrorKind::Throttled,
        kind => kind,
    }
}

/// Classify a transport failure (no response received).
pub fn classify_transport(e: &TransportError) -> ErrorKind {
    match e.kind {
        TransportErrorKind::Timeout => ErrorKind::Timeout,
        TransportErrorKind::Connection => ErrorKind::Connection,
        TransportErrorKind::Setup => ErrorKind::Other,
    }
}

/// Classify an attempt error into an ErrorKind.
pub fn classify(e: &OpError) -> ErrorKind {
    match e {
        OpError::Transport(te) => classify_transport(te),
        OpError::Remote { status, body, .. } => classify_response(*status, body),
        OpError::Credential(_) | OpError::Canceled | OpError::Internal(_) => ErrorKind::Other,
    }
}
