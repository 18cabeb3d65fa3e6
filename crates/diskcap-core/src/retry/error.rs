//! Error of a single attempt, before retry classification.

use std::time::Duration;

use crate::credential::CredentialError;
use crate::transport::TransportError;

/// Why one attempt did not succeed. Classified by [`super::classify`] to decide
/// whether the executor retries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpError {
    /// No response was received.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    /// Response with status >= 400.
    #[error("HTTP {status}")]
    Remote {
        status: u32,
        body: String,
        /// Numeric server retry hint, if one was sent.
        retry_after: Option<Duration>,
    },
    #[error("credential: {0}")]
    Credential(#[from] CredentialError),
    #[error("canceled")]
    Canceled,
    /// Request could not be built or the attempt task died.
    #[error("internal: {0}")]
    Internal(String),
}

impl OpError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OpError::Remote { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u32> {
        match self {
            OpError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
