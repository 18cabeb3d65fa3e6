//! Retry loop: issue one remote operation until success or the policy says stop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::classify;
use super::error::OpError;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::control::CancelToken;
use crate::credential::CredentialSupplier;
use crate::operation::{FailureKind, OperationDescriptor, OperationResult};
use crate::transport::{RequestTimeouts, Transport, TransportRequest, TransportResponse};

/// Issues descriptors through a transport, retrying transient failures.
///
/// Cheap to clone: the transport and credential supplier are shared, so every
/// unit of a batch gets its own clone.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSupplier>,
    timeouts: RequestTimeouts,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialSupplier>) -> Self {
        Self {
            transport,
            credentials,
            timeouts: RequestTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> RequestTimeouts {
        self.timeouts
    }

    /// Run `descriptor` to a terminal outcome. Never returns an error: transport
    /// failures, error statuses, exhausted retries and cancellation all end up
    /// in the returned `OperationResult`.
    pub async fn execute(
        &self,
        descriptor: &OperationDescriptor,
        policy: &RetryPolicy,
        cancel: &CancelToken,
    ) -> OperationResult {
        let started = Instant::now();
        let id = descriptor.id.as_str();

        let request = match self.build_request(descriptor) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(id, "cannot build request: {}", e);
                return finalize_error(id, &e, 0, started.elapsed());
            }
        };

        let mut attempt = 0u32;
        loop {
            if cancel.is_canceled() {
                return OperationResult::canceled(id, attempt, started.elapsed());
            }
            attempt += 1;
            tracing::debug!(id, attempt, method = %request.method, url = %request.url, "attempt");

            let outcome = tokio::select! {
                biased;
                _ = cancel.canceled() => Err(OpError::Canceled),
                res = self.attempt_once(request.clone()) => res,
            };

            let err = match outcome {
                Ok(resp) if resp.status < 400 => {
                    tracing::debug!(id, attempt, status = resp.status, "succeeded");
                    return OperationResult::succeeded(
                        id,
                        Some(resp.status),
                        resp.body,
                        attempt,
                        started.elapsed(),
                    );
                }
                Ok(resp) => OpError::Remote {
                    status: resp.status,
                    retry_after: resp.retry_after(),
                    body: resp.body,
                },
                Err(e) => e,
            };

            if matches!(err, OpError::Canceled) {
                return OperationResult::canceled(id, attempt, started.elapsed());
            }

            let kind = classify::classify(&err);
            match policy.decide(attempt, kind, err.retry_after()) {
                RetryDecision::NoRetry => {
                    if kind == ErrorKind::Other {
                        tracing::warn!(id, attempt, "fatal: {}", err);
                    } else {
                        tracing::warn!(id, attempt, "retries exhausted: {}", err);
                    }
                    return finalize_error(id, &err, attempt, started.elapsed());
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        id,
                        attempt,
                        ?kind,
                        delay_ms = delay.as_millis() as u64,
                        "retrying: {}",
                        err
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.canceled() => {
                            return OperationResult::canceled(id, attempt, started.elapsed());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn build_request(&self, descriptor: &OperationDescriptor) -> Result<TransportRequest, OpError> {
        let url = descriptor
            .effective_url()
            .map_err(|e| OpError::Internal(format!("invalid url {}: {}", descriptor.url, e)))?;
        Ok(TransportRequest {
            method: descriptor.method,
            url,
            headers: descriptor
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body: descriptor.body.clone(),
            timeouts: self.timeouts,
        })
    }

    /// One attempt: fresh token, then the blocking transport call on the blocking pool.
    async fn attempt_once(
        &self,
        mut request: TransportRequest,
    ) -> Result<TransportResponse, OpError> {
        let transport = Arc::clone(&self.transport);
        let credentials = Arc::clone(&self.credentials);
        tokio::task::spawn_blocking(move || {
            let token = credentials.token()?;
            if !token.is_empty() {
                request
                    .headers
                    .push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
            transport.send(&request).map_err(OpError::from)
        })
        .await
        .map_err(|e| OpError::Internal(format!("transport task join: {}", e)))?
    }
}

/// Build the Failed result for a terminal attempt error.
fn finalize_error(id: &str, err: &OpError, attempts: u32, elapsed: Duration) -> OperationResult {
    match err {
        OpError::Remote { status, body, .. } => {
            let failure = if classify::classify(err) == ErrorKind::Throttled {
                FailureKind::Throttled
            } else {
                FailureKind::Remote
            };
            OperationResult::failed(id, failure, err.to_string(), attempts, elapsed)
                .with_response(*status, body.clone())
        }
        OpError::Transport(_) => {
            OperationResult::failed(id, FailureKind::Transport, err.to_string(), attempts, elapsed)
        }
        OpError::Credential(_) => {
            OperationResult::failed(id, FailureKind::Credential, err.to_string(), attempts, elapsed)
        }
        OpError::Canceled => OperationResult::canceled(id, attempts, elapsed),
        OpError::Internal(_) => {
            OperationResult::failed(id, FailureKind::Internal, err.to_string(), attempts, elapsed)
        }
    }
}
