//! Retry and backoff policy, and the retrying request executor.
//!
//! This module encapsulates error classification (transport failures,
//! throttling, transient statuses) and exponential backoff decisions so that
//! the batch executor and the completion poller share one consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{
    classify, classify_http_status, classify_response, classify_transport, is_throttling_text,
};
pub use error::OpError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy, Verdict};
pub use run::RequestExecutor;
