//! Completion polling for long-running remote operations.
//!
//! A `CompletionPoller` waits for one resource to reach a terminal state:
//! provisioning of a snapshot/disk/restore point, or background copy
//! (hydration) progress. Each tick reads the resource through the retrying
//! executor and maps the observed state onto the `PollSpec`'s terminal sets.
//!
//! A read that fails even after the executor's retries counts as a missed
//! tick and polling continues; only the deadline or cancellation stops a
//! poll that has not seen a terminal state. Several resources are awaited by
//! composing pollers with `batch::await_all`.

mod state;

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::control::CancelToken;
use crate::operation::{FailureKind, Method, OperationDescriptor, OperationResult};
use crate::retry::{RequestExecutor, RetryPolicy};

pub use state::extract_field;

/// JSON pointer of the ARM-style provisioning state.
pub const PROVISIONING_STATE_POINTER: &str = "/properties/provisioningState";
/// JSON pointer of a snapshot's background copy progress.
pub const COMPLETION_PERCENT_POINTER: &str = "/properties/completionPercent";
/// Shortest gap between two reads of the same resource.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stand-in for deadlines too far out to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// What to poll and when to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    pub id: String,
    pub url: String,
    pub api_version: Option<String>,
    /// JSON pointer to the state field in the resource payload.
    pub state_pointer: String,
    /// Terminal states that mean success (case-insensitive).
    pub success_states: Vec<String>,
    /// Terminal states that mean failure or cancellation (case-insensitive).
    pub failure_states: Vec<String>,
    /// Optional JSON pointer logged on every tick (e.g. copy percentage).
    pub progress_pointer: Option<String>,
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSpec {
    /// Wait for `provisioningState` to become `Succeeded` (or `Failed`/`Canceled`).
    pub fn provisioning(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            api_version: None,
            state_pointer: PROVISIONING_STATE_POINTER.to_string(),
            success_states: vec!["Succeeded".to_string()],
            failure_states: vec!["Failed".to_string(), "Canceled".to_string()],
            progress_pointer: None,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
        }
    }

    /// Wait for a background copy to reach 100 percent.
    pub fn copy_completion(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            state_pointer: COMPLETION_PERCENT_POINTER.to_string(),
            success_states: vec!["100".to_string()],
            failure_states: Vec::new(),
            progress_pointer: Some(COMPLETION_PERCENT_POINTER.to_string()),
            ..Self::provisioning(id, url)
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_state_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.state_pointer = pointer.into();
        self
    }

    pub fn with_success_states(mut self, states: Vec<String>) -> Self {
        self.success_states = states;
        self
    }

    pub fn with_failure_states(mut self, states: Vec<String>) -> Self {
        self.failure_states = states;
        self
    }

    pub fn with_progress_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.progress_pointer = Some(pointer.into());
        self
    }

    /// Clamped to at least [`MIN_POLL_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Map an observed state onto the poll state machine. Unknown or missing
    /// states keep polling.
    pub fn evaluate(&self, observed: Option<&str>) -> PollState {
        let Some(observed) = observed else {
            return PollState::Polling;
        };
        let matches = |set: &[String]| set.iter().any(|s| s.eq_ignore_ascii_case(observed));
        if matches(&self.success_states) {
            PollState::Succeeded
        } else if matches(&self.failure_states) {
            PollState::Failed
        } else {
            PollState::Polling
        }
    }

    fn read_descriptor(&self) -> OperationDescriptor {
        let d = OperationDescriptor::new(self.id.clone(), Method::Get, self.url.clone());
        match &self.api_version {
            Some(v) => d.with_api_version(v.clone()),
            None => d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollState {
    Polling,
    Succeeded,
    Failed,
    /// Deadline reached without a terminal state; final state unknown.
    TimedOut,
}

/// Terminal outcome of one poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    pub id: String,
    pub state: PollState,
    /// Last state value observed in the resource payload.
    pub last_state: Option<String>,
    /// Last successfully read resource payload.
    pub payload: Option<String>,
    /// Reads issued (including missed ones).
    pub ticks: u32,
    /// Reads that failed after the executor's retries.
    pub missed_ticks: u32,
    #[serde(rename = "elapsed_ms", serialize_with = "crate::operation::serialize_millis")]
    pub elapsed: Duration,
    /// Ended by cancellation (state is `Failed`).
    pub canceled: bool,
}

impl PollOutcome {
    /// Convert into the common result shape used in batch reports.
    pub fn into_result(self) -> OperationResult {
        let last = self.last_state.as_deref().unwrap_or("<none>").to_string();
        match self.state {
            PollState::Succeeded => OperationResult::succeeded(
                self.id,
                None,
                self.payload.unwrap_or_default(),
                self.ticks,
                self.elapsed,
            ),
            PollState::Failed if self.canceled => {
                OperationResult::canceled(self.id, self.ticks, self.elapsed)
            }
            PollState::Failed | PollState::Polling => {
                let mut r = OperationResult::failed(
                    self.id,
                    FailureKind::Remote,
                    format!("terminal state {}", last),
                    self.ticks,
                    self.elapsed,
                );
                r.payload = self.payload;
                r
            }
            PollState::TimedOut => {
                let mut r = OperationResult::timed_out(
                    self.id,
                    format!("no terminal state before deadline (last state {})", last),
                    self.ticks,
                    self.elapsed,
                );
                r.payload = self.payload;
                r
            }
        }
    }
}

/// Polls one resource at a time through the retrying executor.
#[derive(Clone)]
pub struct CompletionPoller {
    executor: RequestExecutor,
    read_policy: RetryPolicy,
}

struct Progress {
    started: Instant,
    ticks: u32,
    missed_ticks: u32,
    last_state: Option<String>,
    payload: Option<String>,
}

impl Progress {
    fn finish(self, id: &str, state: PollState, canceled: bool) -> PollOutcome {
        PollOutcome {
            id: id.to_string(),
            state,
            last_state: self.last_state,
            payload: self.payload,
            ticks: self.ticks,
            missed_ticks: self.missed_ticks,
            elapsed: self.started.elapsed(),
            canceled,
        }
    }
}

impl CompletionPoller {
    /// `read_policy` governs retries of each individual status read.
    pub fn new(executor: RequestExecutor, read_policy: RetryPolicy) -> Self {
        Self {
            executor,
            read_policy,
        }
    }

    /// Poll until a terminal state, the deadline, or cancellation.
    ///
    /// The first read is issued immediately, then one read per `interval`.
    pub async fn poll(&self, spec: &PollSpec, cancel: &CancelToken) -> PollOutcome {
        let id = spec.id.as_str();
        let deadline = instant_after(tokio::time::Instant::now(), spec.timeout);
        let interval = spec.interval.max(MIN_POLL_INTERVAL);
        let descriptor = spec.read_descriptor();
        let mut progress = Progress {
            started: Instant::now(),
            ticks: 0,
            missed_ticks: 0,
            last_state: None,
            payload: None,
        };

        loop {
            if cancel.is_canceled() {
                return progress.finish(id, PollState::Failed, true);
            }
            progress.ticks += 1;
            let tick = progress.ticks;

            let read = tokio::time::timeout_at(
                deadline,
                self.executor.execute(&descriptor, &self.read_policy, cancel),
            )
            .await;
            let result = match read {
                Ok(r) => r,
                Err(_) => {
                    tracing::warn!(id, tick, "deadline reached during status read");
                    return progress.finish(id, PollState::TimedOut, false);
                }
            };

            if result.is_success() {
                let body = result.payload.unwrap_or_default();
                let observed = extract_field(&body, &spec.state_pointer);
                if let Some(pointer) = &spec.progress_pointer {
                    if let Some(p) = extract_field(&body, pointer) {
                        tracing::debug!(id, tick, progress = %p, "progress");
                    }
                }
                let state = spec.evaluate(observed.as_deref());
                tracing::debug!(id, tick, observed = ?observed, ?state, "poll tick");
                progress.last_state = observed;
                progress.payload = Some(body);
                if state != PollState::Polling {
                    if state == PollState::Failed {
                        tracing::warn!(
                            id,
                            tick,
                            "resource reached failure state {:?}",
                            progress.last_state
                        );
                    }
                    return progress.finish(id, state, false);
                }
            } else if result.failure == Some(FailureKind::Canceled) {
                return progress.finish(id, PollState::Failed, true);
            } else {
                progress.missed_ticks += 1;
                tracing::warn!(
                    id,
                    tick,
                    "status read failed, continuing: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return progress.finish(id, PollState::TimedOut, false);
            }
            let wake = instant_after(now, interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.canceled() => {
                    return progress.finish(id, PollState::Failed, true);
                }
                _ = tokio::time::sleep_until(wake) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(id, tick, "no terminal state before deadline");
                return progress.finish(id, PollState::TimedOut, false);
            }
        }
    }
}

/// `now + after`, saturating to a far-future instant instead of overflowing.
fn instant_after(now: tokio::time::Instant, after: Duration) -> tokio::time::Instant {
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}
