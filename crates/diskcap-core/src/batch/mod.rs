//! Fan-out/fan-in execution of independent remote operations.
//!
//! Every unit runs as its own tokio task; at most `concurrency_limit` units are
//! in flight and the rest wait in a queue. Units share nothing but the cancel
//! token and the executor's transport/credentials, so one unit failing never
//! affects another. The batch returns only when every unit has a terminal
//! result, placed at the unit's submission index.

mod report;

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::control::CancelToken;
use crate::operation::{FailureKind, OperationDescriptor, OperationResult, OperationStatus};
use crate::poller::{CompletionPoller, PollSpec};
use crate::retry::{RequestExecutor, RetryPolicy};

pub use report::{BatchReport, BatchSummary};

/// Event sent when one unit reaches its terminal result.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub index: usize,
    pub id: String,
    pub status: OperationStatus,
    /// Units finished so far, including this one.
    pub completed: usize,
    pub total: usize,
}

/// Knobs shared by `execute_all` and `await_all`.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Maximum units in flight (None = all at once).
    pub concurrency_limit: Option<usize>,
    /// Receives one event per finished unit. Uses `try_send`, so a full
    /// channel drops events rather than stalling the batch.
    pub progress_tx: Option<mpsc::Sender<BatchProgress>>,
}

impl BatchOptions {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<BatchProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }
}

/// Collects results by index and emits progress.
struct Collector<'a> {
    ids: Vec<String>,
    slots: Vec<Option<OperationResult>>,
    completed: usize,
    progress_tx: Option<&'a mpsc::Sender<BatchProgress>>,
}

impl Collector<'_> {
    fn record(&mut self, index: usize, result: OperationResult) {
        let status = result.status;
        self.slots[index] = Some(result);
        self.completed += 1;
        if let Some(tx) = self.progress_tx {
            let _ = tx.try_send(BatchProgress {
                index,
                id: self.ids[index].clone(),
                status,
                completed: self.completed,
                total: self.slots.len(),
            });
        }
    }

    /// Fill slots whose task died without reporting (panic) and build the report.
    fn finish(self, started: Instant) -> BatchReport {
        let elapsed = started.elapsed();
        let results = self
            .slots
            .into_iter()
            .zip(self.ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| {
                    OperationResult::failed(
                        id,
                        FailureKind::Internal,
                        "unit task panicked",
                        0,
                        elapsed,
                    )
                })
            })
            .collect();
        BatchReport::new(results, elapsed)
    }
}

/// Run `run(unit, cancel)` for every `(id, unit)` concurrently and gather one
/// result per unit. The building block behind `execute_all` and `await_all`.
///
/// Units still queued when `cancel` fires are finalized as Canceled without
/// being started; running units observe the token themselves.
pub async fn fan_out<I, F, Fut>(
    units: Vec<(String, I)>,
    options: &BatchOptions,
    cancel: &CancelToken,
    run: F,
) -> BatchReport
where
    I: Send + 'static,
    F: Fn(I, CancelToken) -> Fut + Send,
    Fut: Future<Output = OperationResult> + Send + 'static,
{
    let started = Instant::now();
    let total = units.len();
    let limit = options.concurrency_limit.unwrap_or(total).max(1);

    let mut queue: VecDeque<(usize, I)> = VecDeque::with_capacity(total);
    let mut ids = Vec::with_capacity(total);
    for (index, (id, unit)) in units.into_iter().enumerate() {
        ids.push(id);
        queue.push_back((index, unit));
    }
    let mut collector = Collector {
        ids,
        slots: vec![None; total],
        completed: 0,
        progress_tx: options.progress_tx.as_ref(),
    };

    let mut join_set = JoinSet::new();
    loop {
        while join_set.len() < limit {
            let Some((index, unit)) = queue.pop_front() else {
                break;
            };
            if cancel.is_canceled() {
                let id = collector.ids[index].clone();
                collector.record(index, OperationResult::canceled(id, 0, Duration::ZERO));
                continue;
            }
            let fut = run(unit, cancel.clone());
            join_set.spawn(async move { (index, fut.await) });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined {
            Ok((index, result)) => collector.record(index, result),
            Err(e) => tracing::error!("batch unit task failed: {}", e),
        }
    }

    collector.finish(started)
}

/// Execute every descriptor through the retrying executor, concurrently.
pub async fn execute_all(
    executor: &RequestExecutor,
    descriptors: Vec<OperationDescriptor>,
    policy: &RetryPolicy,
    options: &BatchOptions,
    cancel: &CancelToken,
) -> BatchReport {
    warn_duplicate_ids(descriptors.iter().map(|d| d.id.as_str()));
    tracing::info!(
        units = descriptors.len(),
        limit = ?options.concurrency_limit,
        "executing batch"
    );
    let units: Vec<(String, OperationDescriptor)> = descriptors
        .into_iter()
        .map(|d| (d.id.clone(), d))
        .collect();
    let executor = executor.clone();
    let policy = *policy;
    let report = fan_out(units, options, cancel, move |descriptor, cancel| {
        let executor = executor.clone();
        async move { executor.execute(&descriptor, &policy, &cancel).await }
    })
    .await;
    log_summary("batch", &report);
    report
}

/// Await several resources concurrently, one completion poller per spec.
pub async fn await_all(
    poller: &CompletionPoller,
    specs: Vec<PollSpec>,
    options: &BatchOptions,
    cancel: &CancelToken,
) -> BatchReport {
    warn_duplicate_ids(specs.iter().map(|s| s.id.as_str()));
    tracing::info!(resources = specs.len(), "awaiting terminal states");
    let units: Vec<(String, PollSpec)> = specs
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();
    let poller = poller.clone();
    let report = fan_out(units, options, cancel, move |spec, cancel| {
        let poller = poller.clone();
        async move { poller.poll(&spec, &cancel).await.into_result() }
    })
    .await;
    log_summary("await", &report);
    report
}

fn warn_duplicate_ids<'a>(ids: impl Iterator<Item = &'a str>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            tracing::warn!(id, "duplicate unit id; by_id() returns the first");
        }
    }
}

fn log_summary(what: &str, report: &BatchReport) {
    let s = report.summary();
    tracing::info!(
        total = s.total,
        succeeded = s.succeeded,
        failed = s.failed,
        timed_out = s.timed_out,
        elapsed_ms = report.elapsed().as_millis() as u64,
        "{} finished",
        what
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Anonymous;
    use crate::operation::Method;
    use crate::transport::scripted::ScriptedTransport;
    use crate::transport::TransportResponse;
    use std::sync::Arc;

    fn url(i: usize) -> String {
        format!("https://mgmt.example.com/snapshots/disk-{}-snap", i)
    }

    fn descriptors(n: usize) -> Vec<OperationDescriptor> {
        (0..n)
            .map(|i| {
                OperationDescriptor::new(format!("disk-{}", i), Method::Put, url(i))
                    .with_body(r#"{"properties":{"creationData":{"createOption":"Copy"}}}"#)
            })
            .collect()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            honor_retry_after: true,
        }
    }

    fn executor(transport: Arc<ScriptedTransport>) -> RequestExecutor {
        RequestExecutor::new(transport, Arc::new(Anonymous))
    }

    #[tokio::test]
    async fn throttled_disks_retry_concurrently() {
        let transport = Arc::new(ScriptedTransport::new());
        for i in 0..8 {
            let throttled =
                TransportResponse::new(429, "Too Many Requests").with_header("Retry-After", "1");
            transport.script(
                &url(i),
                vec![
                    Ok(throttled.clone()),
                    Ok(throttled),
                    Ok(TransportResponse::new(201, "{}")),
                ],
            );
        }
        let started = Instant::now();
        let report = execute_all(
            &executor(Arc::clone(&transport)),
            descriptors(8),
            &fast_policy(),
            &BatchOptions::default(),
            &CancelToken::new(),
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(report.len(), 8);
        assert_eq!(report.succeeded(), 8);
        for r in report.results() {
            assert_eq!(r.attempts, 3, "{}", r.id);
        }
        // Two 1s hints per disk; sequential execution would take ~16s.
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(5), "not concurrent: {:?}", elapsed);
    }

    #[tokio::test]
    async fn failures_are_isolated_and_correlated_by_id() {
        let transport = Arc::new(ScriptedTransport::new());
        for i in 0..6 {
            let outcome = if i % 3 == 1 {
                TransportResponse::new(400, "InvalidParameter")
            } else {
                TransportResponse::new(200, format!("ok-{}", i))
            };
            transport.script(&url(i), vec![Ok(outcome)]);
        }
        let report = execute_all(
            &executor(transport),
            descriptors(6),
            &fast_policy(),
            &BatchOptions::default().with_concurrency_limit(3),
            &CancelToken::new(),
        )
        .await;

        assert_eq!(report.len(), 6);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.succeeded(), 4);
        for (i, r) in report.results().iter().enumerate() {
            assert_eq!(r.id, format!("disk-{}", i));
            if i % 3 == 1 {
                assert_eq!(r.status, OperationStatus::Failed);
                assert_eq!(r.status_code, Some(400));
                assert_eq!(r.attempts, 1);
            } else {
                assert_eq!(r.payload.as_deref(), Some(format!("ok-{}", i).as_str()));
            }
        }
        let failed_ids: Vec<&str> = report.failures().map(|(_, r)| r.id.as_str()).collect();
        assert_eq!(failed_ids, vec!["disk-1", "disk-4"]);
    }

    #[tokio::test]
    async fn concurrency_limit_bounds_in_flight_units() {
        let transport = Arc::new(ScriptedTransport::new().with_delay(Duration::from_millis(40)));
        for i in 0..6 {
            transport.script(&url(i), vec![Ok(TransportResponse::new(200, ""))]);
        }
        let report = execute_all(
            &executor(Arc::clone(&transport)),
            descriptors(6),
            &fast_policy(),
            &BatchOptions::default().with_concurrency_limit(2),
            &CancelToken::new(),
        )
        .await;
        assert!(report.all_succeeded());
        assert!(transport.max_in_flight() <= 2, "in flight: {}", transport.max_in_flight());
    }

    #[tokio::test]
    async fn unbounded_batch_overlaps_units() {
        let transport = Arc::new(ScriptedTransport::new().with_delay(Duration::from_millis(200)));
        for i in 0..6 {
            transport.script(&url(i), vec![Ok(TransportResponse::new(200, ""))]);
        }
        let report = execute_all(
            &executor(Arc::clone(&transport)),
            descriptors(6),
            &fast_policy(),
            &BatchOptions::default(),
            &CancelToken::new(),
        )
        .await;
        assert!(report.all_succeeded());
        assert!(transport.max_in_flight() > 2);
    }

    #[tokio::test]
    async fn rerun_after_recovery_is_all_succeeded() {
        let transport = Arc::new(ScriptedTransport::new());
        for i in 0..4 {
            let first = if i == 2 { 409 } else { 200 };
            transport.script(&url(i), vec![Ok(TransportResponse::new(first, ""))]);
        }
        let exec = executor(Arc::clone(&transport));
        let first = execute_all(
            &exec,
            descriptors(4),
            &fast_policy(),
            &BatchOptions::default(),
            &CancelToken::new(),
        )
        .await;
        assert_eq!(first.failed(), 1);
        assert_eq!(first.by_id("disk-2").unwrap().attempts, 3);

        for i in 0..4 {
            transport.script(&url(i), vec![Ok(TransportResponse::new(200, ""))]);
        }
        let second = execute_all(
            &exec,
            descriptors(4),
            &fast_policy(),
            &BatchOptions::default(),
            &CancelToken::new(),
        )
        .await;
        assert!(second.all_succeeded());
        for i in 0..4 {
            assert_eq!(transport.calls(&url(i)), 1);
            assert_eq!(second.get(i).unwrap().attempts, 1);
        }
    }

    #[tokio::test]
    async fn panicking_unit_still_gets_a_result() {
        let units: Vec<(String, usize)> = (0..3).map(|i| (format!("u{}", i), i)).collect();
        let opts = BatchOptions::default();
        let report = fan_out(units, &opts, &CancelToken::new(), |i, _| async move {
            if i == 1 {
                panic!("unit blew up");
            }
            OperationResult::succeeded(format!("u{}", i), None, String::new(), 1, Duration::ZERO)
        })
        .await;
        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded(), 2);
        let broken = report.get(1).unwrap();
        assert_eq!(broken.id, "u1");
        assert_eq!(broken.failure, Some(FailureKind::Internal));
    }

    #[tokio::test]
    async fn cancel_finalizes_running_and_queued_units() {
        let transport = Arc::new(ScriptedTransport::new());
        for i in 0..5 {
            transport.script(
                &url(i),
                vec![Ok(TransportResponse::new(503, "").with_header("Retry-After", "30"))],
            );
        }
        let cancel = CancelToken::new();
        let handle = {
            let exec = executor(Arc::clone(&transport));
            let cancel = cancel.clone();
            tokio::spawn(async move {
                execute_all(
                    &exec,
                    descriptors(5),
                    &fast_policy(),
                    &BatchOptions::default().with_concurrency_limit(2),
                    &cancel,
                )
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let report = tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("batch stopped")
            .unwrap();
        assert_eq!(report.len(), 5);
        assert_eq!(report.failed(), 5);
        for r in report.results() {
            assert_eq!(r.failure, Some(FailureKind::Canceled), "{}", r.id);
        }
        // Only the first two units ever reached the transport.
        let started: usize = (0..5).map(|i| transport.calls(&url(i))).sum();
        assert_eq!(started, 2);
    }

    #[tokio::test]
    async fn progress_reports_every_unit() {
        let transport = Arc::new(ScriptedTransport::new());
        for i in 0..4 {
            transport.script(&url(i), vec![Ok(TransportResponse::new(200, ""))]);
        }
        let (tx, mut rx) = mpsc::channel(16);
        let report = execute_all(
            &executor(transport),
            descriptors(4),
            &fast_policy(),
            &BatchOptions::default().with_progress(tx),
            &CancelToken::new(),
        )
        .await;
        assert!(report.all_succeeded());
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert_eq!(events.len(), 4);
        assert_eq!(events.last().unwrap().completed, 4);
        assert!(events.iter().all(|e| e.total == 4));
    }

    #[tokio::test]
    async fn await_all_mixes_outcomes() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = |s: &str| {
            let json = format!(r#"{{"properties":{{"provisioningState":"{}"}}}}"#, s);
            TransportResponse::new(200, json)
        };
        transport.script(&url(0), vec![Ok(body("Updating")), Ok(body("Succeeded"))]);
        transport.script(&url(1), vec![Ok(body("Failed"))]);
        transport.script(&url(2), vec![Ok(body("Updating"))]);
        let poller = CompletionPoller::new(executor(transport), fast_policy());
        let specs = (0..3)
            .map(|i| {
                PollSpec::provisioning(format!("disk-{}", i), url(i))
                    .with_interval(Duration::from_millis(20))
                    .with_timeout(Duration::from_millis(300))
            })
            .collect();
        let report = await_all(&poller, specs, &BatchOptions::default(), &CancelToken::new()).await;
        assert_eq!(report.get(0).unwrap().status, OperationStatus::Succeeded);
        assert_eq!(report.get(1).unwrap().status, OperationStatus::Failed);
        assert_eq!(report.get(2).unwrap().status, OperationStatus::TimedOut);
        assert_eq!(report.timed_out(), 1);
    }
}
