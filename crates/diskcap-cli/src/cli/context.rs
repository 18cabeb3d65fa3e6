//! Shared wiring for the batch commands: executor, cancellation, progress, reports.

use anyhow::{Context, Result};
use diskcap_core::batch::{BatchOptions, BatchProgress, BatchReport};
use diskcap_core::config::DiskcapConfig;
use diskcap_core::control::CancelToken;
use diskcap_core::credential::{Anonymous, CredentialSupplier, EnvToken};
use diskcap_core::operation::OperationStatus;
use diskcap_core::retry::RequestExecutor;
use diskcap_core::transport::CurlTransport;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Executor over libcurl with the token read from `cfg.token_env` on every attempt.
/// Falls back to anonymous requests when the variable is not set at startup.
pub fn build_executor(cfg: &DiskcapConfig) -> RequestExecutor {
    let credentials: Arc<dyn CredentialSupplier> = if std::env::var_os(&cfg.token_env).is_some() {
        Arc::new(EnvToken::new(cfg.token_env.clone()))
    } else {
        tracing::info!("{} not set; sending requests without a bearer token", cfg.token_env);
        Arc::new(Anonymous)
    };
    let transport = CurlTransport::new()
        .with_user_agent(concat!("diskcap/", env!("CARGO_PKG_VERSION")));
    RequestExecutor::new(Arc::new(transport), credentials).with_timeouts(cfg.request_timeouts())
}

/// Token canceled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, canceling outstanding operations");
            tracing::info!("ctrl-c: canceling batch");
            token.cancel();
        }
    });
    cancel
}

/// Batch options plus a task printing one line per finished unit.
pub fn batch_options(
    cfg: &DiskcapConfig,
    concurrency: Option<usize>,
) -> (BatchOptions, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<BatchProgress>(64);
    let mut opts = BatchOptions::default().with_progress(tx);
    opts.concurrency_limit = concurrency.or(cfg.concurrency_limit);
    let printer = tokio::spawn(async move {
        while let Some(p) = rx.recv().await {
            eprintln!(
                "  [{}/{}] {} {}",
                p.completed,
                p.total,
                p.id,
                status_label(p.status)
            );
        }
    });
    (opts, printer)
}

pub fn status_label(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Succeeded => "succeeded",
        OperationStatus::Failed => "failed",
        OperationStatus::TimedOut => "timed out",
    }
}

/// Print the per-unit table and summary; returns true when every unit succeeded.
pub fn print_report(report: &BatchReport) -> bool {
    println!(
        "{:<24} {:<10} {:>6} {:>8} {:>10}  ERROR",
        "ID", "STATUS", "HTTP", "ATTEMPTS", "ELAPSED"
    );
    for r in report.results() {
        let code = r
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<10} {:>6} {:>8} {:>9.1}s  {}",
            r.id,
            status_label(r.status),
            code,
            r.attempts,
            r.elapsed.as_secs_f64(),
            r.error.as_deref().unwrap_or("")
        );
    }
    let s = report.summary();
    println!(
        "{} total, {} succeeded, {} failed, {} timed out in {:.1}s",
        s.total,
        s.succeeded,
        s.failed,
        s.timed_out,
        report.elapsed().as_secs_f64()
    );
    report.all_succeeded()
}

pub fn write_report(path: &Path, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    tracing::info!("wrote report to {}", path.display());
    Ok(())
}

pub fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))
}
