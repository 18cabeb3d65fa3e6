//! `diskcap wait` – await a file of poll targets as one batch.

use anyhow::Result;
use diskcap_core::batch;
use diskcap_core::config::DiskcapConfig;
use diskcap_core::poller::{CompletionPoller, PollSpec};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::cli::context;

/// What a target's state field reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitKind {
    /// `properties.provisioningState` reaches Succeeded.
    #[default]
    Provisioning,
    /// `properties.completionPercent` reaches 100.
    Copy,
}

/// One entry of the `wait` input file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WaitTarget {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub kind: WaitKind,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub state_pointer: Option<String>,
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub failure: Vec<String>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl WaitTarget {
    pub fn to_spec(&self, cfg: &DiskcapConfig) -> PollSpec {
        let base = match self.kind {
            WaitKind::Provisioning => PollSpec::provisioning(self.id.clone(), self.url.clone()),
            WaitKind::Copy => PollSpec::copy_completion(self.id.clone(), self.url.clone()),
        };
        let mut spec = base
            .with_interval(
                self.interval_secs
                    .map(|s| Duration::from_secs(s.max(1)))
                    .unwrap_or_else(|| cfg.poll_interval()),
            )
            .with_timeout(
                self.timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| cfg.poll_timeout()),
            );
        if let Some(v) = &self.api_version {
            spec = spec.with_api_version(v.clone());
        }
        if let Some(p) = &self.state_pointer {
            spec = spec.with_state_pointer(p.clone());
        }
        if !self.success.is_empty() {
            spec = spec.with_success_states(self.success.clone());
        }
        if !self.failure.is_empty() {
            spec = spec.with_failure_states(self.failure.clone());
        }
        spec
    }
}

pub async fn run_wait(
    cfg: &DiskcapConfig,
    file: &Path,
    concurrency: Option<usize>,
    report_path: Option<&Path>,
) -> Result<bool> {
    let targets: Vec<WaitTarget> = context::read_json_array(file)?;
    if targets.is_empty() {
        println!("no poll targets in {}", file.display());
        return Ok(true);
    }
    let specs: Vec<PollSpec> = targets.iter().map(|t| t.to_spec(cfg)).collect();
    tracing::info!(count = specs.len(), "wait batch from {}", file.display());

    let poller = CompletionPoller::new(context::build_executor(cfg), cfg.retry_policy());
    let cancel = context::cancel_on_ctrl_c();
    let (opts, printer) = context::batch_options(cfg, concurrency);

    let report = batch::await_all(&poller, specs, &opts, &cancel).await;
    drop(opts);
    let _ = printer.await;

    let ok = context::print_report(&report);
    if let Some(path) = report_path {
        context::write_report(path, &report)?;
    }
    Ok(ok)
}
