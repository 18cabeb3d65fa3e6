//! `diskcap poll` – poll one resource until it is terminal.

use anyhow::Result;
use clap::Args;
use diskcap_core::config::DiskcapConfig;
use diskcap_core::poller::{CompletionPoller, PollSpec, PollState};
use std::time::Duration;

use crate::cli::context;

#[derive(Debug, Clone, Args)]
pub struct PollArgs {
    /// Resource URL to read.
    pub url: String,
    /// Identifier used in logs and output (default: the URL).
    #[arg(long)]
    pub id: Option<String>,
    /// Value for the `api-version` query parameter.
    #[arg(long, value_name = "VERSION")]
    pub api_version: Option<String>,
    /// JSON pointer of the state field (default /properties/provisioningState).
    #[arg(long, value_name = "POINTER")]
    pub state_pointer: Option<String>,
    /// State value that means success (repeatable; default Succeeded).
    #[arg(long = "success", value_name = "STATE")]
    pub success: Vec<String>,
    /// State value that means failure (repeatable; default Failed, Canceled).
    #[arg(long = "failure", value_name = "STATE")]
    pub failure: Vec<String>,
    /// Seconds between reads (default from config).
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
    /// Overall deadline in seconds (default from config).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl PollArgs {
    pub fn to_spec(&self, cfg: &DiskcapConfig) -> PollSpec {
        let id = self.id.clone().unwrap_or_else(|| self.url.clone());
        let mut spec = PollSpec::provisioning(id, self.url.clone())
            .with_interval(
                self.interval
                    .map(|s| Duration::from_secs(s.max(1)))
                    .unwrap_or_else(|| cfg.poll_interval()),
            )
            .with_timeout(
                self.timeout
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

pub async fn run_poll(cfg: &DiskcapConfig, args: PollArgs) -> Result<bool> {
    let spec = args.to_spec(cfg);
    let poller = CompletionPoller::new(context::build_executor(cfg), cfg.retry_policy());
    let cancel = context::cancel_on_ctrl_c();

    let outcome = poller.poll(&spec, &cancel).await;
    println!(
        "{}: {:?} (last state {}, {} reads, {} missed, {:.1}s){}",
        outcome.id,
        outcome.state,
        outcome.last_state.as_deref().unwrap_or("-"),
        outcome.ticks,
        outcome.missed_ticks,
        outcome.elapsed.as_secs_f64(),
        if outcome.canceled { " canceled" } else { "" }
    );
    Ok(outcome.state == PollState::Succeeded)
}
