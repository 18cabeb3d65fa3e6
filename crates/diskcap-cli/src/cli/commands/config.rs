//! `diskcap config` – show where the config lives and what is in effect.

use anyhow::Result;
use diskcap_core::config::{self, DiskcapConfig};
use std::path::Path;

pub fn run_config(cfg: &DiskcapConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    let policy = cfg.retry_policy();
    println!(
        "# effective retry: {} attempts, base {:?}, max {:?}, honor Retry-After {}",
        policy.max_attempts, policy.base_delay, policy.max_delay, policy.honor_retry_after
    );
    Ok(())
}
