//! `diskcap exec` – run a file of operation descriptors as one batch.

use anyhow::Result;
use diskcap_core::batch;
use diskcap_core::config::DiskcapConfig;
use diskcap_core::operation::OperationDescriptor;
use std::path::Path;

use crate::cli::context;

pub async fn run_exec(
    cfg: &DiskcapConfig,
    file: &Path,
    concurrency: Option<usize>,
    report_path: Option<&Path>,
) -> Result<bool> {
    let descriptors: Vec<OperationDescriptor> = context::read_json_array(file)?;
    if descriptors.is_empty() {
        println!("no operations in {}", file.display());
        return Ok(true);
    }
    tracing::info!(count = descriptors.len(), "exec batch from {}", file.display());

    let executor = context::build_executor(cfg);
    let cancel = context::cancel_on_ctrl_c();
    let (opts, printer) = context::batch_options(cfg, concurrency);

    let report =
        batch::execute_all(&executor, descriptors, &cfg.retry_policy(), &opts, &cancel).await;
    drop(opts);
    let _ = printer.await;

    let ok = context::print_report(&report);
    if let Some(path) = report_path {
        context::write_report(path, &report)?;
    }
    Ok(ok)
}
