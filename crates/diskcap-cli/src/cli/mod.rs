//! CLI for the diskcap remote-operation runner.

mod commands;
mod context;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use diskcap_core::config;
use std::path::PathBuf;

use commands::{
    run_completions, run_config, run_exec, run_manpage, run_poll, run_wait, PollArgs,
};

/// Top-level CLI for diskcap.
#[derive(Debug, Parser)]
#[command(name = "diskcap")]
#[command(
    about = "diskcap: fan-out of snapshot/restore calls with retry and completion polling",
    long_about = None
)]
pub struct Cli {
    /// Use this config file instead of ~/.config/diskcap/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run a JSON array of operation descriptors concurrently.
    Exec {
        /// Path to the descriptor file.
        file: PathBuf,
        /// Maximum operations in flight (default from config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Write the batch report as JSON to this path.
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Poll one resource until it reaches a terminal state.
    Poll(PollArgs),

    /// Await a JSON array of poll targets concurrently.
    Wait {
        /// Path to the poll target file.
        file: PathBuf,
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Print the config path and the effective configuration.
    Config,

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },

    /// Print a roff man page to stdout.
    Manpage,
}

impl CliCommand {
    /// Returns Ok(false) when the command ran but some unit did not succeed.
    pub async fn run_from_args() -> Result<bool> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        let ok = match cli.command {
            CliCommand::Exec {
                file,
                concurrency,
                report,
            } => run_exec(&cfg, &file, concurrency, report.as_deref()).await?,
            CliCommand::Poll(args) => run_poll(&cfg, args).await?,
            CliCommand::Wait {
                file,
                concurrency,
                report,
            } => run_wait(&cfg, &file, concurrency, report.as_deref()).await?,
            CliCommand::Config => {
                run_config(&cfg, cli.config.as_deref())?;
                true
            }
            CliCommand::Completions { shell } => {
                run_completions(shell);
                true
            }
            CliCommand::Manpage => {
                run_manpage()?;
                true
            }
        };

        Ok(ok)
    }
}

#[cfg(test)]
mod tests;
