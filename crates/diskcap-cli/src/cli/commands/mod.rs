//! CLI command handlers, one file per command.

mod completions;
mod config;
mod exec;
mod manpage;
mod poll;
mod wait;

pub use completions::run_completions;
pub use config::run_config;
pub use exec::run_exec;
pub use manpage::run_manpage;
pub use poll::{run_poll, PollArgs};
pub use wait::run_wait;
