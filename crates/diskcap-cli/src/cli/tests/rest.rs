//! Tests for config, completions, manpage and global flags.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use clap_complete::Shell;

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["diskcap", "config"]), CliCommand::Config));
}

#[test]
fn cli_parse_global_config_flag() {
    let cli = Cli::try_parse_from(["diskcap", "--config", "/etc/diskcap.toml", "config"]).unwrap();
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("/etc/diskcap.toml"))
    );
    let cli = Cli::try_parse_from(["diskcap", "exec", "x.json", "--config", "c.toml"]).unwrap();
    assert!(cli.config.is_some());
}

#[test]
fn cli_parse_completions() {
    match parse(&["diskcap", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Bash),
        _ => panic!("expected Completions"),
    }
    assert!(Cli::try_parse_from(["diskcap", "completions", "cmd.exe"]).is_err());
}

#[test]
fn cli_parse_manpage() {
    assert!(matches!(parse(&["diskcap", "manpage"]), CliCommand::Manpage));
}

#[test]
fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
