//! Command-line interface for codesniff.
//!
//! Provides the `download` and `check` commands.

mod commands;

pub use commands::{
    parse_cli, run, run_with_cli, CheckArgs, Cli, Commands, DownloadArgs, ToolArgs, EXIT_ERROR,
    EXIT_VIOLATIONS,
};
