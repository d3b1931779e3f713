//! Command-line interface for question-certify.
//!
//! Provides commands for validating submission files and listing the
//! supported templates.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
