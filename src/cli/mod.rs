//! Command-line interface for blendforge.
//!
//! Provides commands for schema migration, job submission and polling,
//! running workers, and inline synthesis.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
