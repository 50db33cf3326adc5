//! CLI layer for qa-agent.
//!
//! Provides the command-line interface using clap, with commands
//! for running explorations, listing tools and scaffolding prompts.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
