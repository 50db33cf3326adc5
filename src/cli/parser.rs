//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qa-agent: autonomous QA exploration driven by an LLM.
///
/// Lets a language model drive a set of tools against a target and
/// reports the issues it finds, backed by the evidence the tools gathered.
#[derive(Parser, Debug)]
#[command(name = "qa-agent")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a QA exploration against a target.
    ///
    /// The model drives the built-in tools until it stops requesting them or
    /// the step bound is reached, then reports issues as JSON. When no tool
    /// produced evidence the report is a single tooling blocker.
    #[command(after_help = r#"Examples:
  qa-agent run https://example.com
  qa-agent run https://shop.example.com --objective "Test the checkout flow"
  qa-agent run https://example.com --context account=demo@example.com --context plan=free
  qa-agent run https://example.com --provider openai --model gpt-4o-mini
  qa-agent --format json run https://example.com | jq '.issues'
  MISTRAL_API_KEY=... qa-agent run https://example.com --max-iterations 10
"#)]
    Run {
        /// Target to test (typically a URL).
        target: String,

        /// Testing objective handed to the model.
        #[arg(short, long)]
        objective: Option<String>,

        /// Extra context as key=value (repeatable).
        #[arg(short, long = "context", value_parser = parse_key_val)]
        context: Vec<(String, String)>,

        /// LLM provider (mistral, openai, huggingface).
        #[arg(long)]
        provider: Option<String>,

        /// Model identifier.
        #[arg(long)]
        model: Option<String>,

        /// Base URL override for OpenAI-compatible endpoints.
        #[arg(long)]
        base_url: Option<String>,

        /// Maximum number of model turns.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Sampling temperature (0.0-2.0).
        #[arg(long)]
        temperature: Option<f32>,

        /// Maximum tokens per model turn.
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Maximum provider attempts per model turn.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,

        /// Do not give the model a bash session.
        #[arg(long)]
        no_bash: bool,
    },

    /// List the built-in tools and their argument schemas.
    #[command(after_help = r#"Examples:
  qa-agent tools
  qa-agent --format json tools | jq '.[].name'
"#)]
    Tools,

    /// Write default prompt templates to disk for customization.
    ///
    /// Creates markdown template files in the prompt directory so the
    /// system prompt can be edited without recompiling.
    #[command(name = "init-prompts")]
    #[command(after_help = r#"Examples:
  qa-agent init-prompts                        # Write to ~/.config/qa-agent/prompts/
  qa-agent init-prompts --dir ./my-prompts     # Write to custom directory
"#)]
    InitPrompts {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/qa-agent/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Parses a `key=value` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value: no '=' found in '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
