//! Command implementations.
//!
//! Each command returns its rendered output; `main` decides where it goes.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::agent::config::AgentConfig;
use crate::agent::engine::QaEngine;
use crate::agent::finding::QaTask;
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_run_result, format_tool_list};
use crate::cli::parser::{Cli, Commands};
use crate::error::{AgentError, CommandError, Result};
use crate::tools::builtin_tools;

/// Parameters for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunParams<'a> {
    /// Target to test.
    pub target: &'a str,
    /// Optional objective override.
    pub objective: Option<&'a str>,
    /// Extra key/value context.
    pub context: &'a [(String, String)],
    /// Provider override.
    pub provider: Option<&'a str>,
    /// Model override.
    pub model: Option<&'a str>,
    /// Base URL override.
    pub base_url: Option<&'a str>,
    /// Step bound override.
    pub max_iterations: Option<usize>,
    /// Temperature override.
    pub temperature: Option<f32>,
    /// Max tokens override.
    pub max_tokens: Option<u32>,
    /// Provider attempts override.
    pub max_retries: Option<u32>,
    /// Prompt directory override.
    pub prompt_dir: Option<&'a Path>,
    /// Disables the bash tool.
    pub no_bash: bool,
}

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run {
            target,
            objective,
            context,
            provider,
            model,
            base_url,
            max_iterations,
            temperature,
            max_tokens,
            max_retries,
            prompt_dir,
            no_bash,
        } => {
            let params = RunParams {
                target,
                objective: objective.as_deref(),
                context,
                provider: provider.as_deref(),
                model: model.as_deref(),
                base_url: base_url.as_deref(),
                max_iterations: *max_iterations,
                temperature: *temperature,
                max_tokens: *max_tokens,
                max_retries: *max_retries,
                prompt_dir: prompt_dir.as_deref(),
                no_bash: *no_bash,
            };
            cmd_run(&params, format)
        }
        Commands::Tools => Ok(cmd_tools(format)),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds the agent configuration: explicit flags first, then environment, then defaults.
///
/// # Errors
///
/// Returns [`AgentError::Config`] when the resulting configuration is invalid.
pub fn build_config(params: &RunParams<'_>) -> std::result::Result<AgentConfig, AgentError> {
    let mut builder = AgentConfig::builder();
    if let Some(provider) = params.provider {
        builder = builder.provider(provider);
    }
    if let Some(model) = params.model {
        builder = builder.model(model);
    }
    if let Some(url) = params.base_url {
        builder = builder.base_url(url);
    }
    if let Some(n) = params.max_iterations {
        builder = builder.max_iterations(n);
    }
    if let Some(t) = params.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = params.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(n) = params.max_retries {
        builder = builder.max_retries(n);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    Ok(builder.env_fallback().build()?)
}

fn build_task(params: &RunParams<'_>) -> QaTask {
    let mut task = QaTask::new(params.target);
    if let Some(objective) = params.objective {
        task = task.with_objective(objective);
    }
    let context: Map<String, Value> = params
        .context
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    task.with_context(context)
}

fn cmd_run(params: &RunParams<'_>, format: OutputFormat) -> Result<String> {
    let config = build_config(params)?;
    let engine = QaEngine::from_config(&config)?;
    let task = build_task(params);
    let tools = builtin_tools(!params.no_bash);

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let result = rt.block_on(engine.run_task(&task, tools))?;

    match format {
        OutputFormat::Text => Ok(format_run_result(&result)),
        OutputFormat::Json => serde_json::to_string_pretty(&result).map_err(|e| {
            CommandError::OutputFormat(format!("JSON serialization failed: {e}")).into()
        }),
    }
}

fn cmd_tools(format: OutputFormat) -> String {
    let definitions: Vec<_> = builtin_tools(true).iter().map(|t| t.definition()).collect();
    match format {
        OutputFormat::Text => format_tool_list(&definitions),
        OutputFormat::Json => format.to_json(&definitions),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    output.push_str("  ");
                    output.push_str(
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown"),
                    );
                    output.push('\n');
                }
                output.push_str("\nEdit these files to customize the system prompt.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
