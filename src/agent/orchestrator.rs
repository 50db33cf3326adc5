//! The model/tool loop driving one QA run.
//!
//! Each step sends the whole conversation plus the tool schemas to the
//! provider, records the assistant turn, and dispatches any requested tool
//! calls one at a time in the order the model gave them. The loop ends when
//! the model stops asking for tools or the step bound is reached.
//!
//! ```text
//! system + user
//!   └─ step n: provider.generate
//!        ├── assistant (text + tool calls)  → trace
//!        └── for each call: ToolCollection::run → tool message
//! extract_issues(last text) → evidence gate → RunResult
//! ```

use std::time::Instant;

use tracing::{debug, info, warn};

use super::collection::ToolCollection;
use super::config::AgentConfig;
use super::finding::{RunResult, Termination, TraceEntry};
use super::message::{ChatRequest, assistant_message, system_message, tool_message, user_message};
use super::parsing::extract_issues;
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Longest tool message handed back to the model, in characters.
pub const MAX_TOOL_MESSAGE_CHARS: usize = 20_000;

const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Loop parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    /// Maximum number of model turns.
    pub max_iterations: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Max tokens per model turn.
    pub max_tokens: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

impl From<&AgentConfig> for LoopSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Drives one run against a provider and a tool collection.
pub struct Orchestrator<'a> {
    provider: &'a dyn LlmProvider,
    tools: &'a ToolCollection,
    settings: LoopSettings,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator over borrowed collaborators.
    #[must_use]
    pub fn new(
        provider: &'a dyn LlmProvider,
        tools: &'a ToolCollection,
        settings: LoopSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Runs the loop to completion.
    ///
    /// Tool failures of any kind are recorded and fed back to the model; only
    /// a provider failure that survived its retries aborts the run.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Provider`] when a model turn cannot be obtained.
    pub async fn execute(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<RunResult, AgentError> {
        let started = Instant::now();
        let mut result = RunResult {
            termination: Termination::IterationLimit,
            ..RunResult::default()
        };

        let mut request = ChatRequest {
            messages: vec![system_message(system_prompt), user_message(user_prompt)],
            tools: self.tools.definitions(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            tools = ?self.tools.names(),
            max_iterations = self.settings.max_iterations,
            "starting QA run"
        );

        for step in 1..=self.settings.max_iterations {
            let response = self.provider.generate(&request).await?;
            result.usage.accumulate(response.usage);

            let content = response.content.unwrap_or_default();
            let tool_calls = response.tool_calls;

            request
                .messages
                .push(assistant_message(&content, tool_calls.clone()));
            result.trace.push(TraceEntry {
                step,
                assistant_content: content.clone(),
                tool_calls: tool_calls.clone(),
            });
            result.raw_model_output = Some(content);

            if tool_calls.is_empty() {
                debug!(step, "model finished without tool calls");
                result.termination = Termination::Completed;
                break;
            }

            debug!(step, tool_count = tool_calls.len(), "dispatching tool calls");

            for call in &tool_calls {
                let outcome = self.tools.run(&call.name, &call.arguments).await;
                debug!(
                    step,
                    tool = %call.name,
                    call_id = %call.id,
                    success = outcome.success,
                    "tool call complete"
                );

                if let Some(screenshot) = &outcome.screenshot {
                    result.screenshots.push(screenshot.clone());
                }
                let text = cap_tool_message(outcome.to_message());
                request
                    .messages
                    .push(tool_message(&call.id, &call.name, &text));
                result.tool_outputs.push(outcome);
            }
        }

        result.issues = extract_issues(result.raw_model_output.as_deref().unwrap_or_default());

        if result.apply_evidence_gate() {
            warn!(
                tool_results = result.tool_outputs.len(),
                "no tool produced evidence, reporting tooling blocker"
            );
        }

        result.elapsed = started.elapsed();
        info!(
            steps = result.trace.len(),
            termination = %result.termination,
            issues = result.issues.len(),
            screenshots = result.screenshots.len(),
            total_tokens = result.usage.total_tokens,
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "QA run finished"
        );

        Ok(result)
    }
}

/// Truncates a tool message to [`MAX_TOOL_MESSAGE_CHARS`] characters.
fn cap_tool_message(text: String) -> String {
    match text.char_indices().nth(MAX_TOOL_MESSAGE_CHARS) {
        None => text,
        Some((cut, _)) => {
            let mut capped = text;
            capped.truncate(cut);
            capped.push_str(TRUNCATION_MARKER);
            capped
        }
    }
}
