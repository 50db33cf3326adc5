//! Data types for QA tasks, findings and run results.
//!
//! [`RunResult`] is the single object a run returns. The orchestrator fills
//! it step by step; [`RunResult::apply_evidence_gate`] is the last thing
//! that touches it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::TokenUsage;
use super::tool::{ToolCall, ToolExecutionResult};

/// Objective used when a task does not name one.
pub const DEFAULT_OBJECTIVE: &str =
    "Explore main user flows and report functional, UX, accessibility, performance, and security issues.";

/// Identifier of the synthesized finding emitted when tooling produced no evidence.
pub const TOOLING_BLOCKER_ID: &str = "QA-TOOLING-BLOCKED";

/// Maximum number of tool errors listed in the tooling blocker.
const MAX_BLOCKER_ERRORS: usize = 5;

/// Input for one QA run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTask {
    /// What to test (typically a URL).
    pub target: String,
    /// Testing objective handed to the model.
    pub objective: String,
    /// Extra key/value context rendered into the user prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl QaTask {
    /// Creates a task for `target` with the default objective.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            objective: DEFAULT_OBJECTIVE.to_string(),
            context: None,
        }
    }

    /// Overrides the objective.
    #[must_use]
    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = objective.into();
        self
    }

    /// Sets the additional context.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = (!context.is_empty()).then_some(context);
        self
    }
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Testing could not proceed.
    Blocker,
    /// Breaks a primary flow.
    High,
    /// Degrades a flow but has a workaround.
    Medium,
    /// Cosmetic or minor.
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocker => "blocker",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

/// Typed shape of a single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable identifier, if the reporter assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// One-line summary.
    pub title: String,
    /// How bad it is.
    pub severity: Severity,
    /// What was observed.
    pub description: String,
    /// Area of the finding (functional, accessibility, tooling, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Ordered reproduction steps.
    #[serde(default)]
    pub steps_to_reproduce: Vec<String>,
}

impl Issue {
    /// Builds the blocker finding reported when no tool produced evidence.
    ///
    /// `errors` become the reproduction steps; an empty list is replaced by
    /// a single explanatory line.
    #[must_use]
    pub fn tooling_blocker(errors: Vec<String>) -> Self {
        let steps_to_reproduce = if errors.is_empty() {
            vec!["No tool was invoked or returned output before the run ended.".to_string()]
        } else {
            errors
        };
        Self {
            id: Some(TOOLING_BLOCKER_ID.to_string()),
            title: "QA tooling failed before evidence could be collected".to_string(),
            severity: Severity::Blocker,
            description: "Every tool invocation in this run failed or returned nothing, so no \
                          screenshot or tool output backs the model's conclusions. Findings \
                          were withheld until the tooling can be fixed and the run repeated."
                .to_string(),
            category: Some("tooling".to_string()),
            steps_to_reproduce,
        }
    }

    /// Converts the issue into the free-form map shape used in [`RunResult::issues`].
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model answered without requesting tools.
    #[default]
    Completed,
    /// The step bound was reached while the model still requested tools.
    IterationLimit,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::IterationLimit => f.write_str("iteration_limit"),
        }
    }
}

/// One loop iteration as recorded in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// 1-based step number.
    pub step: usize,
    /// Assistant text for this step (may be empty).
    pub assistant_content: String,
    /// Tool calls requested in this step, in model order.
    pub tool_calls: Vec<ToolCall>,
}

/// Final result of a QA run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    /// Extracted findings, or exactly one tooling blocker.
    pub issues: Vec<Map<String, Value>>,
    /// Text of the last assistant turn.
    pub raw_model_output: Option<String>,
    /// Every tool result, in execution order.
    pub tool_outputs: Vec<ToolExecutionResult>,
    /// Screenshot artifacts, in capture order.
    pub screenshots: Vec<String>,
    /// One entry per loop step.
    pub trace: Vec<TraceEntry>,
    /// Why the loop stopped.
    pub termination: Termination,
    /// Token usage summed over all model turns.
    pub usage: TokenUsage,
    /// Wall-clock duration of the run.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

impl RunResult {
    /// Returns `true` if any tool produced a screenshot or non-blank successful output.
    #[must_use]
    pub fn has_evidence(&self) -> bool {
        !self.screenshots.is_empty() || self.tool_outputs.iter().any(ToolExecutionResult::is_evidence)
    }

    /// Distinct tool error messages in first-seen order, capped at five.
    #[must_use]
    pub fn tool_errors(&self) -> Vec<String> {
        let mut errors: Vec<String> = Vec::new();
        for message in self
            .tool_outputs
            .iter()
            .filter(|r| !r.success)
            .filter_map(|r| r.error.as_deref())
        {
            if errors.len() == MAX_BLOCKER_ERRORS {
                break;
            }
            if !errors.iter().any(|seen| seen == message) {
                errors.push(message.to_string());
            }
        }
        errors
    }

    /// Replaces the issues with a single tooling blocker when the run holds no evidence.
    ///
    /// Returns `true` if the gate fired.
    pub fn apply_evidence_gate(&mut self) -> bool {
        if self.has_evidence() {
            return false;
        }
        self.issues = vec![Issue::tooling_blocker(self.tool_errors()).into_map()];
        true
    }
}
