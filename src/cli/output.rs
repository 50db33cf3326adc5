//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;

use crate::agent::finding::RunResult;
use crate::agent::tool::ToolDefinition;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, falling back to text for anything unknown.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes a value as pretty JSON.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Renders a run result for a terminal.
#[must_use]
pub fn format_run_result(result: &RunResult) -> String {
    let mut output = String::new();

    if result.issues.is_empty() {
        output.push_str("No issues found.\n");
    } else {
        let _ = writeln!(output, "Issues ({}):", result.issues.len());
        for (i, issue) in result.issues.iter().enumerate() {
            let severity = field(issue.get("severity")).unwrap_or_else(|| "unknown".to_string());
            let title = field(issue.get("title")).unwrap_or_else(|| "(untitled)".to_string());
            let _ = write!(output, "\n{}. [{}] {title}", i + 1, severity.to_uppercase());
            if let Some(id) = field(issue.get("id")) {
                let _ = write!(output, " ({id})");
            }
            output.push('\n');
            if let Some(description) = field(issue.get("description")) {
                let _ = writeln!(output, "   {description}");
            }
            if let Some(Value::Array(steps)) = issue.get("steps_to_reproduce") {
                for (n, step) in steps.iter().enumerate() {
                    let step = field(Some(step)).unwrap_or_default();
                    let _ = writeln!(output, "   {}) {step}", n + 1);
                }
            }
        }
    }

    let failed = result.tool_outputs.iter().filter(|r| !r.success).count();
    let _ = write!(
        output,
        "\n---\nSteps: {} ({}) | Tool calls: {} ({failed} failed) | Screenshots: {} | Tokens: {} | Time: {:.1}s\n",
        result.trace.len(),
        result.termination,
        result.tool_outputs.len(),
        result.screenshots.len(),
        result.usage.total_tokens,
        result.elapsed.as_secs_f64()
    );

    output
}

/// Renders tool definitions for a terminal.
#[must_use]
pub fn format_tool_list(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return "No built-in tools.\n".to_string();
    }
    let mut output = String::new();
    for tool in tools {
        let _ = writeln!(output, "{}\n  {}", tool.name, tool.description);
        if let Some(Value::Object(props)) = tool.parameters.get("properties") {
            let names: Vec<&str> = props.keys().map(String::as_str).collect();
            let _ = writeln!(output, "  arguments: {}", names.join(", "));
        }
    }
    output
}

fn field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
