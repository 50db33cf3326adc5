//! Tool contract and the data shapes that flow through it.
//!
//! A [`Tool`] is an externally executable capability the model can invoke
//! by name. Tools publish a [`ToolDefinition`] (JSON Schema for their
//! arguments) and answer every invocation with a [`ToolExecutionResult`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Default per-call timeout when a tool does not override [`Tool::timeout`].
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Decoded tool-call arguments.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique within a collection).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation token assigned by the provider.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Decoded arguments. Undecodable payloads arrive as `{"raw_arguments": "..."}`.
    pub arguments: ToolArguments,
}

/// Outcome envelope of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Whether the tool did what was asked.
    pub success: bool,
    /// Textual output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error message for failed invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Base64-encoded screenshot artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Free-form tool metadata (URL visited, exit code, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolExecutionResult {
    /// Successful result carrying text output.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            ..Self::default()
        }
    }

    /// Successful result carrying a screenshot artifact.
    #[must_use]
    pub fn screenshot(image_base64: impl Into<String>) -> Self {
        Self {
            success: true,
            screenshot: Some(image_base64.into()),
            ..Self::default()
        }
    }

    /// Failed result with an error message.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Returns `true` if this result counts as evidence about the target:
    /// a screenshot, or a successful run with non-blank text output.
    #[must_use]
    pub fn is_evidence(&self) -> bool {
        self.screenshot.is_some()
            || (self.success
                && self
                    .output
                    .as_deref()
                    .is_some_and(|out| !out.trim().is_empty()))
    }

    /// Renders the result as the text of a tool-role message.
    #[must_use]
    pub fn to_message(&self) -> String {
        if self.success {
            if let Some(output) = self.output.as_deref().filter(|o| !o.is_empty()) {
                return output.to_string();
            }
            if self.screenshot.is_some() {
                return "Screenshot captured".to_string();
            }
            return "Tool executed successfully".to_string();
        }
        format!(
            "Tool execution failed: {}",
            self.error.as_deref().unwrap_or("unknown error")
        )
    }
}

impl From<ToolError> for ToolExecutionResult {
    fn from(err: ToolError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Contract implemented by every tool.
///
/// `execute` returns `Ok` with a failed [`ToolExecutionResult`] for anything
/// the model can react to (bad input, timeouts, downstream errors). `Err`
/// is reserved for failures the tool cannot describe itself; the
/// [`ToolCollection`](super::collection::ToolCollection) still contains them.
///
/// Tools may keep session state between calls within one run. They are
/// invoked strictly one at a time.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn input_schema(&self) -> serde_json::Value;

    /// Maximum time a single invocation may take.
    fn timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    /// Machine-readable schema advertised to the provider.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.input_schema(),
        }
    }

    /// Runs the tool.
    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolExecutionResult, ToolError>;

    /// Releases sessions, subprocesses and other resources.
    async fn close(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Formats a duration the way tool and provider errors report it:
/// whole seconds as `"30s"`, anything finer as milliseconds.
#[must_use]
#[allow(clippy::trivially_copy_pass_by_ref)]
pub fn format_duration(duration: &Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(&Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(&Duration::from_millis(1500)), "1500ms");
    }

    #[test]
    fn test_result_to_message() {
        assert_eq!(ToolExecutionResult::ok("page title: Home").to_message(), "page title: Home");
        assert_eq!(
            ToolExecutionResult::screenshot("aGVsbG8=").to_message(),
            "Screenshot captured"
        );
        let empty = ToolExecutionResult {
            success: true,
            ..ToolExecutionResult::default()
        };
        assert_eq!(empty.to_message(), "Tool executed successfully");
        assert_eq!(
            ToolExecutionResult::failure("element not found").to_message(),
            "Tool execution failed: element not found"
        );
        let bare_failure = ToolExecutionResult::default();
        assert_eq!(bare_failure.to_message(), "Tool execution failed: unknown error");
    }

    #[test]
    fn test_is_evidence() {
        assert!(ToolExecutionResult::ok("200 OK").is_evidence());
        assert!(ToolExecutionResult::screenshot("aGVsbG8=").is_evidence());
        assert!(!ToolExecutionResult::ok("   ").is_evidence());
        assert!(!ToolExecutionResult::failure("boom").is_evidence());

        // a failed call that still returned text is not evidence
        let mut failed_with_output = ToolExecutionResult::failure("exit 1");
        failed_with_output.output = Some("partial".to_string());
        assert!(!failed_with_output.is_evidence());
    }

    #[test]
    fn test_from_tool_error() {
        let result: ToolExecutionResult = ToolError::NotRegistered {
            name: "fly".to_string(),
        }
        .into();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool 'fly' not registered"));
    }

    #[test]
    fn test_result_serialization_skips_empty_fields() {
        let result = ToolExecutionResult::ok("done").with_metadata("exit_code", 0);
        let value = serde_json::to_value(&result).unwrap_or_default();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["metadata"]["exit_code"], json!(0));
        assert!(value.get("error").is_none());
        assert!(value.get("screenshot").is_none());
    }

    #[test]
    fn test_tool_call_serialization() {
        let mut arguments = ToolArguments::new();
        arguments.insert("command".to_string(), json!("ls"));
        let call = ToolCall {
            id: "call_123".to_string(),
            name: "bash".to_string(),
            arguments,
        };
        let json = serde_json::to_string(&call).unwrap_or_default();
        assert!(json.contains("call_123"));
        assert!(json.contains("\"command\":\"ls\""));
    }
}
