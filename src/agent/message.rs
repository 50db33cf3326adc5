//! Provider-agnostic message types for LLM communication.
//!
//! These types decouple the agent loop from any specific LLM SDK,
//! so the same orchestrator works across `OpenAI`, Mistral, etc.

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolDefinition};

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
    /// Tool result.
    Tool,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Participant name (the tool name for `Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool call ID this message responds to (only for `Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by the assistant (only for `Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// A chat completion request (provider-agnostic).
///
/// The model identifier is a property of the provider, not of the request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions advertised to the model.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature (0.0–2.0).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// Token usage statistics from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Adds another completion's usage to this running total.
    pub const fn accumulate(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// A chat completion response (provider-agnostic).
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Generated text content, if any.
    pub content: Option<String>,
    /// Tool calls requested by the model, in the order the model gave them.
    pub tool_calls: Vec<ToolCall>,
    /// Raw backend payload, kept for diagnostics.
    pub raw: serde_json::Value,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Finish reason from the model (e.g., `"stop"`, `"tool_calls"`).
    pub finish_reason: Option<String>,
}

/// Creates a system message.
#[must_use]
pub fn system_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::System,
        content: content.to_string(),
        name: None,
        tool_call_id: None,
        tool_calls: Vec::new(),
    }
}

/// Creates a user message.
#[must_use]
pub fn user_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::User,
        content: content.to_string(),
        name: None,
        tool_call_id: None,
        tool_calls: Vec::new(),
    }
}

/// Creates an assistant message carrying both text and any tool calls.
///
/// Later turns must see their own tool-call structure, so the calls are
/// kept alongside the text rather than dropped.
#[must_use]
pub fn assistant_message(content: &str, tool_calls: Vec<ToolCall>) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: content.to_string(),
        name: None,
        tool_call_id: None,
        tool_calls,
    }
}

/// Creates a tool result message correlated with the originating call.
#[must_use]
pub fn tool_message(tool_call_id: &str, tool_name: &str, content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Tool,
        content: content.to_string(),
        name: Some(tool_name.to_string()),
        tool_call_id: Some(tool_call_id.to_string()),
        tool_calls: Vec::new(),
    }
}
