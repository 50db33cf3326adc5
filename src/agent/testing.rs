//! Scripted providers and tools shared by the loop and engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use super::tool::{Tool, ToolArguments, ToolCall, ToolExecutionResult};
use crate::error::{ProviderError, ToolError};

/// Provider that replays a fixed list of turns and records every request.
///
/// Once the script runs out it answers with a plain text turn.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Result<ChatResponse, ProviderError>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that keeps requesting `tool` forever.
    pub fn looping(tool: &str, turns: usize) -> Self {
        Self::new(
            (0..turns)
                .map(|i| {
                    let id = format!("call_{i}");
                    Ok(calls_turn("", &[(id.as_str(), tool)]))
                })
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(text_turn("nothing further")))
    }
}

/// A turn with text and no tool calls.
pub fn text_turn(content: &str) -> ChatResponse {
    ChatResponse {
        content: Some(content.to_string()),
        usage: TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
        finish_reason: Some("stop".to_string()),
        ..ChatResponse::default()
    }
}

/// A turn requesting the given `(id, tool)` calls with empty arguments.
pub fn calls_turn(content: &str, calls: &[(&str, &str)]) -> ChatResponse {
    ChatResponse {
        content: (!content.is_empty()).then(|| content.to_string()),
        tool_calls: calls
            .iter()
            .map(|(id, name)| ToolCall {
                id: (*id).to_string(),
                name: (*name).to_string(),
                arguments: ToolArguments::new(),
            })
            .collect(),
        usage: TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
        finish_reason: Some("tool_calls".to_string()),
        ..ChatResponse::default()
    }
}

/// A provider error that survived its retries.
pub fn exhausted() -> ProviderError {
    ProviderError::Failed {
        provider: "scripted",
        attempts: 3,
        last: Box::new(ProviderError::Request {
            provider: "scripted",
            message: "503 service unavailable".to_string(),
            transient: true,
        }),
    }
}

/// What a [`FakeTool`] does when invoked.
#[derive(Debug, Clone)]
pub enum Action {
    Output(&'static str),
    Screenshot(&'static str),
    Sleep(Duration),
    Fail(&'static str),
}

/// Tool with a fixed behaviour that counts its invocations and closes.
pub struct FakeTool {
    name: &'static str,
    action: Action,
    timeout: Duration,
    pub calls: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeTool {
    pub fn new(name: &'static str, action: Action) -> Self {
        Self {
            name,
            action,
            timeout: Duration::from_millis(50),
            calls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn boxed(self) -> Box<dyn Tool> {
        Box::new(self)
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "fake tool"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, _arguments: &ToolArguments) -> Result<ToolExecutionResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.action {
            Action::Output(text) => Ok(ToolExecutionResult::ok(*text)),
            Action::Screenshot(data) => Ok(ToolExecutionResult::screenshot(*data)),
            Action::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(ToolExecutionResult::ok("late"))
            }
            Action::Fail(message) => Ok(ToolExecutionResult::failure(*message)),
        }
    }

    async fn close(&self) -> Result<(), ToolError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
