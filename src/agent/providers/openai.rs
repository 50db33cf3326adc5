//! `OpenAI`-compatible provider built on the `async-openai` wire types.
//!
//! Serves the `openai`, `mistral` and `huggingface` backends. Mistral and the
//! Hugging Face router expose `OpenAI`-compatible chat completion endpoints,
//! so only the base URL and a couple of request fields differ.
//!
//! Requests go out through `reqwest` rather than the SDK client so that every
//! failure is classified by its HTTP status and retried under one
//! [`RetryPolicy`], whatever shape the backend gives its error bodies.

use std::time::Duration;

use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionResponse,
    FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::agent::retry::{RetryPolicy, is_retriable_status, with_retry};
use crate::agent::tool::{ToolArguments, ToolCall};
use crate::error::ProviderError;

/// `OpenAI` API root.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// Mistral's `OpenAI`-compatible API root.
pub const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";
/// Hugging Face inference router, `OpenAI`-compatible.
pub const HUGGINGFACE_API_BASE: &str = "https://router.huggingface.co/v1";

/// Longest slice of a non-JSON error body quoted in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Backend flavour served by [`OpenAiProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `OpenAI` or any compatible proxy.
    OpenAi,
    /// Mistral La Plateforme.
    Mistral,
    /// Hugging Face inference router.
    HuggingFace,
}

impl Backend {
    /// Provider name reported in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mistral => "mistral",
            Self::HuggingFace => "huggingface",
        }
    }

    const fn default_api_base(self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_API_BASE,
            Self::Mistral => MISTRAL_API_BASE,
            Self::HuggingFace => HUGGINGFACE_API_BASE,
        }
    }

    /// Only `OpenAI` has moved to `max_completion_tokens`.
    const fn uses_legacy_max_tokens(self) -> bool {
        !matches!(self, Self::OpenAi)
    }

    /// Mistral expects the tool name on tool-role messages.
    const fn names_tool_messages(self) -> bool {
        matches!(self, Self::Mistral)
    }
}

/// `OpenAI`-compatible LLM provider.
///
/// Each request attempt is bounded by the configured request timeout and
/// the whole turn by the retry policy.
///
/// The `async-openai` tool message type has no `name` field, so for
/// backends that want it (Mistral) the name is added to the encoded body
/// before sending. Other backends correlate tool
/// results through `tool_call_id` alone.
pub struct OpenAiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    backend: Backend,
    model: String,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl OpenAiProvider {
    /// Creates a new provider from agent configuration.
    #[must_use]
    pub fn new(config: &AgentConfig, backend: Backend) -> Self {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or_else(|| backend.default_api_base());

        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            backend,
            model: config.model.clone(),
            retry: config.retry_policy(),
            request_timeout: config.request_timeout,
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: msg.name.clone(),
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: msg.name.clone(),
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: Value::Object(tc.arguments.clone()).to_string(),
                                },
                            })
                            .collect(),
                    )
                };

                let content = if msg.content.is_empty() {
                    None
                } else {
                    Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    ))
                };

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: msg.name.clone(),
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(msg.content.clone()),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    #[allow(deprecated)]
    fn build_request(&self, request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|td| ChatCompletionTool {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionObject {
                            name: td.name.clone(),
                            description: Some(td.description.clone()),
                            parameters: Some(td.parameters.clone()),
                            strict: None,
                        },
                    })
                    .collect(),
            )
        };

        let (max_tokens, max_completion_tokens) = if self.backend.uses_legacy_max_tokens() {
            (Some(request.max_tokens), None)
        } else {
            (None, Some(request.max_tokens))
        };

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(request.temperature),
            max_tokens,
            max_completion_tokens,
            tools,
            ..Default::default()
        }
    }

    /// Encodes the request body sent to the backend.
    fn request_body(&self, request: &ChatRequest) -> Result<Value, ProviderError> {
        let mut body = serde_json::to_value(self.build_request(request)).map_err(|e| {
            ProviderError::Request {
                provider: self.backend.name(),
                message: format!("failed to encode request: {e}"),
                transient: false,
            }
        })?;

        if self.backend.names_tool_messages()
            && let Some(Value::Array(messages)) = body.get_mut("messages")
        {
            for (original, encoded) in request.messages.iter().zip(messages.iter_mut()) {
                if let (Some(name), Value::Object(fields)) = (&original.name, encoded)
                    && original.role == Role::Tool
                {
                    fields.insert("name".to_string(), Value::String(name.clone()));
                }
            }
        }

        Ok(body)
    }

    /// Sends one attempt and decodes the response.
    async fn send_once(
        &self,
        body: &Value,
    ) -> Result<CreateChatCompletionResponse, ProviderError> {
        let provider = self.backend.name();

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                provider,
                message: e.to_string(),
                transient: !e.is_builder(),
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ProviderError::Request {
            provider,
            message: format!("failed to read response body: {e}"),
            transient: true,
        })?;

        if !status.is_success() {
            return Err(classify_status(provider, status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|e| ProviderError::InvalidResponse {
            provider,
            message: e.to_string(),
        })
    }

    /// Converts an SDK response into our provider-agnostic response.
    fn parse_response(response: &CreateChatCompletionResponse) -> ChatResponse {
        let choice = response.choices.first();

        let content = choice.and_then(|c| c.message.content.clone());

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: decode_arguments(&tc.function.arguments),
                    })
                    .collect()
            })
            .unwrap_or_default();

        // wire value, e.g. "tool_calls"
        let finish_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .and_then(|fr| serde_json::to_value(fr).ok())
            .and_then(|v| v.as_str().map(str::to_string));

        let usage = response
            .usage
            .as_ref()
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        ChatResponse {
            content,
            tool_calls,
            raw: serde_json::to_value(response).unwrap_or_default(),
            usage,
            finish_reason,
        }
    }
}

/// Maps a non-success HTTP response onto a per-attempt [`ProviderError`].
///
/// Transience is decided by the status alone. A 429 caused by an exhausted
/// quota is the one exception: waiting will not refill it.
#[must_use]
pub fn classify_status(provider: &'static str, status: u16, body: &[u8]) -> ProviderError {
    let detail = error_detail(body);
    let quota_exhausted = String::from_utf8_lossy(body).contains("insufficient_quota");
    let transient = is_retriable_status(status) && !quota_exhausted;
    ProviderError::Request {
        provider,
        message: format!("HTTP {status}: {detail}"),
        transient,
    }
}

/// Extracts a readable message from an error body.
///
/// Understands the `OpenAI` shape (`{"error": {"type", "message"}}`), the
/// flat Mistral shape (`{"type", "message"}`) and plain-string errors; any
/// other body is quoted, shortened.
fn error_detail(body: &[u8]) -> String {
    if let Ok(Value::Object(root)) = serde_json::from_slice::<Value>(body) {
        let fields = match root.get("error") {
            Some(Value::Object(inner)) => Some(inner),
            Some(Value::String(message)) => return message.clone(),
            _ => Some(&root),
        };
        if let Some(fields) = fields {
            let message = fields.get("message").and_then(Value::as_str);
            let kind = fields
                .get("type")
                .or_else(|| fields.get("code"))
                .and_then(Value::as_str);
            match (kind, message) {
                (Some(kind), Some(message)) => return format!("{kind}: {message}"),
                (None, Some(message)) => return message.to_string(),
                _ => {}
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty response body".to_string();
    }
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Decodes a tool call's raw argument string.
///
/// Anything that is not a JSON object is preserved verbatim under
/// `raw_arguments` so the tool can report it back to the model.
#[must_use]
pub fn decode_arguments(raw: &str) -> ToolArguments {
    if raw.trim().is_empty() {
        return ToolArguments::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut fallback = ToolArguments::new();
            fallback.insert("raw_arguments".to_string(), Value::String(raw.to_string()));
            fallback
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let provider = self.backend.name();
        let body = self.request_body(request)?;

        let response = with_retry(self.retry, provider, || async {
            match tokio::time::timeout(self.request_timeout, self.send_once(&body)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout {
                    provider,
                    timeout: self.request_timeout,
                }),
            }
        })
        .await?;

        let parsed = Self::parse_response(&response);
        debug!(
            provider,
            model = %self.model,
            tool_calls = parsed.tool_calls.len(),
            finish_reason = parsed.finish_reason.as_deref().unwrap_or_default(),
            "model turn complete"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::agent::message;
    use crate::agent::tool::ToolDefinition;

    fn provider(backend: Backend) -> OpenAiProvider {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .provider(backend.name())
            .build()
            .unwrap_or_else(|e| panic!("config failed: {e}"));
        OpenAiProvider::new(&config, backend)
    }

    fn request_with_tools() -> ChatRequest {
        ChatRequest {
            messages: vec![
                message::system_message("sys"),
                message::user_message("test"),
            ],
            tools: vec![ToolDefinition {
                name: "bash".to_string(),
                description: "Run a shell command".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
            temperature: 0.2,
            max_tokens: 100,
        }
    }

    fn completion_fixture() -> Value {
        json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "mistral-large-latest",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Taking a look.",
                    "tool_calls": [
                        {
                            "id": "call_a",
                            "type": "function",
                            "function": {"name": "bash", "arguments": "{\"command\":\"pwd\"}"}
                        },
                        {
                            "id": "call_b",
                            "type": "function",
                            "function": {"name": "computer", "arguments": "oops"}
                        }
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
        })
    }

    /// Local HTTP backend replaying canned `(status, body)` pairs.
    ///
    /// The last pair repeats once the list runs out. Every request served is
    /// counted in `hits`.
    struct FakeBackend {
        base_url: String,
        hits: Arc<AtomicUsize>,
    }

    async fn fake_backend(responses: Vec<(u16, String)>) -> FakeBackend {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("bind failed: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("no local addr: {e}"));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                if read_request(&mut stream).await.is_err() {
                    continue;
                }
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let Some((status, body)) = responses.get(n).or_else(|| responses.last()) else {
                    return;
                };
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        FakeBackend {
            base_url: format!("http://{addr}/v1"),
            hits,
        }
    }

    async fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return Ok(());
                }
            }
        }
    }

    fn provider_at(backend: Backend, base_url: &str) -> OpenAiProvider {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .provider(backend.name())
            .base_url(base_url)
            .max_retries(3)
            .retry_base_delay(Duration::from_millis(1))
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| panic!("config failed: {e}"));
        OpenAiProvider::new(&config, backend)
    }

    fn mistral_error(kind: &str, message: &str) -> String {
        json!({"object": "error", "type": kind, "message": message, "code": null}).to_string()
    }

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_tool_message_keeps_call_id() {
        let msg = message::tool_message("call_123", "bash", "result data");
        assert_eq!(msg.name.as_deref(), Some("bash"));

        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Tool(t) = converted {
            assert_eq!(t.tool_call_id, "call_123");
        } else {
            panic!("Expected Tool message");
        }
    }

    #[test]
    fn test_request_body_names_tool_messages_for_mistral() {
        let mut request = request_with_tools();
        request
            .messages
            .push(message::tool_message("call_1", "bash", "ok"));

        let mistral = provider(Backend::Mistral)
            .request_body(&request)
            .unwrap_or_else(|e| panic!("encode failed: {e}"));
        assert_eq!(mistral["messages"][2]["role"], "tool");
        assert_eq!(mistral["messages"][2]["name"], "bash");
        assert_eq!(mistral["messages"][2]["tool_call_id"], "call_1");
        assert!(mistral["messages"][1].get("name").is_none());

        let openai = provider(Backend::OpenAi)
            .request_body(&request)
            .unwrap_or_else(|e| panic!("encode failed: {e}"));
        assert!(openai["messages"][2].get("name").is_none());
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let mut arguments = ToolArguments::new();
        arguments.insert("command".to_string(), json!("curl -sI https://example.com"));
        let msg = message::assistant_message(
            "Checking headers.",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "bash".to_string(),
                arguments,
            }],
        );
        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Assistant(a) = converted {
            assert!(a.content.is_some());
            let calls = a.tool_calls.unwrap_or_default();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].id, "call_1");
            let reencoded: Value =
                serde_json::from_str(&calls[0].function.arguments).unwrap_or_default();
            assert_eq!(reencoded["command"], "curl -sI https://example.com");
        } else {
            panic!("Expected Assistant message");
        }
    }

    #[test]
    #[allow(deprecated)]
    fn test_build_request_per_backend() {
        let request = request_with_tools();

        let openai = provider(Backend::OpenAi).build_request(&request);
        assert_eq!(openai.model, "gpt-4o-mini");
        assert_eq!(openai.max_completion_tokens, Some(100));
        assert!(openai.max_tokens.is_none());
        assert_eq!(openai.tools.as_ref().map_or(0, Vec::len), 1);
        assert_eq!(openai.messages.len(), 2);

        let mistral = provider(Backend::Mistral).build_request(&request);
        assert_eq!(mistral.model, "mistral-large-latest");
        assert_eq!(mistral.max_tokens, Some(100));
        assert!(mistral.max_completion_tokens.is_none());

        let hf = provider(Backend::HuggingFace).build_request(&request);
        assert_eq!(hf.max_tokens, Some(100));
    }

    #[test]
    fn test_endpoint_per_backend() {
        assert_eq!(
            provider(Backend::Mistral).endpoint,
            "https://api.mistral.ai/v1/chat/completions"
        );
        assert_eq!(
            provider(Backend::OpenAi).endpoint,
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            provider(Backend::HuggingFace).endpoint,
            "https://router.huggingface.co/v1/chat/completions"
        );
        assert_eq!(
            provider_at(Backend::OpenAi, "http://localhost:8080/v1/").endpoint,
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_request_without_tools() {
        let mut request = request_with_tools();
        request.tools.clear();
        let built = provider(Backend::OpenAi).build_request(&request);
        assert!(built.tools.is_none());
    }

    #[test]
    fn test_decode_arguments() {
        let decoded = decode_arguments(r#"{"command": "ls -la"}"#);
        assert_eq!(decoded["command"], "ls -la");

        assert!(decode_arguments("").is_empty());

        let malformed = decode_arguments("{not json");
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed["raw_arguments"], "{not json");

        let array = decode_arguments("[1, 2]");
        assert_eq!(array["raw_arguments"], "[1, 2]");
    }

    #[test]
    fn test_classify_status() {
        let overloaded = classify_status(
            "mistral",
            503,
            mistral_error("service_unavailable", "Service unavailable").as_bytes(),
        );
        assert!(overloaded.is_transient());
        assert!(overloaded.to_string().contains("HTTP 503"));

        let gateway = classify_status("mistral", 502, b"<html><body>Bad Gateway</body></html>");
        assert!(gateway.is_transient());
        assert!(gateway.to_string().contains("Bad Gateway"));

        let server = classify_status(
            "openai",
            500,
            br#"{"error": {"type": "server_error", "message": "The server had an error while processing your request."}}"#,
        );
        assert!(server.is_transient());
        assert!(server.to_string().contains("server_error: The server had an error"));

        // a large number in the message must not make a 400 look transient
        let too_long = classify_status(
            "mistral",
            400,
            mistral_error("invalid_request", "Prompt contains 35000 tokens, too large").as_bytes(),
        );
        assert!(!too_long.is_transient());

        let quota = classify_status(
            "openai",
            429,
            br#"{"error": {"type": "insufficient_quota", "message": "You exceeded your current quota"}}"#,
        );
        assert!(!quota.is_transient());

        let empty = classify_status("openai", 401, b"");
        assert!(!empty.is_transient());
        assert!(empty.to_string().contains("empty response body"));
    }

    #[test]
    fn test_error_detail_shortens_unknown_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS * 2);
        let detail = error_detail(body.as_bytes());
        assert_eq!(detail.len(), MAX_ERROR_BODY_CHARS + 3);
        assert_eq!(error_detail(br#"{"error": "model not loaded"}"#), "model not loaded");
    }

    #[test]
    fn test_parse_response() {
        let response: CreateChatCompletionResponse =
            serde_json::from_value(completion_fixture())
                .unwrap_or_else(|e| panic!("fixture did not deserialize: {e}"));

        let parsed = OpenAiProvider::parse_response(&response);
        assert_eq!(parsed.content.as_deref(), Some("Taking a look."));
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_eq!(parsed.tool_calls[0].arguments["command"], "pwd");
        assert_eq!(parsed.tool_calls[1].arguments["raw_arguments"], "oops");
        assert_eq!(parsed.usage.total_tokens, 20);
        assert_eq!(parsed.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(parsed.raw["id"], "cmpl-1");
    }

    #[tokio::test]
    async fn test_generate_retries_mistral_unavailable() {
        let backend = fake_backend(vec![
            (503, mistral_error("service_unavailable", "Service unavailable")),
            (429, mistral_error("rate_limited", "Requests rate limit exceeded")),
            (200, completion_fixture().to_string()),
        ])
        .await;
        let provider = provider_at(Backend::Mistral, &backend.base_url);

        let response = provider
            .generate(&request_with_tools())
            .await
            .unwrap_or_else(|e| panic!("generate failed: {e}"));

        assert_eq!(backend.hits.load(Ordering::SeqCst), 3);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[tokio::test]
    async fn test_generate_exhausts_on_gateway_errors() {
        let backend = fake_backend(vec![(
            502,
            "<html><body>502 Bad Gateway</body></html>".to_string(),
        )])
        .await;
        let provider = provider_at(Backend::Mistral, &backend.base_url);

        let outcome = provider.generate(&request_with_tools()).await;

        assert_eq!(backend.hits.load(Ordering::SeqCst), 3);
        match outcome {
            Err(ProviderError::Failed { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(last.is_transient());
                assert!(last.to_string().contains("HTTP 502"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_rate_limit_is_retried_once_per_attempt() {
        let body = json!({"error": {"type": "requests", "message": "Rate limit reached"}}).to_string();
        let backend = fake_backend(vec![(429, body)]).await;
        let provider = provider_at(Backend::OpenAi, &backend.base_url);

        let outcome = provider.generate(&request_with_tools()).await;

        assert_eq!(backend.hits.load(Ordering::SeqCst), 3);
        match outcome {
            Err(ProviderError::Failed { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(last.to_string().contains("HTTP 429"));
                assert!(last.to_string().contains("Rate limit reached"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_does_not_retry_bad_request() {
        let backend = fake_backend(vec![(
            400,
            mistral_error("invalid_request_error", "Invalid model: mistral-huge"),
        )])
        .await;
        let provider = provider_at(Backend::Mistral, &backend.base_url);

        let outcome = provider.generate(&request_with_tools()).await;

        assert_eq!(backend.hits.load(Ordering::SeqCst), 1);
        assert!(matches!(
            outcome,
            Err(ProviderError::Failed { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_success_body() {
        let backend = fake_backend(vec![(200, "{\"unexpected\": true}".to_string())]).await;
        let provider = provider_at(Backend::OpenAi, &backend.base_url);

        let outcome = provider.generate(&request_with_tools()).await;

        assert_eq!(backend.hits.load(Ordering::SeqCst), 1);
        match outcome {
            Err(ProviderError::Failed { last, .. }) => {
                assert!(matches!(*last, ProviderError::InvalidResponse { .. }));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
