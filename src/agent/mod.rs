//! LLM agent loop for autonomous QA exploration.
//!
//! A run pairs one [`LlmProvider`] with a [`ToolCollection`] and lets the
//! model drive the tools until it has enough evidence to report findings.
//!
//! # Architecture
//!
//! ```text
//! QaTask → QaEngine
//!   ├── PromptSet → system + user prompt
//!   ├── ToolCollection (per run, closed on every exit path)
//!   └── Orchestrator loop
//!       ├── LlmProvider::generate (bounded retries)
//!       ├── ToolCollection::run (timeout + fault isolation)
//!       └── extract_issues → evidence gate → RunResult
//! ```

pub mod client;
pub mod collection;
pub mod config;
pub mod engine;
pub mod finding;
pub mod message;
pub mod orchestrator;
pub mod parsing;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod tool;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use collection::ToolCollection;
pub use config::AgentConfig;
pub use engine::QaEngine;
pub use finding::{Issue, QaTask, RunResult, Severity, Termination, TraceEntry};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{LoopSettings, Orchestrator};
pub use parsing::extract_issues;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use retry::RetryPolicy;
pub use tool::{Tool, ToolArguments, ToolCall, ToolDefinition, ToolExecutionResult};
