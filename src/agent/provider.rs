//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into backend-specific SDK calls. This keeps the agent loop decoupled
//! from any particular LLM vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::ProviderError;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer for a specific backend while
/// presenting a uniform interface to the orchestrator. They own their retry
/// policy: an error returned from [`LlmProvider::generate`] means the retry
/// budget is spent (or the failure was not worth retrying) and the run must
/// stop. Authentication and configuration problems surface when the provider
/// is constructed, not here.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"mistral"`).
    fn name(&self) -> &'static str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Executes one model turn.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Failed`] once retries are exhausted, carrying
    /// the last underlying cause.
    async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}
