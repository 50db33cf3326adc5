//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations.

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::{Backend, OpenAiProvider};
use crate::error::ConfigError;

/// Provider names accepted by [`create_provider`].
pub const SUPPORTED_PROVIDERS: &[&str] = &["mistral", "openai", "huggingface"];

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"mistral"` (default): Mistral's `OpenAI`-compatible endpoint
/// - `"openai"`: `OpenAI` or any compatible API
/// - `"huggingface"`: the Hugging Face inference router
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &AgentConfig) -> Result<Box<dyn LlmProvider>, ConfigError> {
    let backend = match config.provider.as_str() {
        "mistral" => Backend::Mistral,
        "openai" => Backend::OpenAi,
        "huggingface" => Backend::HuggingFace,
        other => {
            return Err(ConfigError::UnsupportedProvider {
                name: other.to_string(),
                available: SUPPORTED_PROVIDERS.join(", "),
            });
        }
    };
    Ok(Box::new(OpenAiProvider::new(config, backend)))
}
