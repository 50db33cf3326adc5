//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use super::retry::RetryPolicy;
use crate::error::ConfigError;

/// Default provider backend.
pub const DEFAULT_PROVIDER: &str = "mistral";
/// Default maximum loop steps per run.
const DEFAULT_MAX_ITERATIONS: usize = 20;
/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.2;
/// Default max output tokens per model turn.
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;
/// Default provider attempts (first try included).
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default retry delay unit in milliseconds.
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
/// Default locale passed to the prompt.
const DEFAULT_LOCALE: &str = "en-US";

/// Configuration for one QA run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "mistral", "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Maximum loop steps before the run is cut off.
    pub max_iterations: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per model turn.
    pub max_tokens: u32,
    /// Timeout for a single provider request.
    pub request_timeout: Duration,
    /// Maximum provider attempts per model turn.
    pub max_retries: u32,
    /// Retry delay unit; attempt `n` waits `n` times this.
    pub retry_base_delay: Duration,
    /// Locale the agent should test under.
    pub locale: String,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if no API key is found or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().env_fallback().build()
    }

    /// Retry policy derived from this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay)
    }
}

/// Provider-specific API key variable checked after `QA_API_KEY`.
#[must_use]
pub fn api_key_env_var(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"))
}

/// Default model for a provider.
#[must_use]
pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4o-mini",
        "huggingface" => "meta-llama/Llama-3.1-8B-Instruct",
        _ => "mistral-large-latest",
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_iterations: Option<usize>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    request_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    locale: Option<String>,
    prompt_dir: Option<PathBuf>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    ///
    /// The API key is looked up as `QA_API_KEY` first, then as the
    /// provider-specific variable (`MISTRAL_API_KEY`, `OPENAI_API_KEY`, ...).
    #[must_use]
    pub fn env_fallback(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("QA_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            let provider = self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER);
            self.api_key = std::env::var("QA_API_KEY")
                .or_else(|_| std::env::var(api_key_env_var(provider)))
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("QA_BASE_URL").ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("QA_MODEL").ok();
        }
        if self.max_iterations.is_none() {
            self.max_iterations = env_parse("QA_MAX_ITERATIONS");
        }
        if self.temperature.is_none() {
            self.temperature = env_parse("QA_TEMPERATURE");
        }
        if self.max_tokens.is_none() {
            self.max_tokens = env_parse("QA_MAX_TOKENS");
        }
        if self.request_timeout.is_none() {
            self.request_timeout = env_parse("QA_REQUEST_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.max_retries.is_none() {
            self.max_retries = env_parse("QA_MAX_RETRIES");
        }
        if self.locale.is_none() {
            self.locale = std::env::var("QA_LOCALE").ok();
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("QA_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum loop steps.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the max tokens per model turn.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Sets the maximum provider attempts.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the retry delay unit.
    #[must_use]
    pub const fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ApiKeyMissing`] if no API key was set, or
    /// [`ConfigError::InvalidValue`] for out-of-range values.
    pub fn build(self) -> Result<AgentConfig, ConfigError> {
        let provider = self
            .provider
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::ApiKeyMissing {
                env_var: api_key_env_var(&provider),
                provider: provider.clone(),
            })?;

        let max_iterations = self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_iterations",
                message: "must be at least 1".to_string(),
            });
        }

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_retries",
                message: "must be at least 1".to_string(),
            });
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "temperature",
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        Ok(AgentConfig {
            model: self
                .model
                .unwrap_or_else(|| default_model(&provider).to_string()),
            provider,
            api_key,
            base_url: self.base_url,
            max_iterations,
            temperature,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            max_retries,
            retry_base_delay: self
                .retry_base_delay
                .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS)),
            locale: self.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "mistral");
        assert_eq!(config.model, "mistral-large-latest");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.locale, "en-US");
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().provider("openai").build();
        match result {
            Err(ConfigError::ApiKeyMissing { provider, env_var }) => {
                assert_eq!(provider, "openai");
                assert_eq!(env_var, "OPENAI_API_KEY");
            }
            other => unreachable!("expected ApiKeyMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_blank_api_key_rejected() {
        let result = AgentConfig::builder().api_key("   ").build();
        assert!(matches!(result, Err(ConfigError::ApiKeyMissing { .. })));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("openai")
            .max_iterations(5)
            .temperature(0.0)
            .max_tokens(512)
            .max_retries(4)
            .retry_base_delay(Duration::from_millis(10))
            .request_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.request_timeout, Duration::from_secs(30));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
    }

    #[test]
    fn test_builder_rejects_out_of_range() {
        let zero_steps = AgentConfig::builder().api_key("k").max_iterations(0).build();
        assert!(matches!(
            zero_steps,
            Err(ConfigError::InvalidValue { key: "max_iterations", .. })
        ));

        let hot = AgentConfig::builder().api_key("k").temperature(3.5).build();
        assert!(matches!(
            hot,
            Err(ConfigError::InvalidValue { key: "temperature", .. })
        ));

        let no_attempts = AgentConfig::builder().api_key("k").max_retries(0).build();
        assert!(matches!(
            no_attempts,
            Err(ConfigError::InvalidValue { key: "max_retries", .. })
        ));
    }

    #[test]
    fn test_api_key_env_var() {
        assert_eq!(api_key_env_var("mistral"), "MISTRAL_API_KEY");
        assert_eq!(api_key_env_var("openai"), "OPENAI_API_KEY");
        assert_eq!(api_key_env_var("huggingface"), "HUGGINGFACE_API_KEY");
    }

    #[test]
    fn test_default_model_per_provider() {
        assert_eq!(default_model("mistral"), "mistral-large-latest");
        assert_eq!(default_model("openai"), "gpt-4o-mini");
        assert_eq!(default_model("huggingface"), "meta-llama/Llama-3.1-8B-Instruct");
    }
}
