//! Run entrypoint tying provider, prompts and tools together.

use tracing::info;

use super::client::create_provider;
use super::collection::ToolCollection;
use super::config::AgentConfig;
use super::finding::{QaTask, RunResult};
use super::orchestrator::{LoopSettings, Orchestrator};
use super::prompt::{PromptSet, build_system_prompt, build_user_prompt};
use super::provider::LlmProvider;
use super::tool::Tool;
use crate::error::AgentError;

/// Runs QA tasks against one provider.
///
/// The engine itself is stateless between runs: every call to
/// [`QaEngine::run_task`] builds a fresh [`ToolCollection`] from the tools it
/// is handed and tears it down before returning.
pub struct QaEngine {
    provider: Box<dyn LlmProvider>,
    prompts: PromptSet,
    settings: LoopSettings,
    locale: String,
}

impl QaEngine {
    /// Creates an engine from explicit parts.
    #[must_use]
    pub fn new(
        provider: Box<dyn LlmProvider>,
        prompts: PromptSet,
        settings: LoopSettings,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            prompts,
            settings,
            locale: locale.into(),
        }
    }

    /// Creates an engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the configured provider is unknown.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let provider = create_provider(config)?;
        Ok(Self::new(
            provider,
            PromptSet::load(config.prompt_dir.as_deref()),
            LoopSettings::from(config),
            config.locale.clone(),
        ))
    }

    /// The provider this engine drives.
    #[must_use]
    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Executes one QA run with the given tools.
    ///
    /// The tool collection is closed on every exit path once it has been
    /// built, including provider failure.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] for duplicate tool names (before any
    /// model call) and [`AgentError::Provider`] if a model turn fails.
    pub async fn run_task(
        &self,
        task: &QaTask,
        tools: Vec<Box<dyn Tool>>,
    ) -> Result<RunResult, AgentError> {
        let collection = ToolCollection::new(tools)?;

        let system_prompt =
            build_system_prompt(&self.prompts.system, &collection.definitions(), &self.locale);
        let user_prompt = build_user_prompt(task);

        info!(target_url = %task.target, tools = collection.len(), "running QA task");

        let outcome = Orchestrator::new(self.provider.as_ref(), &collection, self.settings)
            .execute(&system_prompt, &user_prompt)
            .await;

        collection.close().await;
        outcome
    }
}

impl std::fmt::Debug for QaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaEngine")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("settings", &self.settings)
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}
