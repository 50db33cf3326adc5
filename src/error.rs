//! Error types for qa-agent.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - [`ConfigError`] and [`ProviderError`] are fatal and cross the
//!   orchestrator boundary wrapped in [`AgentError`].
//! - [`ToolError`] never leaves the tool collection; it is converted into a
//!   failed [`ToolExecutionResult`](crate::agent::ToolExecutionResult) and fed
//!   back to the model.
//! - [`CommandError`] and [`Error`] belong to the CLI layer.

use std::time::Duration;

use thiserror::Error;

use crate::agent::tool::format_duration;

/// Result alias used by the CLI layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for CLI commands.
#[derive(Debug, Error)]
pub enum Error {
    /// A run could not be set up or was aborted.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// A command failed outside the agent loop.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The run was misconfigured and never entered the loop.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The model backend failed after exhausting its retry budget.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Construction-time configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key configured for the selected provider.
    #[error("API key not set for provider '{provider}'. Set QA_API_KEY or {env_var}")]
    ApiKeyMissing {
        /// Provider that needs the key.
        provider: String,
        /// Provider-specific environment variable that was checked.
        env_var: String,
    },

    /// The configured provider name has no backend.
    #[error("unsupported provider '{name}' (available: {available})")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
        /// Comma-separated list of known providers.
        available: String,
    },

    /// Two tools in one collection share a name.
    #[error("duplicate tool name: {name}")]
    DuplicateTool {
        /// The conflicting name.
        name: String,
    },

    /// A configuration value is out of range or unparsable.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Failures talking to a model backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend rejected or failed a single request.
    #[error("{provider} request failed: {message}")]
    Request {
        /// Provider name.
        provider: &'static str,
        /// Backend error message.
        message: String,
        /// Whether retrying may succeed (network, 5xx, rate limit).
        transient: bool,
    },

    /// A single request exceeded the per-request timeout.
    #[error("{provider} request timed out after {}", format_duration(.timeout))]
    Timeout {
        /// Provider name.
        provider: &'static str,
        /// Configured request timeout.
        timeout: Duration,
    },

    /// The backend answered with something that cannot be normalized.
    #[error("{provider} returned an unusable response: {message}")]
    InvalidResponse {
        /// Provider name.
        provider: &'static str,
        /// What was wrong with the payload.
        message: String,
    },

    /// Retry budget spent; carries the last underlying cause.
    #[error("{provider} failed after {attempts} attempt(s): {last}")]
    Failed {
        /// Provider name.
        provider: &'static str,
        /// Attempts actually made.
        attempts: u32,
        /// Last per-attempt error.
        #[source]
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Returns `true` when the failure may go away on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Request { transient, .. } => *transient,
            Self::Timeout { .. } => true,
            Self::InvalidResponse { .. } | Self::Failed { .. } => false,
        }
    }
}

/// Tool failures. Always recovered into a failed tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with this name in the collection.
    #[error("Tool '{name}' not registered")]
    NotRegistered {
        /// Requested tool name.
        name: String,
    },

    /// The tool did not finish within its timeout.
    #[error("Tool '{name}' timed out after {}", format_duration(.timeout))]
    Timeout {
        /// Tool name.
        name: String,
        /// Configured tool timeout.
        timeout: Duration,
    },

    /// The tool hit an unrecoverable internal failure.
    #[error("Tool '{name}' failed: {message}")]
    Execution {
        /// Tool name.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// Arguments did not match the tool's schema.
    #[error("Tool '{name}' received invalid arguments: {message}")]
    InvalidArguments {
        /// Tool name.
        name: String,
        /// Validation detail.
        message: String,
    },

    /// The tool panicked while executing.
    #[error("Tool '{name}' panicked: {message}")]
    Panicked {
        /// Tool name.
        name: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command could not complete.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),
}
