//! qa-agent: LLM-driven autonomous QA exploration.
//!
//! A language model is paired with a set of tools and explores a target
//! step by step, returning structured findings backed by tool evidence.
//!
//! # Example
//!
//! ```no_run
//! use qa_agent::agent::{AgentConfig, QaEngine, QaTask};
//! use qa_agent::tools::builtin_tools;
//!
//! # async fn demo() -> Result<(), qa_agent::error::AgentError> {
//! let config = AgentConfig::from_env()?;
//! let engine = QaEngine::from_config(&config)?;
//! let task = QaTask::new("https://example.com").with_objective("Check the signup form");
//! let result = engine.run_task(&task, builtin_tools(true)).await?;
//! assert!(result.trace.len() <= config.max_iterations);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod tools;

pub use error::{Error, Result};
