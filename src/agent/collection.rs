//! Name-keyed tool collection with timeout and fault isolation.
//!
//! The collection is built once per run from an explicit list of tools and
//! is the only dispatch path from the orchestrator to a tool. Whatever a
//! tool does (errors, hangs, panics), [`ToolCollection::run`] answers with a
//! [`ToolExecutionResult`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{debug, warn};

use super::tool::{Tool, ToolArguments, ToolDefinition, ToolExecutionResult};
use crate::error::{ConfigError, ToolError};

/// Runtime registry and executor for the tools of one run.
pub struct ToolCollection {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolCollection {
    /// Builds a collection, rejecting duplicate tool names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateTool`] if two tools share a name.
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), position).is_some() {
                return Err(ConfigError::DuplicateTool {
                    name: tool.name().to_string(),
                });
            }
        }
        Ok(Self { tools, index })
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Tool names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Schemas advertised to the provider, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if the collection holds no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Executes a tool by name under its timeout.
    ///
    /// Never fails: an unknown name, a timeout, an `Err` from the tool and
    /// a panic inside the tool all become a failed result. On timeout the
    /// tool's future is dropped, which abandons it at its next await point.
    pub async fn run(&self, name: &str, arguments: &ToolArguments) -> ToolExecutionResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "model requested an unregistered tool");
            return ToolError::NotRegistered {
                name: name.to_string(),
            }
            .into();
        };

        let timeout = tool.timeout();
        let guarded = AssertUnwindSafe(tool.execute(arguments)).catch_unwind();

        let result = match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(err))) => err.into(),
            Ok(Err(payload)) => ToolError::Panicked {
                name: name.to_string(),
                message: panic_message(payload.as_ref()),
            }
            .into(),
            Err(_) => ToolError::Timeout {
                name: name.to_string(),
                timeout,
            }
            .into(),
        };

        if result.success {
            debug!(tool = name, "tool execution complete");
        } else {
            warn!(
                tool = name,
                error = result.error.as_deref().unwrap_or_default(),
                "tool execution failed"
            );
        }
        result
    }

    /// Closes every tool, consuming the collection.
    ///
    /// Close failures are logged; they never mask the outcome of the run.
    pub async fn close(self) {
        for tool in &self.tools {
            if let Err(err) = tool.close().await {
                warn!(tool = tool.name(), error = %err, "tool cleanup failed");
            }
        }
    }
}

impl std::fmt::Debug for ToolCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCollection")
            .field("tools", &self.names())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
