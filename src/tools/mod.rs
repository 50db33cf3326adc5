//! Built-in tools shipped with the agent.
//!
//! Browser automation and audit tools live outside this crate and plug in
//! through the [`Tool`] trait.

pub mod bash;

pub use bash::BashTool;

use crate::agent::tool::Tool;

/// Tools available to a run when no others are supplied.
#[must_use]
pub fn builtin_tools(enable_bash: bool) -> Vec<Box<dyn Tool>> {
    let mut tools: Vec<Box<dyn Tool>> = Vec::new();
    if enable_bash {
        tools.push(Box::new(BashTool::new()));
    }
    tools
}
