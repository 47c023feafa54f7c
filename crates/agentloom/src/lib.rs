//! # agentloom
//!
//! Compose LLM-driven agents that call tools and delegate to each other.
//! Every agent runs a bounded tool-calling loop over its own history; an
//! agent registered as a sub-agent is just another tool to its caller. Sub-agent
//! tools hold weak references, so keep the delegates alive (a [`Team`] does).
//!
//! ```rust,ignore
//! use agentloom::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let model: Arc<dyn LanguageModel> = my_backend();
//!
//!     let helper = Agent::builder("Helper")
//!         .with_system_prompt("You answer research questions.")
//!         .with_model(model.clone())
//!         .build()?;
//!     let boss = Agent::builder("Boss")
//!         .with_system_prompt("You coordinate work.")
//!         .with_model(model)
//!         .with_tool(create_internal_thinking_tool())
//!         .with_sub_agent(&helper)
//!         .build()?;
//!
//!     println!("{}", boss.chat("Find out what a monad is").await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toolkit` (default): tool builders, the `#[tool]` macro and built-in tools

#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export core functionality (always available)
pub use agentloom_core::{error, llm, messaging, prompts, tools, tracker};
pub use agentloom_runtime::{
    agent, conversation, hooks, link_agents, subagent, team, Agent, AgentBuilder, AgentConfig,
    Connection, Llm, LlmParameters, RateLimiter, RetryPolicy, Team,
};

// Re-export toolkit functionality (when toolkit feature is enabled)
#[cfg(feature = "toolkit")]
#[cfg_attr(docsrs, doc(cfg(feature = "toolkit")))]
pub use agentloom_toolkit::{builder, builtin, ParamSpec, ToolBuilder};

#[cfg(feature = "toolkit")]
#[cfg_attr(docsrs, doc(cfg(feature = "toolkit")))]
pub use agentloom_macros::tool;

/// Prelude module for common imports
///
/// ```rust
/// use agentloom::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use agentloom_core::error::{AgentError, AgentResult, LlmError};
    pub use agentloom_core::llm::{LanguageModel, LlmRequest, LlmResponse, TokenUsage, ToolMode};
    pub use agentloom_core::messaging::{ExecutionResult, Message, ToolArgs, ToolCall};
    pub use agentloom_core::tools::{
        FunctionTool, Tool, ToolBox, ToolParameterSchema, ToolRegistry, ToolSchema,
    };
    pub use agentloom_core::tracker::{LoggingTracker, Tracker, UsageTracker};

    // Runtime essentials
    pub use agentloom_runtime::{
        link_agents, Agent, AgentBuilder, Connection, LinkOptions, Llm, SubAgentOptions, Team,
        TurnOptions,
    };

    // Toolkit utilities (when available)
    #[cfg(feature = "toolkit")]
    pub use agentloom_toolkit::{create_internal_thinking_tool, ParamSpec, ToolBuilder};
}
