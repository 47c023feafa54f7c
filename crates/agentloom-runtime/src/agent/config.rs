//! Configuration for agents
//!
//! `AgentConfig` is the resolved form produced by
//! [`AgentBuilder`](super::builder::AgentBuilder); it is immutable once an
//! agent is built.

use agentloom_core::llm::ToolMode;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Maximum nesting of agent-to-agent delegation within one turn
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub name: String,
    pub system_prompt: String,
    /// Backend calls allowed per turn before the turn fails
    pub max_iterations: usize,
    pub default_tool_mode: ToolMode,
    /// Whether `poke` may start a turn without user input
    pub allow_poking: bool,
    /// Companion system text of this agent's sub-agent tool
    pub injected_system_message: Option<String>,
    pub max_delegation_depth: usize,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: String::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            default_tool_mode: ToolMode::Auto,
            allow_poking: true,
            injected_system_message: None,
            max_delegation_depth: DEFAULT_MAX_DELEGATION_DEPTH,
        }
    }
}

/// Per-turn overrides for [`Agent::chat_with`](super::Agent::chat_with)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOptions {
    pub tool_mode: Option<ToolMode>,
    pub max_iterations: Option<usize>,
}

impl TurnOptions {
    pub fn with_tool_mode(mut self, tool_mode: ToolMode) -> Self {
        self.tool_mode = Some(tool_mode);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// Options for exposing an agent as a sub-agent tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubAgentOptions {
    /// Replaces the default "Delegate a task to ..." description
    pub description: Option<String>,
    /// Replaces the agent's injected system message
    pub system_message: Option<String>,
}

impl SubAgentOptions {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }
}
