//! Tokio-powered runtime that drives agents: the backend wrapper with rate
//! limiting and retries, the bounded tool-calling loop, hook interception,
//! and agent-to-agent delegation.

pub mod agent;
pub mod conversation;
pub mod hooks;
pub mod llm;
pub mod subagent;
pub mod team;

pub use agent::{
    Agent, AgentBuilder, AgentConfig, DelegationListenerHandle, SubAgentOptions, TurnOptions,
};
pub use conversation::{link_agents, ConversationMessage, LinkHandle, LinkOptions};
pub use hooks::{HookHandle, PostHook, PreHook};
pub use llm::{Llm, LlmParameters, RateLimiter, RetryPolicy};
pub use subagent::{delegation_depth, sanitize_name, DelegationEvent, SubAgentTool};
pub use team::{Connection, Team};
