//! Core contracts and shared data models for agentloom agents.
//! This crate keeps the protocol primitives lightweight and backend-agnostic
//! so the runtime and concrete adapters can compose them without heavy deps.

pub mod error;
pub mod llm;
pub mod messaging;
pub mod prompts;
pub mod tools;
pub mod tracker;

pub use error::{AgentError, AgentResult, LlmError, ProtocolError, SchemaError};
pub use llm::{LanguageModel, LlmRequest, LlmResponse, TokenUsage, ToolMode};
pub use messaging::{
    decode_args, ChatMessage, ChatRole, ChatToolCall, ExecutionResult, Message, MessageRole,
    TextMessage, ToolArgs, ToolCall, ToolMessage, ToolResult,
};
pub use tools::{FunctionTool, Tool, ToolBox, ToolFn, ToolParameterSchema, ToolRegistry, ToolSchema};
pub use tracker::{LoggingTracker, NoopTracker, TokenStats, Tracker, UsageSnapshot, UsageTracker};
