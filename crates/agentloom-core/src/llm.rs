//! Backend contract implemented by every concrete model adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LlmError;
use crate::messaging::Message;
use crate::tools::ToolSchema;

/// Policy for tool calls in a single backend call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// The backend decides whether to call tools
    #[default]
    Auto,
    /// The backend must emit at least one tool call
    Force,
    /// The backend must not emit tool calls
    None,
}

impl ToolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolMode::Auto => "auto",
            ToolMode::Force => "force",
            ToolMode::None => "none",
        }
    }
}

impl std::fmt::Display for ToolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request passed to a language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub tool_mode: ToolMode,
}

impl LlmRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            tools: Vec::new(),
            tool_mode: ToolMode::Auto,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>, tool_mode: ToolMode) -> Self {
        self.tools = tools;
        self.tool_mode = tool_mode;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Text reply, or a tool message carrying the requested calls
    pub message: Message,
    /// Token accounting for the physical call, when the provider reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Model metadata (identifier, finish reason, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl LlmResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
            metadata: Map::new(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A concrete model backend.
///
/// Implementations translate the request into their native call and map the
/// native response back into a [`Message`]. Provider rate limits and
/// transient generation failures must surface as [`LlmError::RetryLater`];
/// decoding failures such as [`ToolCall::from_raw`](crate::messaging::ToolCall::from_raw)
/// errors propagate with `?` as [`LlmError::Protocol`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Whether this backend honours the `end_tool_mode` escape convention
    /// while tool calls are forced.
    fn supports_end_tool_mode(&self) -> bool {
        false
    }

    /// Static configuration worth reporting (model identifier, temperature)
    fn describe(&self) -> Map<String, Value> {
        Map::new()
    }
}
