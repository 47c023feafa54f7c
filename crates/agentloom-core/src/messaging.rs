//! Unified message and tool protocol shared by agents, backends, and trackers.
//!
//! A conversation is an ordered list of [`Message`] values. Each message is
//! either plain text or a tool message that carries *either* tool calls
//! (requested by the model) *or* tool results (produced by the agent), never
//! both.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Decoded tool-call arguments.
pub type ToolArgs = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default = "generate_call_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_args")]
    pub args: ToolArgs,
}

fn generate_call_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn deserialize_args<'de, D>(deserializer: D) -> Result<ToolArgs, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    decode_args("<unknown>", raw).map_err(serde::de::Error::custom)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode raw tool-call arguments into a mapping.
///
/// Backends deliver arguments either as an already structured object or as
/// JSON text. `null` is treated as "no arguments".
pub fn decode_args(tool: &str, raw: Value) -> Result<ToolArgs, ProtocolError> {
    match raw {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ToolArgs::new()),
        Value::String(text) => {
            if text.trim().is_empty() {
                return Ok(ToolArgs::new());
            }
            let parsed: Value =
                serde_json::from_str(&text).map_err(|source| ProtocolError::InvalidArguments {
                    tool: tool.to_string(),
                    source,
                })?;
            match parsed {
                Value::Object(map) => Ok(map),
                other => Err(ProtocolError::ArgumentsNotObject {
                    tool: tool.to_string(),
                    kind: value_kind(&other),
                }),
            }
        }
        other => Err(ProtocolError::ArgumentsNotObject {
            tool: tool.to_string(),
            kind: value_kind(&other),
        }),
    }
}

impl ToolCall {
    /// Create a call with a freshly generated id
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            id: generate_call_id(),
            name: name.into(),
            args,
        }
    }

    /// Build a call from a backend's raw shape: the id may be missing and the
    /// arguments may still be JSON text.
    pub fn from_raw(
        id: Option<String>,
        name: impl Into<String>,
        raw_args: Value,
    ) -> Result<Self, ProtocolError> {
        let name = name.into();
        let args = decode_args(&name, raw_args)?;
        Ok(Self {
            id: id.filter(|id| !id.is_empty()).unwrap_or_else(generate_call_id),
            name,
            args,
        })
    }

    /// Arguments re-encoded as JSON text, the shape most vendor APIs expect
    pub fn args_json(&self) -> String {
        Value::Object(self.args.clone()).to_string()
    }

    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }
}

/// Outcome of running one tool call.
///
/// `output` is meaningful only when `success` is true, `error` only when it
/// is false.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output: match output {
                Value::Null => None,
                value => Some(value),
            },
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            match &self.output {
                None => Ok(()),
                Some(Value::String(text)) => f.write_str(text),
                Some(value) => write!(f, "{value}"),
            }
        } else {
            f.write_str(self.error.as_deref().unwrap_or_default())
        }
    }
}

/// Result of a tool call, correlated by the originating call's id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub result: ExecutionResult,
}

impl ToolResult {
    pub fn for_call(call: &ToolCall, result: ExecutionResult) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextMessage {
    pub role: MessageRole,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMessage {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
}

impl ToolMessage {
    /// Model-side message requesting tool invocations
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Model,
            tool_calls,
            tool_results: Vec::new(),
        }
    }

    /// User-side message answering previously requested invocations
    pub fn results(tool_results: Vec<ToolResult>) -> Self {
        Self {
            role: MessageRole::User,
            tool_calls: Vec::new(),
            tool_results,
        }
    }

    /// Look up the result produced by the tool called `name`
    pub fn get(&self, name: &str) -> Option<&ExecutionResult> {
        self.tool_results
            .iter()
            .find(|result| result.name == name)
            .map(|result| &result.result)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match (self.tool_calls.is_empty(), self.tool_results.is_empty()) {
            (false, false) => return Err(ProtocolError::MixedToolMessage),
            (true, true) => return Err(ProtocolError::EmptyToolMessage),
            _ => {}
        }
        let mut seen = HashSet::new();
        for call in &self.tool_calls {
            if !seen.insert(call.id.as_str()) {
                return Err(ProtocolError::DuplicateCallId(call.id.clone()));
            }
        }
        Ok(())
    }
}

/// One entry of a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Text(TextMessage),
    Tool(ToolMessage),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::Text(TextMessage {
            role: MessageRole::User,
            text: text.into(),
        })
    }

    pub fn model(text: impl Into<String>) -> Self {
        Message::Text(TextMessage {
            role: MessageRole::Model,
            text: text.into(),
        })
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Message::Tool(ToolMessage::calls(calls))
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Message::Tool(ToolMessage::results(results))
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Message::Text(message) => message.role,
            Message::Tool(message) => message.role,
        }
    }

    /// Short tag naming the variant, matching the serialized `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text(_) => "text",
            Message::Tool(_) => "tool",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(message) => Some(message.text.as_str()),
            Message::Tool(_) => None,
        }
    }

    pub fn as_tool(&self) -> Option<&ToolMessage> {
        match self {
            Message::Tool(message) => Some(message),
            Message::Text(_) => None,
        }
    }

    /// Calls requested by this message; empty for text and result messages
    pub fn requested_calls(&self) -> &[ToolCall] {
        match self {
            Message::Tool(message) => &message.tool_calls,
            Message::Text(_) => &[],
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Message::Text(_) => Ok(()),
            Message::Tool(message) => message.validate(),
        }
    }

    /// Compact form used for logging: the text itself, or the list of calls or
    /// results with empty fields omitted.
    pub fn export(&self) -> Value {
        match self {
            Message::Text(message) => Value::String(message.text.clone()),
            Message::Tool(message) => {
                let entries = if !message.tool_calls.is_empty() {
                    message
                        .tool_calls
                        .iter()
                        .map(|call| serde_json::to_value(call).unwrap_or(Value::Null))
                        .collect()
                } else {
                    message
                        .tool_results
                        .iter()
                        .map(|result| serde_json::to_value(result).unwrap_or(Value::Null))
                        .collect()
                };
                Value::Array(entries)
            }
        }
    }

    /// Project into the backend-neutral chat-history form.
    pub fn to_chat_message(&self) -> Result<ChatMessage, ProtocolError> {
        match self {
            Message::Text(message) => Ok(ChatMessage {
                role: match message.role {
                    MessageRole::User => ChatRole::User,
                    MessageRole::Model => ChatRole::Assistant,
                },
                content: Some(message.text.clone()),
                tool_calls: Vec::new(),
            }),
            Message::Tool(message) => {
                message.validate()?;
                if !message.tool_calls.is_empty() {
                    Ok(ChatMessage {
                        role: ChatRole::Assistant,
                        content: None,
                        tool_calls: message
                            .tool_calls
                            .iter()
                            .map(|call| ChatToolCall {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                arguments: call.args_json(),
                            })
                            .collect(),
                    })
                } else {
                    Ok(ChatMessage {
                        role: ChatRole::Tool,
                        content: None,
                        tool_calls: message
                            .tool_results
                            .iter()
                            .map(|result| ChatToolCall {
                                id: result.id.clone(),
                                name: result.name.clone(),
                                arguments: serde_json::to_string(&result.result)
                                    .unwrap_or_default(),
                            })
                            .collect(),
                    })
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Vendor-neutral function call entry of a [`ChatMessage`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Chat-history entry in the common system/user/assistant/tool shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ChatToolCall>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}
