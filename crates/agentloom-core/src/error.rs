//! Error taxonomy shared by the core contracts and the runtime.
//!
//! Tool failures never appear here: they are folded into
//! [`ExecutionResult`](crate::messaging::ExecutionResult) values and fed back to
//! the model as conversation content.

use thiserror::Error;

/// Violations of the message/tool protocol.
///
/// These signal a backend or adapter contract breach and terminate the turn.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Tool-call arguments arrived as text that is not well-formed JSON
    #[error("invalid tool call arguments for '{tool}': {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    /// Tool-call arguments decoded, but not to a key/value mapping
    #[error("tool call arguments for '{tool}' must be an object, got {kind}")]
    ArgumentsNotObject { tool: String, kind: &'static str },

    /// A tool message carried both calls and results
    #[error("tool message must not carry both tool calls and tool results")]
    MixedToolMessage,

    /// A tool message carried neither calls nor results
    #[error("tool message must carry either tool calls or tool results")]
    EmptyToolMessage,

    /// Two calls in the same message share an id
    #[error("duplicate tool call id '{0}' in a single message")]
    DuplicateCallId(String),
}

/// Errors raised while projecting tool schemas into a backend vocabulary.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("type '{type_name}' of parameter '{parameter}' is not supported, and no default type is provided")]
    UnsupportedType {
        parameter: String,
        type_name: String,
    },

    #[error("tool parameters must be described by an object schema, got '{0}'")]
    NotAnObject(String),

    #[error("missing required field '{path}'")]
    MissingField { path: String },

    #[error("field '{path}' should be {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: &'static str,
    },

    #[error("field '{path}' does not allow value {value}")]
    NotAllowed { path: String, value: String },
}

/// Failures surfaced by a concrete backend.
///
/// Adapters map provider rate limits and transient generation failures to
/// [`LlmError::RetryLater`]. Undecodable replies are [`LlmError::Protocol`];
/// those and [`LlmError::Fatal`] are never retried.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("retry later: {reason}")]
    RetryLater {
        reason: String,
        original: Option<anyhow::Error>,
    },

    /// The backend reply could not be decoded into protocol messages
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl LlmError {
    /// Create a retryable error without an underlying cause
    pub fn retry_later(reason: impl Into<String>) -> Self {
        LlmError::RetryLater {
            reason: reason.into(),
            original: None,
        }
    }

    /// Create a retryable error wrapping the provider's original failure
    pub fn retry_later_with(reason: impl Into<String>, original: impl Into<anyhow::Error>) -> Self {
        LlmError::RetryLater {
            reason: reason.into(),
            original: Some(original.into()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RetryLater { .. })
    }
}

/// Fatal errors returned to the caller of an agent turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent kept requesting tools without meeting its stop condition
    #[error("agent '{agent}' reached max iterations ({limit}) while processing user input")]
    MaxIterations { agent: String, limit: usize },

    /// Every attempt of a backend call failed with a retryable error
    #[error("max retries exceeded after {attempts} attempts (last reason: {last_reason})")]
    MaxRetriesExceeded { attempts: u32, last_reason: String },

    /// Non-retryable backend failure
    #[error("backend error: {0}")]
    Backend(anyhow::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// `poke` was called on an agent that does not allow it
    #[error("poking is not allowed for {0}")]
    PokingDisabled(String),

    /// The structured-answer tool did not yield a usable value
    #[error("structured output failed: {0}")]
    StructuredOutput(String),

    /// An agent referenced by a team operation is not a member
    #[error("agent '{0}' is not a member of the team")]
    UnknownMember(String),

    /// The turn ended without the expected final message shape
    #[error("turn ended without a text reply (last message was a {0} message)")]
    UnexpectedFinalMessage(&'static str),
}

impl AgentError {
    /// Whether this error signals a runaway tool loop
    pub fn is_max_iterations(&self) -> bool {
        matches!(self, AgentError::MaxIterations { .. })
    }
}

/// Result alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
