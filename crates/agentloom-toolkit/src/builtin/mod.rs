//! Built-in tools for common agent operations

pub mod thinking;

pub use thinking::{
    create_internal_thinking_tool, InternalThinkingTool, INTERNAL_THINKING_DESCRIPTION,
    INTERNAL_THINKING_SYSTEM_PROMPT, INTERNAL_THINKING_TOOL,
};
