//! Private scratchpad tool
//!
//! Lets an agent reason in a tool call whose content is only echoed back to
//! itself, never shown to the other side of the conversation.

use agentloom_core::messaging::ToolArgs;
use agentloom_core::tools::{Tool, ToolBox, ToolParameterSchema, ToolSchema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const INTERNAL_THINKING_TOOL: &str = "internal_thinking";
pub const INTERNAL_THINKING_DESCRIPTION: &str = "Secret scratchpad to think about the next action";
pub const INTERNAL_THINKING_SYSTEM_PROMPT: &str =
    "Use internal_thinking to break down any situation and plan your next action";

/// Scratchpad tool - returns the thought it was given
pub struct InternalThinkingTool;

#[derive(Deserialize)]
struct InternalThinkingArgs {
    thought: String,
}

#[async_trait]
impl Tool for InternalThinkingTool {
    fn schema(&self) -> ToolSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "thought".to_string(),
            ToolParameterSchema::string("Your private reasoning about what to do next"),
        );

        ToolSchema::new(
            INTERNAL_THINKING_TOOL,
            INTERNAL_THINKING_DESCRIPTION,
            ToolParameterSchema::object("", properties, vec!["thought".to_string()]),
        )
        .with_system_prompt(INTERNAL_THINKING_SYSTEM_PROMPT)
        .with_return_type("string")
    }

    async fn execute(&self, args: ToolArgs) -> anyhow::Result<Value> {
        let args: InternalThinkingArgs = serde_json::from_value(Value::Object(args))?;
        tracing::debug!(len = args.thought.len(), "internal thought recorded");
        Ok(Value::String(args.thought))
    }
}

pub fn create_internal_thinking_tool() -> ToolBox {
    Arc::new(InternalThinkingTool)
}
