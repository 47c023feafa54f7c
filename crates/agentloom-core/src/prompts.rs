//! Fixed texts the runtime shows to models.

/// Heading under which companion system texts of active tools are appended
pub const AVAILABLE_TOOLS_HEADING: &str = "Available Tools:";

/// Prompt sent by `poke` when an agent is triggered without user input
pub const POKE_PROMPT: &str = "Hey, I am ready, interact with me!";

/// Name of the synthetic escape tool injected while tool calls are forced
pub const END_TOOL_MODE_TOOL: &str = "end_tool_mode";

pub const END_TOOL_MODE_DESCRIPTION: &str =
    "Call this tool when you are done using tools and want to reply with plain text.";

/// Name of the synthetic tool that captures a structured answer
pub const SET_OUTPUT_TOOL: &str = "set_output";

pub const SET_OUTPUT_DESCRIPTION: &str =
    "Set the final output. The arguments must follow the requested result schema exactly.";

/// Default description of an agent exposed as a tool; `{name}` is substituted
pub const SUBAGENT_DESCRIPTION_TEMPLATE: &str = "Delegate a task to {name} and get back the result";

pub const SUBAGENT_TASK_DESCRIPTION: &str = "The task to delegate";

pub fn subagent_description(name: &str) -> String {
    SUBAGENT_DESCRIPTION_TEMPLATE.replace("{name}", name)
}

/// Append the companion texts of the active tools to a system prompt
pub fn with_tool_system_texts<'a, I>(system_prompt: &str, texts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let texts: Vec<&str> = texts.into_iter().filter(|text| !text.is_empty()).collect();
    if texts.is_empty() {
        return system_prompt.to_string();
    }
    let mut prompt = String::from(system_prompt);
    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str(AVAILABLE_TOOLS_HEADING);
    for text in texts {
        prompt.push('\n');
        prompt.push_str(text);
    }
    prompt
}
