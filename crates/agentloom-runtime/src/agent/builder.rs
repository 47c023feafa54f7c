//! Fluent builder API for constructing agents

use std::sync::Arc;

use agentloom_core::llm::{LanguageModel, ToolMode};
use agentloom_core::tools::ToolBox;

use super::config::{AgentConfig, SubAgentOptions};
use super::runtime::Agent;
use crate::llm::Llm;

/// Builder API to assemble an [`Agent`] in a single fluent flow.
///
/// ```ignore
/// let agent = Agent::builder("Planner")
///     .with_system_prompt("You plan trips.")
///     .with_model(model)
///     .with_max_iterations(5)
///     .build()?;
/// ```
pub struct AgentBuilder {
    config: AgentConfig,
    llm: Option<Llm>,
    tools: Vec<ToolBox>,
    sub_agents: Vec<(Arc<Agent>, SubAgentOptions)>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: AgentConfig::new(name),
            llm: None,
            tools: Vec::new(),
            sub_agents: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.config.system_prompt = system_prompt.into();
        self
    }

    /// Use a backend with the default call policy (process-wide rate limiter,
    /// 5 retry attempts, no tracker)
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(Llm::new(model));
        self
    }

    /// Use a fully configured backend wrapper
    pub fn with_llm(mut self, llm: Llm) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_tool(mut self, tool: ToolBox) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools<I>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = ToolBox>,
    {
        self.tools.extend(tools);
        self
    }

    /// Register `agent` as a delegate. The caller keeps it alive; the new
    /// agent only holds a weak reference.
    pub fn with_sub_agent(mut self, agent: &Arc<Agent>) -> Self {
        self.sub_agents.push((agent.clone(), SubAgentOptions::default()));
        self
    }

    pub fn with_sub_agent_options(mut self, agent: &Arc<Agent>, options: SubAgentOptions) -> Self {
        self.sub_agents.push((agent.clone(), options));
        self
    }

    /// Set the number of backend calls a single turn may use (default 10).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_tool_mode(mut self, tool_mode: ToolMode) -> Self {
        self.config.default_tool_mode = tool_mode;
        self
    }

    pub fn with_poking(mut self, allow: bool) -> Self {
        self.config.allow_poking = allow;
        self
    }

    pub fn with_injected_system_message(mut self, message: impl Into<String>) -> Self {
        self.config.injected_system_message = Some(message.into());
        self
    }

    pub fn with_max_delegation_depth(mut self, depth: usize) -> Self {
        self.config.max_delegation_depth = depth;
        self
    }

    pub fn build(self) -> anyhow::Result<Arc<Agent>> {
        let Self {
            config,
            llm,
            tools,
            sub_agents,
        } = self;

        anyhow::ensure!(
            config.max_iterations > 0,
            "max_iterations must be greater than 0"
        );
        let llm = llm.ok_or_else(|| {
            anyhow::anyhow!("agent '{}' needs a model: call with_model or with_llm", config.name)
        })?;

        let agent = Arc::new(Agent::from_parts(config, llm));
        for tool in tools {
            agent.add_tool(tool);
        }
        for (sub_agent, options) in sub_agents {
            agent.add_sub_agent_with(&sub_agent, options);
        }
        Ok(agent)
    }
}
