//! Agents exposed as tools of other agents.
//!
//! A [`SubAgentTool`] runs the delegate's full `chat` turn on the `task`
//! argument and returns its final text. The tool only holds a weak reference
//! to the delegate, so delegation graphs never own each other; whoever built
//! the agents (usually a [`Team`](crate::team::Team)) keeps them alive.
//!
//! Every delegation runs one level deeper in a task-local counter. A
//! delegation that would exceed the callee's `max_delegation_depth` fails
//! like any other tool, so cyclic delegation graphs cannot recurse without
//! bound.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use agentloom_core::messaging::ToolArgs;
use agentloom_core::prompts::{subagent_description, SUBAGENT_TASK_DESCRIPTION};
use agentloom_core::tools::{Tool, ToolParameterSchema, ToolSchema};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::agent::{Agent, SubAgentOptions};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_.\-]").unwrap();
}

tokio::task_local! {
    static DELEGATION_DEPTH: usize;
}

/// Turn an agent name into an identifier-safe tool name: spaces become
/// underscores and anything outside `[A-Za-z0-9_.-]` is dropped.
pub fn sanitize_name(name: &str) -> String {
    INVALID_NAME_CHARS
        .replace_all(&name.replace(' ', "_"), "")
        .into_owned()
}

/// Nesting level of the delegation currently running on this task
pub fn delegation_depth() -> usize {
    DELEGATION_DEPTH.try_with(|depth| *depth).unwrap_or(0)
}

/// Run `agent`'s turn on `task` one delegation level deeper.
pub(crate) async fn delegate(agent: &Arc<Agent>, task: String) -> anyhow::Result<String> {
    let depth = delegation_depth();
    let limit = agent.config().max_delegation_depth;
    if depth >= limit {
        tracing::warn!(agent = %agent.name(), depth, limit, "delegation depth limit reached");
        anyhow::bail!(
            "delegation depth limit ({limit}) reached, refusing to delegate to '{}'",
            agent.name()
        );
    }
    tracing::debug!(agent = %agent.name(), depth = depth + 1, "delegating task");
    let reply = DELEGATION_DEPTH.scope(depth + 1, agent.chat(task)).await?;
    Ok(reply)
}

/// Tool wrapper around a delegate agent
pub struct SubAgentTool {
    agent: Weak<Agent>,
    agent_name: String,
    schema: ToolSchema,
}

impl SubAgentTool {
    pub(crate) fn new(agent: &Arc<Agent>, options: SubAgentOptions) -> Self {
        let SubAgentOptions {
            description,
            system_message,
        } = options;
        let description = description.unwrap_or_else(|| subagent_description(agent.name()));
        let mut properties = HashMap::new();
        properties.insert(
            "task".to_string(),
            ToolParameterSchema::string(SUBAGENT_TASK_DESCRIPTION),
        );
        let mut schema = ToolSchema::new(
            sanitize_name(agent.name()),
            description,
            ToolParameterSchema::object("", properties, vec!["task".to_string()]),
        )
        .with_return_type("string");
        if let Some(system_message) =
            system_message.or_else(|| agent.config().injected_system_message.clone())
        {
            schema = schema.with_system_prompt(system_message);
        }
        Self {
            agent: Arc::downgrade(agent),
            agent_name: agent.name().to_string(),
            schema,
        }
    }

    /// The delegate, unless it has been dropped
    pub fn agent(&self) -> Option<Arc<Agent>> {
        self.agent.upgrade()
    }

    /// Name of the delegate agent, before sanitizing
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Tool name the delegating agent sees
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

impl std::fmt::Debug for SubAgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubAgentTool")
            .field("name", &self.schema.name)
            .field("agent", &self.agent_name)
            .finish()
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, args: ToolArgs) -> anyhow::Result<Value> {
        let task = args
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing required string argument 'task'"))?;
        let agent = self.agent().ok_or_else(|| {
            anyhow::anyhow!("sub-agent '{}' is no longer available", self.agent_name)
        })?;
        let reply = delegate(&agent, task.to_string()).await?;
        Ok(Value::String(reply))
    }
}

/// Observation of a delegation, passed to
/// [`Agent::listen_to_all_delegations`] listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationEvent {
    /// `from` is about to hand `task` to `to`
    Request {
        from: String,
        to: String,
        task: String,
    },
    /// `to` finished and `from` receives `result`
    Response {
        from: String,
        to: String,
        result: String,
    },
}

pub type DelegationListener = Arc<dyn Fn(DelegationEvent) + Send + Sync>;
