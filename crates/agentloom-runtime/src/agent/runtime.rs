//! Agent runtime implementation
//!
//! This module contains the [`Agent`] struct and its turn loop: backend calls
//! under the configured tool mode, tool execution through the hook pipeline,
//! structured answers, and delegation to sub-agents.
//!
//! Locks guarding history, tools, hooks and sub-agents are never held across
//! an await. A turn works on a snapshot of the history and appends its own
//! messages when it ends, so delegation cycles (A asks B asks A) cannot
//! deadlock and a nested turn's messages are kept alongside the outer one.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use agentloom_core::error::{AgentError, AgentResult, SchemaError};
use agentloom_core::llm::ToolMode;
use agentloom_core::messaging::{ExecutionResult, Message, ToolCall, ToolResult};
use agentloom_core::prompts::{
    END_TOOL_MODE_DESCRIPTION, END_TOOL_MODE_TOOL, POKE_PROMPT, SET_OUTPUT_DESCRIPTION,
    SET_OUTPUT_TOOL,
};
use agentloom_core::tools::{
    FunctionTool, ToolBox, ToolParameterSchema, ToolRegistry, ToolSchema,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;

use super::builder::AgentBuilder;
use super::config::{AgentConfig, SubAgentOptions, TurnOptions};
use crate::hooks::{HookHandle, HookMap, PostHook, PreHook};
use crate::llm::Llm;
use crate::subagent::{DelegationEvent, DelegationListener, SubAgentTool};

/// Condition under which a turn ends successfully
type StopPredicate<'a> = &'a (dyn Fn(&Message) -> bool + Send + Sync);

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A stateful conversational actor bound to one backend.
///
/// Agents are shared as `Arc<Agent>`: the same instance can be chatted with
/// directly, registered as a sub-agent of several other agents, and linked
/// into conversations.
pub struct Agent {
    config: AgentConfig,
    llm: Llm,
    history: RwLock<Vec<Message>>,
    tools: RwLock<ToolRegistry>,
    hooks: RwLock<HookMap>,
    sub_agents: RwLock<Vec<Arc<SubAgentTool>>>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub(crate) fn from_parts(config: AgentConfig, llm: Llm) -> Self {
        Self {
            config,
            llm,
            history: RwLock::new(Vec::new()),
            tools: RwLock::new(ToolRegistry::new()),
            hooks: RwLock::new(HookMap::new()),
            sub_agents: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn llm(&self) -> &Llm {
        &self.llm
    }

    /// Snapshot of the conversation so far
    pub fn history(&self) -> Vec<Message> {
        read(&self.history).clone()
    }

    pub fn clear_history(&self) {
        write(&self.history).clear();
    }

    pub fn add_tool(&self, tool: ToolBox) {
        let name = tool.schema().name;
        tracing::debug!(agent = %self.config.name, tool = %name, "registering tool");
        write(&self.tools).register(tool);
    }

    pub fn add_tools<I>(&self, tools: I)
    where
        I: IntoIterator<Item = ToolBox>,
    {
        for tool in tools {
            self.add_tool(tool);
        }
    }

    /// Unregister a tool (or sub-agent tool) by name
    pub fn remove_tool(&self, name: &str) -> Option<ToolBox> {
        let removed = write(&self.tools).remove(name);
        write(&self.sub_agents).retain(|tool| tool.name() != name);
        removed
    }

    /// Tool names in registration order
    pub fn tool_names(&self) -> Vec<String> {
        read(&self.tools).names()
    }

    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        read(&self.tools).schemas()
    }

    /// Attach interceptors to every execution of `tool`.
    pub fn add_tool_hook(
        &self,
        tool: impl Into<String>,
        pre: Option<PreHook>,
        post: Option<PostHook>,
    ) -> HookHandle {
        write(&self.hooks).add(tool, pre, post)
    }

    pub fn add_pre_hook<F>(&self, tool: impl Into<String>, hook: F) -> HookHandle
    where
        F: Fn(&ToolCall) -> Option<ToolCall> + Send + Sync + 'static,
    {
        self.add_tool_hook(tool, Some(Arc::new(hook)), None)
    }

    pub fn add_post_hook<F>(&self, tool: impl Into<String>, hook: F) -> HookHandle
    where
        F: Fn(&ToolCall, &ExecutionResult) -> Option<ExecutionResult> + Send + Sync + 'static,
    {
        self.add_tool_hook(tool, None, Some(Arc::new(hook)))
    }

    /// Remove exactly the registration behind `handle`
    pub fn remove_tool_hook(&self, handle: &HookHandle) -> bool {
        write(&self.hooks).remove(handle)
    }

    /// Run one conversational turn with the configured defaults.
    pub async fn chat(&self, input: impl Into<String>) -> AgentResult<String> {
        self.chat_with(input, TurnOptions::default()).await
    }

    /// Run one conversational turn, overriding the tool mode or iteration
    /// budget for this turn only.
    pub async fn chat_with(
        &self,
        input: impl Into<String>,
        options: TurnOptions,
    ) -> AgentResult<String> {
        let input = input.into();
        let tool_mode = options.tool_mode.unwrap_or(self.config.default_tool_mode);
        let max_iterations = options.max_iterations.unwrap_or(self.config.max_iterations);
        let span = tracing::info_span!("agent", agent = %self.config.name);

        async move {
            self.llm.tracker().set_agent(&self.config.name);
            tracing::info!(%tool_mode, max_iterations, "turn started");

            let mut history = self.history();
            let base = history.len();
            history.push(Message::user(input));
            let tools = read(&self.tools).clone();

            let outcome = self
                .run_loop(&mut history, &tools, tool_mode, max_iterations, &Message::is_text)
                .await;
            // Nested turns on this agent may have appended meanwhile.
            write(&self.history).extend(history.drain(base..));

            match outcome? {
                Message::Text(message) => {
                    tracing::info!(reply_len = message.text.len(), "turn finished");
                    Ok(message.text)
                }
                other => Err(AgentError::UnexpectedFinalMessage(other.kind())),
            }
        }
        .instrument(span)
        .await
    }

    /// Start a turn without user input.
    pub async fn poke(&self) -> AgentResult<String> {
        if !self.config.allow_poking {
            return Err(AgentError::PokingDisabled(self.config.name.clone()));
        }
        self.chat(POKE_PROMPT).await
    }

    /// Ask for an answer shaped by `schema`.
    ///
    /// Runs a single forced iteration against a synthetic `set_output` tool
    /// whose parameters are `schema`, on a copy of the history; the agent's
    /// own history is left untouched.
    pub async fn structured_answer(
        &self,
        input: impl Into<String>,
        schema: ToolParameterSchema,
    ) -> AgentResult<Value> {
        if schema.schema_type != "object" {
            return Err(SchemaError::NotAnObject(schema.schema_type).into());
        }
        let input = input.into();
        let expected = Arc::new(schema.clone());
        let set_output = FunctionTool::new(
            ToolSchema::new(SET_OUTPUT_TOOL, SET_OUTPUT_DESCRIPTION, schema),
            move |args| {
                let expected = expected.clone();
                async move {
                    let output = Value::Object(args);
                    expected.check_value(&output)?;
                    Ok(output)
                }
            },
        );
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(set_output));

        let span = tracing::info_span!("agent", agent = %self.config.name);
        async move {
            self.llm.tracker().set_agent(&self.config.name);
            let mut history = self.history();
            history.push(Message::user(input));

            let produced_output = |message: &Message| {
                message
                    .as_tool()
                    .is_some_and(|tool| tool.get(SET_OUTPUT_TOOL).is_some())
            };
            let message = self
                .run_loop(&mut history, &tools, ToolMode::Force, 1, &produced_output)
                .await
                .map_err(|err| match err {
                    AgentError::MaxIterations { .. } => {
                        AgentError::StructuredOutput(format!("the model did not call {SET_OUTPUT_TOOL}"))
                    }
                    other => other,
                })?;

            let result = message
                .as_tool()
                .and_then(|tool| tool.get(SET_OUTPUT_TOOL))
                .cloned()
                .ok_or_else(|| {
                    AgentError::StructuredOutput(format!("no {SET_OUTPUT_TOOL} result recorded"))
                })?;
            if result.success {
                Ok(result.output.unwrap_or(Value::Null))
            } else {
                Err(AgentError::StructuredOutput(result.error.unwrap_or_default()))
            }
        }
        .instrument(span)
        .await
    }

    /// Typed variant of [`structured_answer`](Self::structured_answer)
    pub async fn structured_answer_as<T>(
        &self,
        input: impl Into<String>,
        schema: ToolParameterSchema,
    ) -> AgentResult<T>
    where
        T: DeserializeOwned,
    {
        let value = self.structured_answer(input, schema).await?;
        serde_json::from_value(value).map_err(|err| AgentError::StructuredOutput(err.to_string()))
    }

    /// Expose this agent as a tool that other agents can call.
    pub fn as_subagent(self: &Arc<Self>, options: SubAgentOptions) -> SubAgentTool {
        SubAgentTool::new(self, options)
    }

    /// Register `agent` as a sub-agent; returns the tool name it is exposed under
    pub fn add_sub_agent(&self, agent: &Arc<Agent>) -> String {
        self.add_sub_agent_with(agent, SubAgentOptions::default())
    }

    pub fn add_sub_agent_with(&self, agent: &Arc<Agent>, options: SubAgentOptions) -> String {
        let tool = Arc::new(agent.as_subagent(options));
        let name = tool.name().to_string();
        tracing::debug!(agent = %self.config.name, sub_agent = %agent.name(), tool = %name, "registering sub-agent");
        write(&self.tools).register(tool.clone());
        let mut sub_agents = write(&self.sub_agents);
        sub_agents.retain(|existing| existing.name() != name);
        sub_agents.push(tool);
        name
    }

    /// Direct sub-agents still alive, in registration order
    pub fn sub_agents(&self) -> Vec<Arc<Agent>> {
        read(&self.sub_agents)
            .iter()
            .filter_map(|tool| tool.agent())
            .collect()
    }

    fn sub_agent_tools(&self) -> Vec<Arc<SubAgentTool>> {
        read(&self.sub_agents).clone()
    }

    /// This agent followed by every agent reachable through delegation,
    /// depth-first, each listed once even when the graph has cycles.
    pub fn get_all_subagents(self: &Arc<Self>) -> Vec<Arc<Agent>> {
        fn visit(agent: &Arc<Agent>, seen: &mut Vec<Arc<Agent>>) {
            if seen.iter().any(|known| Arc::ptr_eq(known, agent)) {
                return;
            }
            seen.push(agent.clone());
            for child in agent.sub_agents() {
                visit(&child, seen);
            }
        }

        let mut seen = Vec::new();
        visit(self, &mut seen);
        seen
    }

    /// Observe every delegation in this agent's delegation tree.
    ///
    /// The listener sees a [`DelegationEvent::Request`] before each sub-agent
    /// call and a [`DelegationEvent::Response`] after it. Control flow is not
    /// affected.
    pub fn listen_to_all_delegations<F>(self: &Arc<Self>, listener: F) -> DelegationListenerHandle
    where
        F: Fn(DelegationEvent) + Send + Sync + 'static,
    {
        let listener: DelegationListener = Arc::new(listener);
        let mut registrations = Vec::new();

        for agent in self.get_all_subagents() {
            for tool in agent.sub_agent_tools() {
                let from = agent.name().to_string();
                let to = tool.agent_name().to_string();

                let pre: PreHook = {
                    let listener = listener.clone();
                    let (from, to) = (from.clone(), to.clone());
                    Arc::new(move |call: &ToolCall| {
                        let task = call.arg("task").and_then(Value::as_str).unwrap_or_default();
                        listener(DelegationEvent::Request {
                            from: from.clone(),
                            to: to.clone(),
                            task: task.to_string(),
                        });
                        None
                    })
                };
                let post: PostHook = {
                    let listener = listener.clone();
                    Arc::new(move |_: &ToolCall, result: &ExecutionResult| {
                        listener(DelegationEvent::Response {
                            from: from.clone(),
                            to: to.clone(),
                            result: result.to_string(),
                        });
                        None
                    })
                };

                let handle = agent.add_tool_hook(tool.name(), Some(pre), Some(post));
                registrations.push((Arc::downgrade(&agent), handle));
            }
        }

        DelegationListenerHandle { registrations }
    }

    /// Drive the backend until `stop` matches a message appended to history.
    async fn run_loop(
        &self,
        history: &mut Vec<Message>,
        tools: &ToolRegistry,
        tool_mode: ToolMode,
        max_iterations: usize,
        stop: StopPredicate<'_>,
    ) -> AgentResult<Message> {
        let mut iterations_left = max_iterations;
        let mut tool_mode = tool_mode;
        let supports_escape = self.llm.supports_end_tool_mode();

        loop {
            if iterations_left == 0 {
                tracing::warn!(limit = max_iterations, "iteration budget exhausted");
                return Err(AgentError::MaxIterations {
                    agent: self.config.name.clone(),
                    limit: max_iterations,
                });
            }

            let escape = tool_mode == ToolMode::Force && supports_escape;
            let mut schemas = tools.schemas();
            if escape {
                schemas.push(ToolSchema::no_params(
                    END_TOOL_MODE_TOOL,
                    END_TOOL_MODE_DESCRIPTION,
                ));
            }
            tracing::debug!(
                iteration = max_iterations - iterations_left + 1,
                %tool_mode,
                tools = schemas.len(),
                "requesting next message"
            );

            let response = self
                .llm
                .generate(&self.config.system_prompt, history, &schemas, tool_mode)
                .await?;

            if escape
                && response
                    .requested_calls()
                    .iter()
                    .any(|call| call.name == END_TOOL_MODE_TOOL)
            {
                tracing::debug!("model ended forced tool mode");
                tool_mode = ToolMode::Auto;
                continue;
            }
            if tool_mode == ToolMode::Force && !supports_escape {
                // Only the first call can be forced without an escape hatch.
                tool_mode = ToolMode::Auto;
            }

            history.push(response.clone());
            if stop(&response) {
                return Ok(response);
            }

            let calls = response.requested_calls();
            if !calls.is_empty() {
                let results = self.execute_tool_calls(tools, calls).await;
                let message = Message::tool_results(results);
                history.push(message.clone());
                if stop(&message) {
                    return Ok(message);
                }
            }

            iterations_left -= 1;
        }
    }

    async fn execute_tool_calls(&self, tools: &ToolRegistry, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_tool_call(tools, call).await);
        }
        results
    }

    async fn execute_tool_call(&self, tools: &ToolRegistry, original: &ToolCall) -> ToolResult {
        let hooks = read(&self.hooks).for_tool(&original.name);
        let call = hooks.apply_pre(original.clone());
        let result = self.invoke_tool(tools, &call).await;
        let result = hooks.apply_post(&call, result);
        ToolResult::for_call(original, result)
    }

    async fn invoke_tool(&self, tools: &ToolRegistry, call: &ToolCall) -> ExecutionResult {
        let tracker = self.llm.tracker();
        tracker.on_tool_start(call);

        let result = match tools.get(&call.name).cloned() {
            Some(tool) => {
                let span = tracing::debug_span!("tool", tool = %call.name);
                match tool.execute(call.args.clone()).instrument(span).await {
                    Ok(output) => ExecutionResult::success(output),
                    Err(err) => {
                        tracing::warn!(tool = %call.name, error = %err, "tool failed");
                        ExecutionResult::failure(format!("{err:#}"))
                    }
                }
            }
            None => {
                tracing::warn!(tool = %call.name, "model requested an unknown tool");
                ExecutionResult::failure(format!(
                    "Tool '{}' does not exist. Available tools: {}",
                    call.name,
                    tools.names().join(", ")
                ))
            }
        };

        tracker.on_tool_end(call, &result);
        result
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("tools", &self.tool_names())
            .field("history_len", &read(&self.history).len())
            .finish_non_exhaustive()
    }
}

/// Hooks installed by [`Agent::listen_to_all_delegations`]
#[derive(Debug, Default)]
pub struct DelegationListenerHandle {
    registrations: Vec<(Weak<Agent>, HookHandle)>,
}

impl DelegationListenerHandle {
    /// Number of sub-agent tools being observed
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Detach the listener; returns how many hooks were still installed
    pub fn remove(self) -> usize {
        self.registrations
            .into_iter()
            .filter(|(agent, handle)| {
                agent
                    .upgrade()
                    .is_some_and(|agent| agent.remove_tool_hook(handle))
            })
            .count()
    }
}
