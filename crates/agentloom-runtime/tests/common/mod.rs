#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentloom_core::error::LlmError;
use agentloom_core::llm::{LanguageModel, LlmRequest, LlmResponse, TokenUsage};
use agentloom_core::messaging::{ExecutionResult, Message, ToolCall};
use agentloom_core::tracker::Tracker;
use agentloom_runtime::{Llm, RateLimiter, RetryPolicy};
use async_trait::async_trait;
use serde_json::Value;

/// Backend that replays a fixed script of replies and records every request
pub struct ScriptedModel {
    script: Mutex<VecDeque<Message>>,
    fallback: Option<Message>,
    end_tool_mode: bool,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Message>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            end_tool_mode: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `message` once the script runs out
    pub fn repeating(mut self, message: Message) -> Self {
        self.fallback = Some(message);
        self
    }

    pub fn with_end_tool_mode(mut self) -> Self {
        self.end_tool_mode = true;
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        let message = next
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;
        Ok(LlmResponse::new(message)
            .with_usage(TokenUsage::new(10, 2))
            .with_metadata("model", "scripted"))
    }

    fn supports_end_tool_mode(&self) -> bool {
        self.end_tool_mode
    }
}

/// Backend wrapper without rate limiting or retry delays
pub fn fast_llm(model: Arc<ScriptedModel>) -> Llm {
    Llm::new(model)
        .with_rate_limiter(Arc::new(RateLimiter::unlimited()))
        .with_retry_policy(RetryPolicy::new(1, Duration::ZERO, Duration::ZERO))
}

pub fn call(name: &str, args: Value) -> ToolCall {
    ToolCall::from_raw(None, name, args).unwrap()
}

pub fn calls(entries: Vec<ToolCall>) -> Message {
    Message::tool_calls(entries)
}

/// Tracker that records agent and tool callbacks in order
#[derive(Default)]
pub struct RecordingTracker {
    events: Mutex<Vec<String>>,
}

impl RecordingTracker {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Tracker for RecordingTracker {
    fn set_agent(&self, agent: &str) {
        self.push(format!("agent {agent}"));
    }

    fn on_tool_start(&self, call: &ToolCall) {
        self.push(format!("start {} {}", call.name, call.args_json()));
    }

    fn on_tool_end(&self, call: &ToolCall, result: &ExecutionResult) {
        self.push(format!("end {} {} {}", call.name, result.success, result));
    }
}
