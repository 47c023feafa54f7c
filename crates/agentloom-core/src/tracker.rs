//! Telemetry sink contract and the stock sinks.
//!
//! The runtime calls a [`Tracker`] around every backend call and every raw tool
//! invocation. All methods default to no-ops, so an implementation only
//! overrides what it records.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::ToolMode;
use crate::messaging::{ExecutionResult, Message, ToolCall};
use crate::tools::ToolSchema;

pub trait Tracker: Send + Sync {
    /// Name of the agent currently driving the backend
    fn set_agent(&self, _agent: &str) {}

    fn log_tokens(&self, _prompt: u64, _completion: u64, _total: u64) {}

    fn log_metadata(&self, _metadata: &Map<String, Value>) {}

    /// Outgoing backend call
    fn on_request(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
        _tools: &[ToolSchema],
        _tool_mode: ToolMode,
    ) {
    }

    /// Message returned by a backend call
    fn on_response(&self, _message: &Message) {}

    fn on_retry(&self, _attempt: u32, _delay: Duration, _reason: &str) {}

    fn on_tool_start(&self, _call: &ToolCall) {}

    fn on_tool_end(&self, _call: &ToolCall, _result: &ExecutionResult) {}

    /// Accumulated usage, for sinks that keep counters
    fn usage(&self) -> Option<UsageSnapshot> {
        None
    }
}

/// Tracker that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl Tracker for NoopTracker {}

/// Tracker that emits usage through `tracing` and keeps the same counters
/// as [`UsageTracker`]
#[derive(Debug, Clone, Default)]
pub struct LoggingTracker {
    log_metadata: bool,
    agent: Arc<RwLock<Option<String>>>,
    counters: Arc<UsageTracker>,
}

impl LoggingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log model metadata after each call
    pub fn with_metadata(mut self) -> Self {
        self.log_metadata = true;
        self
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        self.counters.snapshot()
    }

    fn agent(&self) -> String {
        self.agent
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_default()
    }
}

impl Tracker for LoggingTracker {
    fn set_agent(&self, agent: &str) {
        *self
            .agent
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(agent.to_string());
    }

    fn log_tokens(&self, prompt: u64, completion: u64, total: u64) {
        self.counters.log_tokens(prompt, completion, total);
        tracing::info!(
            agent = %self.agent(),
            prompt_tokens = prompt,
            completion_tokens = completion,
            total_tokens = total,
            "token usage"
        );
    }

    fn log_metadata(&self, metadata: &Map<String, Value>) {
        if self.log_metadata {
            tracing::info!(agent = %self.agent(), metadata = %serde_json::Value::Object(metadata.clone()), "model metadata");
        }
    }

    fn on_retry(&self, attempt: u32, delay: Duration, reason: &str) {
        tracing::warn!(
            agent = %self.agent(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason,
            "backend call will be retried"
        );
    }

    fn on_tool_start(&self, call: &ToolCall) {
        tracing::debug!(agent = %self.agent(), tool = %call.name, args = %call.args_json(), "tool call");
    }

    fn on_tool_end(&self, call: &ToolCall, result: &ExecutionResult) {
        tracing::debug!(
            agent = %self.agent(),
            tool = %call.name,
            success = result.success,
            output = %result,
            "tool result"
        );
    }

    fn usage(&self) -> Option<UsageSnapshot> {
        Some(self.snapshot())
    }
}

/// Point-in-time copy of a [`UsageTracker`]'s counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub invocations: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageSnapshot {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Tracker that counts backend invocations and cumulative tokens
#[derive(Debug, Default)]
pub struct UsageTracker {
    invocations: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.invocations.store(0, Ordering::Relaxed);
        self.prompt_tokens.store(0, Ordering::Relaxed);
        self.completion_tokens.store(0, Ordering::Relaxed);
    }
}

impl Tracker for UsageTracker {
    fn log_tokens(&self, prompt: u64, completion: u64, _total: u64) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    fn usage(&self) -> Option<UsageSnapshot> {
        Some(self.snapshot())
    }
}

/// Usage summed over several trackers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStats {
    pub invocations: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenStats {
    /// Sum the counters of every tracker that keeps them
    pub fn collect<'a, I>(trackers: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<dyn Tracker>>,
    {
        trackers
            .into_iter()
            .filter_map(|tracker| tracker.usage())
            .fold(Self::default(), |mut stats, usage| {
                stats.invocations += usage.invocations;
                stats.prompt_tokens += usage.prompt_tokens;
                stats.completion_tokens += usage.completion_tokens;
                stats.total_tokens += usage.total_tokens();
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_tracker_accumulates() {
        let tracker = UsageTracker::new();
        tracker.log_tokens(10, 5, 15);
        tracker.log_tokens(3, 2, 5);
        assert_eq!(
            tracker.snapshot(),
            UsageSnapshot {
                invocations: 2,
                prompt_tokens: 13,
                completion_tokens: 7,
            }
        );
        tracker.reset();
        assert_eq!(tracker.snapshot(), UsageSnapshot::default());
    }

    #[test]
    fn token_stats_skip_counterless_trackers() {
        let first = Arc::new(UsageTracker::new());
        first.log_tokens(4, 1, 5);
        let second = Arc::new(UsageTracker::new());
        second.log_tokens(6, 2, 8);
        let trackers: Vec<Arc<dyn Tracker>> = vec![first, Arc::new(NoopTracker), second];

        let stats = TokenStats::collect(&trackers);
        assert_eq!(stats.invocations, 2);
        assert_eq!(stats.prompt_tokens, 10);
        assert_eq!(stats.completion_tokens, 3);
        assert_eq!(stats.total_tokens, 13);
    }

    #[test]
    fn logging_tracker_counts_what_it_logs() {
        let logging = LoggingTracker::new().with_metadata();
        logging.set_agent("Planner");
        logging.log_tokens(5, 2, 7);
        logging.log_tokens(1, 1, 2);
        assert_eq!(
            logging.snapshot(),
            UsageSnapshot {
                invocations: 2,
                prompt_tokens: 6,
                completion_tokens: 3,
            }
        );

        let counting = Arc::new(UsageTracker::new());
        counting.log_tokens(4, 0, 4);
        let trackers: Vec<Arc<dyn Tracker>> = vec![Arc::new(logging), counting];
        let stats = TokenStats::collect(&trackers);
        assert_eq!(stats.invocations, 3);
        assert_eq!(stats.total_tokens, 13);
    }
}
