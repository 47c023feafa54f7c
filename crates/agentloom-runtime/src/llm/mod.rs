//! Backend wrapper applied around every concrete [`LanguageModel`].
//!
//! [`Llm`] adds the behaviour every backend shares: minimum-interval rate
//! limiting, retry with exponential backoff on [`LlmError::RetryLater`],
//! companion system texts of active tools, and telemetry hand-off to a
//! [`Tracker`].

mod rate_limit;
mod retry;

pub use rate_limit::{RateLimiter, DEFAULT_MIN_INTERVAL};
pub use retry::RetryPolicy;

use std::sync::Arc;

use agentloom_core::error::{AgentError, AgentResult, LlmError};
use agentloom_core::llm::{LanguageModel, LlmRequest, LlmResponse, ToolMode};
use agentloom_core::messaging::Message;
use agentloom_core::prompts::with_tool_system_texts;
use agentloom_core::tools::ToolSchema;
use agentloom_core::tracker::{NoopTracker, Tracker};
use tracing::Instrument;

/// Tunables for [`Llm`]
#[derive(Clone)]
pub struct LlmParameters {
    /// Whether the backend honours the `end_tool_mode` escape tool. `None`
    /// asks the backend itself.
    pub end_tool_mode: Option<bool>,
    pub retry: RetryPolicy,
    pub rate_limiter: Arc<RateLimiter>,
    pub tracker: Arc<dyn Tracker>,
}

impl Default for LlmParameters {
    fn default() -> Self {
        Self {
            end_tool_mode: None,
            retry: RetryPolicy::default(),
            rate_limiter: RateLimiter::global(),
            tracker: Arc::new(NoopTracker),
        }
    }
}

/// Cheaply clonable handle to a backend plus its shared call policy
#[derive(Clone)]
pub struct Llm {
    model: Arc<dyn LanguageModel>,
    params: LlmParameters,
}

impl Llm {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::with_parameters(model, LlmParameters::default())
    }

    pub fn with_parameters(model: Arc<dyn LanguageModel>, params: LlmParameters) -> Self {
        Self { model, params }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn Tracker>) -> Self {
        self.params.tracker = tracker;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.params.retry = retry;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.params.rate_limiter = rate_limiter;
        self
    }

    pub fn with_end_tool_mode(mut self, enabled: bool) -> Self {
        self.params.end_tool_mode = Some(enabled);
        self
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    pub fn tracker(&self) -> &Arc<dyn Tracker> {
        &self.params.tracker
    }

    pub fn parameters(&self) -> &LlmParameters {
        &self.params
    }

    pub fn supports_end_tool_mode(&self) -> bool {
        self.params
            .end_tool_mode
            .unwrap_or_else(|| self.model.supports_end_tool_mode())
    }

    /// Produce the next message of a conversation.
    ///
    /// Each physical call waits on the rate limiter first. Retryable failures
    /// are retried with backoff until the policy's attempts are used up; any
    /// other failure is returned immediately.
    pub async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_mode: ToolMode,
    ) -> AgentResult<Message> {
        let system_prompt = with_tool_system_texts(
            system_prompt,
            tools.iter().filter_map(|tool| tool.system_prompt.as_deref()),
        );
        let request = LlmRequest::new(system_prompt, messages.to_vec())
            .with_tools(tools.to_vec(), tool_mode);
        let tracker = &self.params.tracker;
        tracker.on_request(&request.system_prompt, messages, tools, tool_mode);

        let span = tracing::debug_span!("llm", tools = tools.len(), tool_mode = %tool_mode);
        let response = self.call_with_retry(request).instrument(span).await?;

        if let Some(usage) = response.usage {
            tracker.log_tokens(
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
            );
        }
        let mut metadata = self.model.describe();
        metadata.extend(response.metadata);
        if !metadata.is_empty() {
            tracker.log_metadata(&metadata);
        }

        response.message.validate()?;
        tracker.on_response(&response.message);
        Ok(response.message)
    }

    async fn call_with_retry(&self, request: LlmRequest) -> AgentResult<LlmResponse> {
        let policy = self.params.retry;
        let mut last_reason = String::new();

        for attempt in 0..policy.max_attempts {
            self.params.rate_limiter.acquire().await;
            tracing::debug!(attempt = attempt + 1, "calling backend");

            match self.model.generate(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(LlmError::RetryLater { reason, original }) => {
                    if attempt + 1 == policy.max_attempts {
                        tracing::warn!(attempts = policy.max_attempts, %reason, "backend retries exhausted");
                        last_reason = reason;
                        break;
                    }
                    let delay = policy.delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        cause = ?original,
                        "backend asked to retry later"
                    );
                    self.params.tracker.on_retry(attempt + 1, delay, &reason);
                    last_reason = reason;
                    tokio::time::sleep(delay).await;
                }
                Err(LlmError::Protocol(err)) => {
                    tracing::error!(error = %err, "backend reply violates the message protocol");
                    return Err(AgentError::Protocol(err));
                }
                Err(LlmError::Fatal(err)) => {
                    tracing::error!(error = %err, "backend call failed");
                    return Err(AgentError::Backend(err));
                }
            }
        }

        Err(AgentError::MaxRetriesExceeded {
            attempts: policy.max_attempts,
            last_reason,
        })
    }
}

impl std::fmt::Debug for Llm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Llm")
            .field("end_tool_mode", &self.supports_end_tool_mode())
            .field("retry", &self.params.retry)
            .field("min_interval", &self.params.rate_limiter.min_interval())
            .finish_non_exhaustive()
    }
}
