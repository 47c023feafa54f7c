mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentloom_core::llm::ToolMode;
use agentloom_core::messaging::Message;
use agentloom_runtime::{Llm, RateLimiter, RetryPolicy};
use common::ScriptedModel;

#[tokio::test]
async fn wrappers_share_the_process_wide_limiter() {
    let first = Llm::new(Arc::new(ScriptedModel::new(vec![Message::model("a")])))
        .with_retry_policy(RetryPolicy::new(1, Duration::ZERO, Duration::ZERO));
    let second = Llm::new(Arc::new(ScriptedModel::new(vec![Message::model("b")])))
        .with_retry_policy(RetryPolicy::new(1, Duration::ZERO, Duration::ZERO));
    assert!(Arc::ptr_eq(&first.parameters().rate_limiter, &RateLimiter::global()));

    let started = Instant::now();
    first.generate("", &[], &[], ToolMode::Auto).await.unwrap();
    second.generate("", &[], &[], ToolMode::Auto).await.unwrap();

    // The second call waits for the interval opened by the first.
    assert!(started.elapsed() >= Duration::from_millis(950));
}
