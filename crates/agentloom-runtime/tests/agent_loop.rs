mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agentloom_core::error::{AgentError, ProtocolError};
use agentloom_core::llm::ToolMode;
use agentloom_core::messaging::{ExecutionResult, Message, ToolArgs, ToolCall};
use agentloom_core::prompts::{END_TOOL_MODE_TOOL, POKE_PROMPT, SET_OUTPUT_TOOL};
use agentloom_core::tools::{FunctionTool, ToolBox, ToolParameterSchema, ToolSchema};
use agentloom_core::tracker::UsageTracker;
use agentloom_runtime::{Agent, TurnOptions};
use common::{call, calls, fast_llm, RecordingTracker, ScriptedModel};
use serde::Deserialize;
use serde_json::{json, Value};

fn add_schema() -> ToolSchema {
    let mut properties = HashMap::new();
    properties.insert("a".to_string(), ToolParameterSchema::integer(""));
    properties.insert("b".to_string(), ToolParameterSchema::integer(""));
    ToolSchema::new(
        "add",
        "Add two integers",
        ToolParameterSchema::object("", properties, vec!["a".into(), "b".into()]),
    )
    .with_return_type("integer")
}

fn add_tool(seen: Arc<Mutex<Vec<ToolArgs>>>) -> ToolBox {
    Arc::new(FunctionTool::new(add_schema(), move |args: ToolArgs| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().push(args.clone());
            let a = args.get("a").and_then(Value::as_i64).unwrap_or_default();
            let b = args.get("b").and_then(Value::as_i64).unwrap_or_default();
            Ok(json!(a + b))
        }
    }))
}

fn failing_tool() -> ToolBox {
    Arc::new(FunctionTool::new(
        ToolSchema::no_params("explode", "Always fails"),
        |_| async { Err(anyhow::anyhow!("kaboom")) },
    ))
}

fn agent_with(model: &Arc<ScriptedModel>, max_iterations: usize) -> Arc<Agent> {
    Agent::builder("Calculator")
        .with_system_prompt("You add numbers.")
        .with_llm(fast_llm(model.clone()))
        .with_max_iterations(max_iterations)
        .build()
        .unwrap()
}

#[tokio::test]
async fn forced_tool_call_then_text_reply() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(vec![call("add", json!({"a": 2, "b": 3}))]),
        Message::model("5"),
    ]));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let agent = Agent::builder("Calculator")
        .with_llm(fast_llm(model.clone()))
        .with_tool_mode(ToolMode::Force)
        .with_tool(add_tool(seen.clone()))
        .build()
        .unwrap();

    assert_eq!(agent.chat("sum").await.unwrap(), "5");

    let history = agent.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0], Message::user("sum"));
    assert_eq!(history[1].requested_calls()[0].name, "add");
    let results = history[2].as_tool().unwrap();
    assert_eq!(results.get("add").unwrap().output, Some(json!(5)));
    assert_eq!(results.tool_results[0].id, history[1].requested_calls()[0].id);
    assert_eq!(history[3], Message::model("5"));
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Without the escape convention only the first call is forced.
    let modes: Vec<ToolMode> = model.requests().iter().map(|r| r.tool_mode).collect();
    assert_eq!(modes, vec![ToolMode::Force, ToolMode::Auto]);
}

#[tokio::test]
async fn runaway_tool_use_exhausts_the_budget() {
    let model = Arc::new(
        ScriptedModel::new(vec![]).repeating(calls(vec![call("add", json!({"a": 1, "b": 1}))])),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let agent = agent_with(&model, 3);
    agent.add_tool(add_tool(seen.clone()));

    let err = agent.chat("loop forever").await.unwrap_err();
    assert!(matches!(err, AgentError::MaxIterations { limit: 3, ref agent } if agent == "Calculator"));
    assert_eq!(model.request_count(), 3);
    assert_eq!(seen.lock().unwrap().len(), 3);
    // request + 3 x (calls, results)
    assert_eq!(agent.history().len(), 7);
}

#[tokio::test]
async fn per_turn_budget_override() {
    let model = Arc::new(
        ScriptedModel::new(vec![]).repeating(calls(vec![call("add", json!({"a": 1, "b": 1}))])),
    );
    let agent = agent_with(&model, 10);
    agent.add_tool(add_tool(Arc::new(Mutex::new(Vec::new()))));

    let err = agent
        .chat_with("go", TurnOptions::default().with_max_iterations(2))
        .await
        .unwrap_err();
    assert!(err.is_max_iterations());
    assert_eq!(model.request_count(), 2);
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(vec![call("multiply", json!({"a": 2}))]),
        Message::model("sorry"),
    ]));
    let agent = agent_with(&model, 5);
    agent.add_tool(add_tool(Arc::new(Mutex::new(Vec::new()))));
    agent.add_tool(failing_tool());

    assert_eq!(agent.chat("times").await.unwrap(), "sorry");

    let history = agent.history();
    let result = history[2].as_tool().unwrap().get("multiply").unwrap().clone();
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("multiply"));
    assert!(error.contains("add, explode"));

    // The next request carries the failure back to the model.
    let second = &model.requests()[1];
    assert_eq!(second.messages.len(), 3);
}

#[tokio::test]
async fn tracker_sees_every_tool_call() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(vec![
            call("add", json!({"a": 1})),
            call("explode", json!({})),
            call("missing", json!({})),
        ]),
        Message::model("done"),
    ]));
    let tracker = Arc::new(RecordingTracker::default());
    let agent = Agent::builder("Calculator")
        .with_llm(fast_llm(model.clone()).with_tracker(tracker.clone()))
        .with_tool(add_tool(Arc::new(Mutex::new(Vec::new()))))
        .with_tool(failing_tool())
        .build()
        .unwrap();

    assert_eq!(agent.chat("go").await.unwrap(), "done");

    let events = tracker.events();
    assert_eq!(events.len(), 7);
    assert_eq!(events[0], "agent Calculator");
    assert_eq!(events[1], r#"start add {"a":1}"#);
    assert_eq!(events[2], "end add true 1");
    assert_eq!(events[3], "start explode {}");
    assert_eq!(events[4], "end explode false kaboom");
    assert_eq!(events[5], "start missing {}");
    assert!(events[6].starts_with("end missing false Tool 'missing' does not exist"));
}

#[tokio::test]
async fn tool_errors_become_failed_results() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(vec![call("explode", json!({}))]),
        Message::model("it failed"),
    ]));
    let agent = agent_with(&model, 5);
    agent.add_tool(failing_tool());

    assert_eq!(agent.chat("try").await.unwrap(), "it failed");
    let result = agent.history()[2].as_tool().unwrap().get("explode").unwrap().clone();
    assert_eq!(result, ExecutionResult::failure("kaboom"));
}

#[tokio::test]
async fn calls_in_one_message_run_in_order() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(vec![
            call("add", json!({"a": 1, "b": 1})),
            call("add", json!({"a": 2, "b": 2})),
            call("add", json!({"a": 3, "b": 3})),
        ]),
        Message::model("done"),
    ]));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let agent = agent_with(&model, 5);
    agent.add_tool(add_tool(seen.clone()));

    agent.chat("many").await.unwrap();
    let firsts: Vec<i64> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|args| args["a"].as_i64().unwrap())
        .collect();
    assert_eq!(firsts, vec![1, 2, 3]);
    let history = agent.history();
    let outputs: Vec<Value> = history[2]
        .as_tool()
        .unwrap()
        .tool_results
        .iter()
        .map(|result| result.result.output.clone().unwrap())
        .collect();
    assert_eq!(outputs, vec![json!(2), json!(4), json!(6)]);
}

#[tokio::test]
async fn hooks_transform_calls_and_results_in_order() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(vec![call("add", json!({"a": 1, "b": 1}))]),
        Message::model("ok"),
    ]));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let agent = agent_with(&model, 5);
    agent.add_tool(add_tool(seen.clone()));

    let order = Arc::new(Mutex::new(Vec::new()));
    {
        let order = order.clone();
        agent.add_pre_hook("add", move |call: &ToolCall| {
            order.lock().unwrap().push("pre-1");
            let mut next = call.clone();
            next.args.insert("a".into(), json!(10));
            Some(next)
        });
    }
    {
        let order = order.clone();
        agent.add_pre_hook("add", move |call: &ToolCall| {
            order.lock().unwrap().push("pre-2");
            let mut next = call.clone();
            let a = next.args["a"].as_i64().unwrap();
            next.args.insert("a".into(), json!(a * 2));
            Some(next)
        });
    }
    {
        let order = order.clone();
        agent.add_post_hook("add", move |_: &ToolCall, result: &ExecutionResult| {
            order.lock().unwrap().push("post-1");
            let value = result.output.as_ref().and_then(Value::as_i64).unwrap();
            Some(ExecutionResult::success(json!(value + 100)))
        });
    }
    let removed = {
        let order = order.clone();
        agent.add_post_hook("add", move |_: &ToolCall, _: &ExecutionResult| {
            order.lock().unwrap().push("removed");
            None
        })
    };
    assert!(agent.remove_tool_hook(&removed));

    agent.chat("hook it").await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["pre-1", "pre-2", "post-1"]);
    assert_eq!(seen.lock().unwrap()[0]["a"], json!(20));
    let recorded = agent.history()[2].as_tool().unwrap().get("add").unwrap().clone();
    assert_eq!(recorded.output, Some(json!(121)));
}

#[tokio::test]
async fn escape_tool_does_not_consume_the_budget() {
    let model = Arc::new(
        ScriptedModel::new(vec![
            calls(vec![call(END_TOOL_MODE_TOOL, json!({}))]),
            Message::model("plain answer"),
        ])
        .with_end_tool_mode(),
    );
    let agent = Agent::builder("Forced")
        .with_llm(fast_llm(model.clone()))
        .with_tool_mode(ToolMode::Force)
        .with_max_iterations(1)
        .with_tool(add_tool(Arc::new(Mutex::new(Vec::new()))))
        .build()
        .unwrap();

    assert_eq!(agent.chat("hi").await.unwrap(), "plain answer");

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tool_mode, ToolMode::Force);
    assert!(requests[0].tools.iter().any(|t| t.name == END_TOOL_MODE_TOOL));
    assert_eq!(requests[1].tool_mode, ToolMode::Auto);
    assert!(requests[1].tools.iter().all(|t| t.name != END_TOOL_MODE_TOOL));
    // The escape call never reaches history.
    assert_eq!(agent.history().len(), 2);
}

#[tokio::test]
async fn force_with_escape_stays_forced_until_released() {
    let model = Arc::new(
        ScriptedModel::new(vec![
            calls(vec![call("add", json!({"a": 1, "b": 2}))]),
            calls(vec![call(END_TOOL_MODE_TOOL, json!({}))]),
            Message::model("3"),
        ])
        .with_end_tool_mode(),
    );
    let agent = Agent::builder("Forced")
        .with_llm(fast_llm(model.clone()))
        .with_tool_mode(ToolMode::Force)
        .with_tool(add_tool(Arc::new(Mutex::new(Vec::new()))))
        .build()
        .unwrap();

    assert_eq!(agent.chat("add").await.unwrap(), "3");
    let modes: Vec<ToolMode> = model.requests().iter().map(|r| r.tool_mode).collect();
    assert_eq!(modes, vec![ToolMode::Force, ToolMode::Force, ToolMode::Auto]);
}

#[tokio::test]
async fn escape_tool_is_an_unknown_tool_when_not_injected() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(vec![call(END_TOOL_MODE_TOOL, json!({}))]),
        Message::model("ok"),
    ]));
    let agent = agent_with(&model, 5);

    assert_eq!(agent.chat("hi").await.unwrap(), "ok");
    let history = agent.history();
    assert_eq!(history.len(), 4);
    assert!(!history[2].as_tool().unwrap().get(END_TOOL_MODE_TOOL).unwrap().success);
}

#[tokio::test]
async fn structured_answer_returns_tool_arguments() {
    let model = Arc::new(ScriptedModel::new(vec![calls(vec![call(
        SET_OUTPUT_TOOL,
        json!({"count": 7}),
    )])]));
    let tracker = Arc::new(UsageTracker::new());
    let agent = Agent::builder("Counter")
        .with_llm(fast_llm(model.clone()).with_tracker(tracker.clone()))
        .build()
        .unwrap();

    let mut properties = HashMap::new();
    properties.insert("count".to_string(), ToolParameterSchema::integer("How many"));
    let schema = ToolParameterSchema::object("", properties, vec!["count".into()]);

    let value = agent.structured_answer("count them", schema.clone()).await.unwrap();
    assert_eq!(value["count"], 7);

    let request = &model.requests()[0];
    assert_eq!(request.tool_mode, ToolMode::Force);
    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].name, SET_OUTPUT_TOOL);
    assert_eq!(request.tools[0].parameters, schema);
    assert!(agent.history().is_empty());
    assert_eq!(tracker.snapshot().invocations, 1);
}

#[tokio::test]
async fn structured_answer_decodes_into_types() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Count {
        count: i64,
    }

    let model = Arc::new(ScriptedModel::new(vec![calls(vec![call(
        SET_OUTPUT_TOOL,
        json!("{\"count\": 7}"),
    )])]));
    let agent = agent_with(&model, 5);
    let mut properties = HashMap::new();
    properties.insert("count".to_string(), ToolParameterSchema::integer(""));
    let schema = ToolParameterSchema::object("", properties, vec!["count".into()]);

    let count: Count = agent.structured_answer_as("count", schema).await.unwrap();
    assert_eq!(count, Count { count: 7 });
}

#[tokio::test]
async fn structured_answer_reports_missing_fields() {
    let model = Arc::new(ScriptedModel::new(vec![calls(vec![call(
        SET_OUTPUT_TOOL,
        json!({"other": 1}),
    )])]));
    let agent = agent_with(&model, 5);
    let mut properties = HashMap::new();
    properties.insert("count".to_string(), ToolParameterSchema::integer(""));
    let schema = ToolParameterSchema::object("", properties, vec!["count".into()]);

    let err = agent.structured_answer("count", schema).await.unwrap_err();
    assert!(matches!(err, AgentError::StructuredOutput(ref msg) if msg.contains("count")));
}

#[tokio::test]
async fn structured_answer_checks_field_types() {
    let model = Arc::new(ScriptedModel::new(vec![calls(vec![call(
        SET_OUTPUT_TOOL,
        json!({"count": "7"}),
    )])]));
    let agent = agent_with(&model, 5);
    let mut properties = HashMap::new();
    properties.insert("count".to_string(), ToolParameterSchema::integer(""));
    let schema = ToolParameterSchema::object("", properties, vec!["count".into()]);

    let err = agent.structured_answer("count", schema).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::StructuredOutput(ref msg) if msg == "field '$.count' should be integer, got string"
    ));
}

#[tokio::test]
async fn structured_answer_without_tool_call_fails() {
    let model = Arc::new(ScriptedModel::new(vec![Message::model("seven")]));
    let agent = agent_with(&model, 5);
    let err = agent
        .structured_answer("count", ToolParameterSchema::empty_object())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::StructuredOutput(_)));
    assert_eq!(model.request_count(), 1);
}

#[tokio::test]
async fn poke_sends_the_fixed_prompt() {
    let model = Arc::new(ScriptedModel::new(vec![Message::model("hello there")]));
    let agent = agent_with(&model, 5);

    assert_eq!(agent.poke().await.unwrap(), "hello there");
    assert_eq!(agent.history()[0], Message::user(POKE_PROMPT));
}

#[tokio::test]
async fn poke_can_be_disabled() {
    let model = Arc::new(ScriptedModel::new(vec![Message::model("unused")]));
    let agent = Agent::builder("Quiet")
        .with_llm(fast_llm(model.clone()))
        .with_poking(false)
        .build()
        .unwrap();

    let err = agent.poke().await.unwrap_err();
    assert!(matches!(err, AgentError::PokingDisabled(ref name) if name == "Quiet"));
    assert_eq!(model.request_count(), 0);
}

#[tokio::test]
async fn malformed_arguments_terminate_the_turn() {
    struct BadArgs;

    #[async_trait::async_trait]
    impl agentloom_core::llm::LanguageModel for BadArgs {
        async fn generate(
            &self,
            _request: agentloom_core::llm::LlmRequest,
        ) -> Result<agentloom_core::llm::LlmResponse, agentloom_core::error::LlmError> {
            let call = ToolCall::from_raw(None, "add", json!("{not json"))?;
            Ok(agentloom_core::llm::LlmResponse::new(Message::tool_calls(vec![call])))
        }
    }

    let llm = agentloom_runtime::Llm::new(Arc::new(BadArgs))
        .with_rate_limiter(Arc::new(agentloom_runtime::RateLimiter::unlimited()));
    let agent = Agent::builder("Strict").with_llm(llm).build().unwrap();
    let err = agent.chat("go").await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Protocol(ProtocolError::InvalidArguments { ref tool, .. }) if tool == "add"
    ));
    assert!(err.to_string().contains("invalid tool call arguments"));
}

#[tokio::test]
async fn history_accumulates_across_turns_and_clears() {
    let model = Arc::new(ScriptedModel::new(vec![
        Message::model("one"),
        Message::model("two"),
    ]));
    let agent = agent_with(&model, 5);

    agent.chat("first").await.unwrap();
    agent.chat("second").await.unwrap();
    assert_eq!(agent.history().len(), 4);
    assert_eq!(model.requests()[1].messages.len(), 3);

    agent.clear_history();
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn removed_tools_are_not_offered() {
    let model = Arc::new(ScriptedModel::new(vec![Message::model("ok")]));
    let agent = agent_with(&model, 5);
    agent.add_tool(add_tool(Arc::new(Mutex::new(Vec::new()))));
    agent.add_tool(failing_tool());
    assert!(agent.remove_tool("explode").is_some());
    assert!(agent.remove_tool("explode").is_none());

    agent.chat("hi").await.unwrap();
    let offered: Vec<String> = model.requests()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(offered, vec!["add"]);
    assert_eq!(model.requests()[0].system_prompt, "You add numbers.");
}
