//! Pre/post interception of tool execution.
//!
//! Hooks are attached per tool name and run in registration order. A pre-hook
//! may replace the call about to be executed; a post-hook may replace the
//! result that will be recorded in history. Returning `None` keeps the value
//! unchanged.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agentloom_core::messaging::{ExecutionResult, ToolCall};

pub type PreHook = Arc<dyn Fn(&ToolCall) -> Option<ToolCall> + Send + Sync>;
pub type PostHook = Arc<dyn Fn(&ToolCall, &ExecutionResult) -> Option<ExecutionResult> + Send + Sync>;

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one registration; removing it removes exactly that entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookHandle {
    tool: String,
    id: u64,
}

impl HookHandle {
    pub fn tool(&self) -> &str {
        &self.tool
    }
}

#[derive(Clone)]
struct HookEntry {
    id: u64,
    pre: Option<PreHook>,
    post: Option<PostHook>,
}

/// Hooks of a single tool, cloned out of the map before execution
#[derive(Clone, Default)]
pub struct ToolHooks {
    entries: Vec<HookEntry>,
}

impl ToolHooks {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply_pre(&self, call: ToolCall) -> ToolCall {
        self.entries
            .iter()
            .filter_map(|entry| entry.pre.as_ref())
            .fold(call, |call, hook| hook(&call).unwrap_or(call))
    }

    pub fn apply_post(&self, call: &ToolCall, result: ExecutionResult) -> ExecutionResult {
        self.entries
            .iter()
            .filter_map(|entry| entry.post.as_ref())
            .fold(result, |result, hook| hook(call, &result).unwrap_or(result))
    }
}

#[derive(Clone, Default)]
pub struct HookMap {
    hooks: HashMap<String, ToolHooks>,
}

impl HookMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        tool: impl Into<String>,
        pre: Option<PreHook>,
        post: Option<PostHook>,
    ) -> HookHandle {
        let tool = tool.into();
        let id = NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed);
        self.hooks
            .entry(tool.clone())
            .or_default()
            .entries
            .push(HookEntry { id, pre, post });
        HookHandle { tool, id }
    }

    /// Remove one registration; returns whether it was still present
    pub fn remove(&mut self, handle: &HookHandle) -> bool {
        let Some(hooks) = self.hooks.get_mut(&handle.tool) else {
            return false;
        };
        let before = hooks.entries.len();
        hooks.entries.retain(|entry| entry.id != handle.id);
        let removed = hooks.entries.len() != before;
        if hooks.is_empty() {
            self.hooks.remove(&handle.tool);
        }
        removed
    }

    pub fn for_tool(&self, tool: &str) -> ToolHooks {
        self.hooks.get(tool).cloned().unwrap_or_default()
    }

    pub fn len(&self, tool: &str) -> usize {
        self.hooks.get(tool).map_or(0, |hooks| hooks.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(a: i64) -> ToolCall {
        let mut args = serde_json::Map::new();
        args.insert("a".into(), json!(a));
        ToolCall {
            id: "c".into(),
            name: "t".into(),
            args,
        }
    }

    #[test]
    fn pre_hooks_chain_in_registration_order() {
        let mut map = HookMap::new();
        map.add(
            "t",
            Some(Arc::new(|call: &ToolCall| {
                let mut next = call.clone();
                next.args.insert("a".into(), json!(call.args["a"].as_i64().unwrap() + 1));
                Some(next)
            })),
            None,
        );
        map.add("t", Some(Arc::new(|_: &ToolCall| None)), None);
        map.add(
            "t",
            Some(Arc::new(|call: &ToolCall| {
                let mut next = call.clone();
                next.args.insert("a".into(), json!(call.args["a"].as_i64().unwrap() * 10));
                Some(next)
            })),
            None,
        );

        let transformed = map.for_tool("t").apply_pre(call(1));
        assert_eq!(transformed.args["a"], json!(20));
        assert_eq!(map.for_tool("other").apply_pre(call(1)).args["a"], json!(1));
    }

    #[test]
    fn removing_a_handle_removes_only_that_entry() {
        let mut map = HookMap::new();
        let post: PostHook = Arc::new(|_: &ToolCall, _: &ExecutionResult| {
            Some(ExecutionResult::success(json!("hooked")))
        });
        let first = map.add("t", None, Some(post.clone()));
        let second = map.add("t", None, Some(post));
        assert_eq!(map.len("t"), 2);

        assert!(map.remove(&first));
        assert!(!map.remove(&first));
        assert_eq!(map.len("t"), 1);

        let result = map
            .for_tool("t")
            .apply_post(&call(1), ExecutionResult::success(json!(1)));
        assert_eq!(result.output, Some(json!("hooked")));

        assert!(map.remove(&second));
        assert_eq!(map.len("t"), 0);
    }
}
