//! Toolkit of built-in tools and utilities for agents
//!
//! This crate provides:
//! - Built-in tools (`internal_thinking`)
//! - `#[tool]` macro for deriving a tool from a function signature
//! - [`ToolBuilder`] for declaring tools at runtime from a parameter table
//!
//! ## Recommended Usage
//!
//! ```rust,ignore
//! use agentloom_toolkit::tool;
//!
//! /// Adds two numbers together
//! #[tool]
//! pub fn add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! let tool = AddTool::as_tool();
//! ```

pub mod builder;
pub mod builtin;

pub use agentloom_core::tools::{
    FunctionTool, Tool, ToolBox, ToolParameterSchema, ToolRegistry, ToolSchema,
};

pub use builder::{tool_sync, ParamSpec, ToolBuilder};

// Function-style helper; the attribute macro of the same name lives in the
// macro namespace.
pub use builder::tool;
pub use agentloom_macros::tool;

pub use builtin::{create_internal_thinking_tool, InternalThinkingTool};
