//! Tool builder utilities for creating tools from closures
//!
//! A [`ToolBuilder`] takes a declaration table of [`ParamSpec`]s and derives
//! the argument schema from it, the runtime counterpart of the `#[tool]`
//! attribute macro.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use agentloom_core::messaging::ToolArgs;
use agentloom_core::tools::{FunctionTool, ToolBox, ToolParameterSchema, ToolSchema};
use serde_json::Value;

/// Declaration of one tool argument
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    name: String,
    schema_type: String,
    description: Option<String>,
    nullable: bool,
    default: Option<Value>,
    items: Option<ToolParameterSchema>,
}

impl ParamSpec {
    /// A parameter the model must always supply
    pub fn required(name: impl Into<String>, schema_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema_type: schema_type.into(),
            description: None,
            nullable: false,
            default: None,
            items: None,
        }
    }

    /// A nullable parameter; without an explicit default it defaults to null
    pub fn optional(name: impl Into<String>, schema_type: impl Into<String>) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, schema_type)
        }
    }

    /// Inline human-readable annotation, used as the argument description
    pub fn described(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Item schema for `array` parameters
    pub fn with_items(mut self, items: ToolParameterSchema) -> Self {
        self.items = Some(items);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the argument ends up in the schema's `required` list
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none()
    }

    /// Value substituted when the model omits the argument
    pub fn effective_default(&self) -> Option<Value> {
        match (&self.default, self.nullable) {
            (Some(default), _) => Some(default.clone()),
            (None, true) => Some(Value::Null),
            (None, false) => None,
        }
    }

    fn to_schema(&self) -> ToolParameterSchema {
        let mut schema = ToolParameterSchema::of_type(self.schema_type.clone());
        schema.description = self.description.clone();
        schema.default = self.effective_default();
        schema.items = self.items.clone().map(Box::new);
        schema
    }
}

/// Builder for creating tools from async or sync closures
#[derive(Debug, Clone)]
pub struct ToolBuilder {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    system_prompt: Option<String>,
    return_type: Option<String>,
}

impl ToolBuilder {
    /// Start building a new tool with the given name and description
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            system_prompt: None,
            return_type: None,
        }
    }

    /// Declare the next argument. Redeclaring a name replaces it.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.retain(|existing| existing.name != spec.name);
        self.params.push(spec);
        self
    }

    pub fn params<I>(self, specs: I) -> Self
    where
        I: IntoIterator<Item = ParamSpec>,
    {
        specs.into_iter().fold(self, Self::param)
    }

    /// Companion system text surfaced while the tool is active
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    /// The descriptor this builder would produce
    pub fn schema(&self) -> ToolSchema {
        let properties: HashMap<String, ToolParameterSchema> = self
            .params
            .iter()
            .map(|spec| (spec.name.clone(), spec.to_schema()))
            .collect();
        let required = self
            .params
            .iter()
            .filter(|spec| spec.is_required())
            .map(|spec| spec.name.clone())
            .collect();

        let mut schema = ToolSchema::new(
            self.name.clone(),
            self.description.clone(),
            ToolParameterSchema::object("", properties, required),
        );
        schema.system_prompt = self.system_prompt.clone();
        schema.return_type = self.return_type.clone();
        schema
    }

    /// Build the tool with an async handler.
    ///
    /// Omitted arguments that declare a default (or are nullable) are filled
    /// in before the handler runs; a missing required argument fails the call.
    pub fn build_async<F, Fut>(self, handler: F) -> ToolBox
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let schema = self.schema();
        let params = Arc::new(self.params);
        let handler = Arc::new(handler);
        let tool_name = schema.name.clone();

        let tool = FunctionTool::new(schema, move |mut args: ToolArgs| {
            let params = params.clone();
            let handler = handler.clone();
            let tool_name = tool_name.clone();
            async move {
                for spec in params.iter() {
                    if args.contains_key(&spec.name) {
                        continue;
                    }
                    match spec.effective_default() {
                        Some(default) => {
                            args.insert(spec.name.clone(), default);
                        }
                        None => anyhow::bail!(
                            "missing required argument '{}' for tool '{tool_name}'",
                            spec.name
                        ),
                    }
                }
                handler(args).await
            }
        });
        Arc::new(tool)
    }

    /// Build the tool with a sync handler function
    pub fn build_sync<F>(self, handler: F) -> ToolBox
    where
        F: Fn(ToolArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.build_async(move |args| {
            let handler = handler.clone();
            async move { handler(args) }
        })
    }
}

/// Quick helper to create a simple async tool
pub fn tool<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    params: Vec<ParamSpec>,
    handler: F,
) -> ToolBox
where
    F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    ToolBuilder::new(name, description)
        .params(params)
        .build_async(handler)
}

/// Quick helper to create a simple sync tool
pub fn tool_sync<F>(
    name: impl Into<String>,
    description: impl Into<String>,
    params: Vec<ParamSpec>,
    handler: F,
) -> ToolBox
where
    F: Fn(ToolArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    ToolBuilder::new(name, description)
        .params(params)
        .build_sync(handler)
}
