//! Tool descriptors and the schema vocabulary shared with backends
//!
//! This module provides:
//! - JSON-Schema style parameter descriptions ([`ToolParameterSchema`])
//! - Self-describing invocation contracts ([`ToolSchema`]) that can be projected
//!   into any backend's type vocabulary
//! - The [`Tool`] trait every invocation target implements
//! - An insertion-ordered [`ToolRegistry`]

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::messaging::ToolArgs;

/// JSON Schema definition for tool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    /// Type name (object, string, number, integer, boolean, array, null)
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, ToolParameterSchema>>,

    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolParameterSchema>>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Additional schema keywords (minimum, pattern, ...)
    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl ToolParameterSchema {
    /// Bare schema of the given type, without description
    pub fn of_type(schema_type: impl Into<String>) -> Self {
        Self {
            schema_type: schema_type.into(),
            description: None,
            properties: None,
            required: None,
            items: None,
            enum_values: None,
            default: None,
            additional: HashMap::new(),
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::of_type("string").described(description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::of_type("number").described(description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::of_type("integer").described(description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::of_type("boolean").described(description)
    }

    /// Create an object parameter with properties
    pub fn object(
        description: impl Into<String>,
        properties: HashMap<String, ToolParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        Self {
            properties: Some(properties),
            required: Some(required),
            ..Self::of_type("object").described(description)
        }
    }

    /// Create an array parameter
    pub fn array(description: impl Into<String>, items: ToolParameterSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of_type("array").described(description)
        }
    }

    /// Object schema with no properties, used by parameterless tools
    pub fn empty_object() -> Self {
        Self {
            properties: Some(HashMap::new()),
            required: Some(Vec::new()),
            ..Self::of_type("object")
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Names of the required properties, empty for non-object schemas
    pub fn required_names(&self) -> &[String] {
        self.required.as_deref().unwrap_or_default()
    }

    /// Check `value` against this schema.
    ///
    /// Covers the primitive JSON types, required object properties, array
    /// items and `enum` lists. Nulls pass where the default is null, and type
    /// names outside the JSON vocabulary are accepted as-is.
    pub fn check_value(&self, value: &Value) -> Result<(), SchemaError> {
        self.check_at("$", value)
    }

    fn check_at(&self, path: &str, value: &Value) -> Result<(), SchemaError> {
        if value.is_null() && matches!(self.default, Some(Value::Null)) {
            return Ok(());
        }
        let matches = match self.schema_type.as_str() {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "null" => value.is_null(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !matches {
            return Err(SchemaError::TypeMismatch {
                path: path.to_string(),
                expected: self.schema_type.clone(),
                found: json_kind(value),
            });
        }
        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                return Err(SchemaError::NotAllowed {
                    path: path.to_string(),
                    value: value.to_string(),
                });
            }
        }

        match value {
            Value::Object(fields) => {
                if let Some(missing) = self.required_names().iter().find(|key| !fields.contains_key(*key)) {
                    return Err(SchemaError::MissingField {
                        path: format!("{path}.{missing}"),
                    });
                }
                if let Some(properties) = &self.properties {
                    for (key, field) in fields {
                        if let Some(schema) = properties.get(key) {
                            schema.check_at(&format!("{path}.{key}"), field)?;
                        }
                    }
                }
            }
            Value::Array(elements) => {
                if let Some(items) = &self.items {
                    for (index, element) in elements.iter().enumerate() {
                        items.check_at(&format!("{path}[{index}]"), element)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Render this schema with every `type` rewritten through `mapping`.
    ///
    /// Types absent from the mapping fall back to `default`; when there is no
    /// fallback either, the conversion fails naming the offending parameter.
    pub fn map_types(
        &self,
        parameter: &str,
        mapping: &HashMap<String, String>,
        default: Option<&str>,
    ) -> Result<Value, SchemaError> {
        let type_name = match mapping.get(&self.schema_type) {
            Some(mapped) => mapped.clone(),
            None => match default {
                Some(fallback) => fallback.to_string(),
                None => {
                    return Err(SchemaError::UnsupportedType {
                        parameter: parameter.to_string(),
                        type_name: self.schema_type.clone(),
                    })
                }
            },
        };

        let mut out = Map::new();
        out.insert("type".into(), Value::String(type_name));
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::String(description.clone()));
        }
        if let Some(properties) = &self.properties {
            let mut mapped = Map::new();
            for (name, schema) in properties {
                mapped.insert(name.clone(), schema.map_types(name, mapping, default)?);
            }
            out.insert("properties".into(), Value::Object(mapped));
        }
        if let Some(required) = &self.required {
            out.insert("required".into(), json!(required));
        }
        if let Some(items) = &self.items {
            out.insert("items".into(), items.map_types(parameter, mapping, default)?);
        }
        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        for (key, value) in &self.additional {
            out.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(out))
    }
}

/// Complete invocation contract for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique, stable name for this tool (used by the model for invocation)
    pub name: String,

    /// Human-readable description of what this tool does
    pub description: String,

    /// Input parameter schema, always an object with properties
    pub parameters: ToolParameterSchema,

    /// Companion system text surfaced to backends while this tool is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Informational return type name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameterSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            system_prompt: None,
            return_type: None,
        }
    }

    /// Create a tool schema with no parameters
    pub fn no_params(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ToolParameterSchema::empty_object())
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn required(&self) -> &[String] {
        self.parameters.required_names()
    }

    /// Parameter schemas as JSON Schema, the vocabulary most backends accept
    pub fn json_schema(&self) -> Value {
        serde_json::to_value(&self.parameters).unwrap_or_else(|_| json!({"type": "object"}))
    }

    /// Project this contract into a backend's type vocabulary.
    ///
    /// Produces `{name, description, parameters}` where every type name has
    /// been rewritten through `mapping` (falling back to `default`).
    pub fn to_schema(
        &self,
        mapping: &HashMap<String, String>,
        default: Option<&str>,
    ) -> Result<Value, SchemaError> {
        if self.parameters.schema_type != "object" {
            return Err(SchemaError::NotAnObject(self.parameters.schema_type.clone()));
        }
        let mut parameters = Map::new();
        parameters.insert("type".into(), Value::String("object".into()));
        let mut properties = Map::new();
        if let Some(declared) = &self.parameters.properties {
            for (name, schema) in declared {
                properties.insert(name.clone(), schema.map_types(name, mapping, default)?);
            }
        }
        parameters.insert("properties".into(), Value::Object(properties));
        parameters.insert("required".into(), json!(self.required()));

        Ok(json!({
            "name": self.name,
            "description": self.description,
            "parameters": parameters,
        }))
    }
}

/// Core trait for invocation targets
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the invocation contract for this tool
    fn schema(&self) -> ToolSchema;

    /// Executes the tool with decoded arguments.
    ///
    /// Errors are caught by the agent and reported back to the model as a
    /// failed execution result.
    async fn execute(&self, args: ToolArgs) -> anyhow::Result<Value>;
}

/// Type alias for shared tool instances
pub type ToolBox = Arc<dyn Tool>;

/// Boxed async callable used by [`FunctionTool`]
pub type ToolFn = Arc<dyn Fn(ToolArgs) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A tool backed by a plain async closure and an explicit schema
#[derive(Clone)]
pub struct FunctionTool {
    schema: ToolSchema,
    handler: ToolFn,
}

impl FunctionTool {
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn into_box(self) -> ToolBox {
        Arc::new(self)
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, args: ToolArgs) -> anyhow::Result<Value> {
        (self.handler)(args).await
    }
}

/// Name-keyed tool registry that remembers registration order
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolBox>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool of the same name
    pub fn register(&mut self, tool: ToolBox) -> &mut Self {
        let name = tool.schema().name;
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn register_all<I>(&mut self, tools: I) -> &mut Self
    where
        I: IntoIterator<Item = ToolBox>,
    {
        for tool in tools {
            self.register(tool);
        }
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<ToolBox> {
        let removed = self.tools.remove(name)?;
        self.order.retain(|entry| entry != name);
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<&ToolBox> {
        self.tools.get(name)
    }

    /// Tools in registration order
    pub fn all(&self) -> Vec<ToolBox> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.all().iter().map(|tool| tool.schema()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.order.iter()).finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
