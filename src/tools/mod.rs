pub mod bash_tool;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{RegistryError, ToolError};
use bash_tool::BashTool;

/// Declared input parameters of a tool.
///
/// A JSON-Schema object reduced to what providers need: each parameter's
/// schema (type, description, ...) keyed by name, plus the required set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter of the given JSON type.
    pub fn param(mut self, name: &str, ty: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({ "type": ty, "description": description }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Renders the schema as a JSON-Schema `object`.
    pub fn to_json(&self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        })
    }

    fn validate(&self, tool: &str) -> Result<(), RegistryError> {
        for name in &self.required {
            if !self.properties.contains_key(name) {
                return Err(RegistryError::InvalidSchema {
                    tool: tool.to_string(),
                    reason: format!("required parameter '{}' is not declared", name),
                });
            }
        }
        Ok(())
    }
}

/// Definition sent to the LLM so it knows what tools are available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// Every tool implements this trait.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the LLM uses to call this tool.
    fn name(&self) -> &str;

    /// Human-readable description for the LLM.
    fn description(&self) -> &str;

    /// Parameters the tool accepts.
    fn schema(&self) -> InputSchema;

    /// Execute the tool with the given JSON input.
    ///
    /// String results are passed to the model verbatim; any other value is
    /// serialized as JSON.
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// A tool backed by an async closure.
pub struct FnTool<F> {
    name: String,
    description: String,
    schema: InputSchema,
    f: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: InputSchema,
        f: F,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            f,
        }
    }
}

#[async_trait::async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> InputSchema {
        self.schema.clone()
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        (self.f)(input).await
    }
}

/// Holds all registered tools and dispatches calls by name.
///
/// Built once at startup; every registration is validated (non-empty,
/// unique names and a consistent schema). Read-only while a turn runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    descriptors: Vec<ToolDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of tools, rejecting the first invalid one.
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Register a tool. Called during startup.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        let schema = tool.schema();
        schema.validate(&name)?;

        self.by_name.insert(name.clone(), self.tools.len());
        self.descriptors.push(ToolDescriptor {
            name,
            description: tool.description().to_string(),
            input_schema: schema,
        });
        self.tools.push(tool);
        Ok(())
    }

    /// Produce definitions for the LLM (sent in the API request).
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Look up a tool by name and execute it.
    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(input)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: name.to_string(),
                message: format!("{:#}", e),
            })
    }

    /// How many tools are registered.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry {
    /// Create a registry with all built-in tools.
    pub fn with_builtins(work_dir: PathBuf, bash_timeout_secs: u64) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Arc::new(BashTool::new(work_dir, bash_timeout_secs)))?;
        Ok(registry)
    }
}

/// Converts a tool's output into the text the model sees.
pub fn stringify_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
