use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use statbridge_core::error::ToolError;
use statbridge_core::schema::ArgumentSchema;
use thiserror::Error;

/// Execution contract of a tool: validated arguments in, result or failure out.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError>;
}

/// Adapts an async closure into a [`ToolExecutor`].
pub struct FnExecutor<F>(F);

#[async_trait]
impl<F, Fut> ToolExecutor for FnExecutor<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        (self.0)(args).await
    }
}

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ArgumentSchema,
    executor: Arc<dyn ToolExecutor>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ArgumentSchema,
        executor: impl ToolExecutor + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            executor: Arc::new(executor),
        }
    }

    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ArgumentSchema,
        execute: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self::new(name, description, input_schema, FnExecutor(execute))
    }

    pub fn executor(&self) -> &dyn ToolExecutor {
        self.executor.as_ref()
    }

    /// Entry shown to callers by `tools/list`.
    pub fn discovery_entry(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema.to_json_schema(),
        })
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// Read-only view of the tools a server exposes.
pub trait ToolRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<&ToolDefinition>;

    /// All definitions in declared order.
    fn definitions(&self) -> &[ToolDefinition];
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate tool name '{0}'")]
    DuplicateName(String),
}

/// Registry fixed at construction time.
#[derive(Debug)]
pub struct StaticRegistry {
    definitions: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl StaticRegistry {
    pub fn new(definitions: Vec<ToolDefinition>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (position, definition) in definitions.iter().enumerate() {
            if index.insert(definition.name.clone(), position).is_some() {
                return Err(RegistryError::DuplicateName(definition.name.clone()));
            }
        }
        Ok(Self { definitions, index })
    }
}

impl ToolRegistry for StaticRegistry {
    fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index
            .get(name)
            .and_then(|position| self.definitions.get(*position))
    }

    fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }
}
