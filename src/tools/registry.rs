//! Tool trait and typed name-to-handler registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RelayError, Result};

/// A tool the upstream model may call during a chat turn.
#[async_trait]
pub trait CoachTool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &'static str;

    /// Description the model sees in the function schema.
    fn description(&self) -> &'static str;

    /// JSON Schema for the arguments object.
    fn parameters(&self) -> serde_json::Value;

    /// Cache-invalidation flag forwarded to the client after the tool runs.
    /// Read-only tools return `None`.
    fn notification_flag(&self) -> Option<&'static str> {
        None
    }

    /// Run the tool. Domain failures are folded into the result object
    /// (`{"success": false, "message": ...}`), never surfaced as errors.
    async fn execute(&self, args: serde_json::Value) -> serde_json::Value;
}

type ToolHandler = dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = serde_json::Value> + Send>>
    + Send
    + Sync;

/// Closure-backed [`CoachTool`], used by the catalog to wrap one data-layer
/// call per tool without a struct per tool.
pub struct DataTool {
    name: &'static str,
    description: &'static str,
    flag: Option<&'static str>,
    parameters: serde_json::Value,
    handler: Arc<ToolHandler>,
}

impl DataTool {
    pub fn new<F, Fut>(
        name: &'static str,
        description: &'static str,
        flag: Option<&'static str>,
        parameters: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = serde_json::Value> + Send + 'static,
    {
        Self {
            name,
            description,
            flag,
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl CoachTool for DataTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    fn notification_flag(&self) -> Option<&'static str> {
        self.flag
    }

    async fn execute(&self, args: serde_json::Value) -> serde_json::Value {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for DataTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTool")
            .field("name", &self.name)
            .field("flag", &self.flag)
            .finish()
    }
}

/// Registry mapping tool names to implementations.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn CoachTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn CoachTool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the OpenAI function-descriptor array, sorted by name so the
    /// upstream request body is stable.
    pub fn schemas(&self) -> Vec<serde_json::Value> {
        let mut names: Vec<&&'static str> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let tool = &self.tools[*name];
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    },
                })
            })
            .collect()
    }

    /// Dispatch by name, returning the result and the tool's notification
    /// flag. Unknown names are a typed error, never executed.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<(serde_json::Value, Option<&'static str>)> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| RelayError::UnknownTool(name.to_string()))?;
        Ok((tool.execute(args).await, tool.notification_flag()))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
