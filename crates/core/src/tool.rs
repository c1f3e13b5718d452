//! Tool trait: the abstraction over named capabilities.
//!
//! Tools are what let the dispatcher act: look up a woreda office, open a
//! ticket, check a ticket's status. Each tool declares a typed parameter
//! schema that the registry checks before invocation, and reports failures
//! as values so they can be fed back to the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::session::SessionState;

/// Parameter type hint. Adapters map it to their backend's schema dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// JSON-Schema spelling (`"string"`, `"integer"`, ...).
    pub fn json_schema_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub kind: ParamType,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// Ordered parameter declarations for a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    params: Vec<(String, ParamSpec)>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, kind: ParamType, description: &str) -> Self {
        self.param(name, kind, true, description)
    }

    pub fn optional(self, name: &str, kind: ParamType, description: &str) -> Self {
        self.param(name, kind, false, description)
    }

    fn param(mut self, name: &str, kind: ParamType, required: bool, description: &str) -> Self {
        self.params.retain(|(n, _)| n != name);
        self.params.push((
            name.to_string(),
            ParamSpec {
                kind,
                required,
                description: description.to_string(),
            },
        ));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, s)| s.required)
            .map(|(n, _)| n)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render as a JSON Schema object (the OpenAI function-calling dialect).
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for (name, spec) in self.iter() {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::from(spec.kind.json_schema_name()));
            if !spec.description.is_empty() {
                prop.insert("description".into(), Value::from(spec.description.clone()));
            }
            properties.insert(name.to_string(), Value::Object(prop));
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
        })
    }

    /// Check that every required parameter is present and non-null.
    /// Unknown parameters are tolerated.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), String> {
        let missing: Vec<&str> = self
            .required_names()
            .into_iter()
            .filter(|name| args.get(*name).is_none_or(Value::is_null))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required parameter(s): {}", missing.join(", ")))
        }
    }
}

/// A tool definition sent to a provider so the model knows what it can call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Per-invocation context handed to a tool.
///
/// `state` is a working copy of the session state. The orchestrator writes
/// it back to the session (under the per-session lock) once the tool has
/// finished, so mutations are visible to later tool calls in the same turn.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: String,
    pub state: SessionState,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>, state: SessionState) -> Self {
        Self {
            session_id: session_id.into(),
            state,
        }
    }
}

/// The core Tool trait.
///
/// Implementations must never panic on bad input; any failure is returned as
/// a `ToolError` (or as an `{"error": ...}` value for domain-level misses such
/// as an unknown ticket number).
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_power_ticket").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Declared parameters.
    fn parameters(&self) -> ParameterSchema;

    /// Execute the tool with already-validated arguments.
    async fn execute(
        &self,
        args: Map<String, Value>,
        ctx: &mut ToolContext,
    ) -> Result<Value, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A registry of available tools, constructed at startup and passed by
/// reference into the orchestrator.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Tool registration overwrote an existing entry");
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Validate `args` against the tool's schema, then run it.
    pub async fn invoke(
        &self,
        name: &str,
        args: Map<String, Value>,
        ctx: &mut ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.parameters()
            .validate(&args)
            .map_err(|reason| ToolError::execution(name, reason))?;

        debug!(tool = %name, session_id = %ctx.session_id, "Invoking tool");
        tool.execute(args, ctx).await
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
