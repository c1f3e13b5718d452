//! Provider abstraction: the provider-neutral shape of one turn's exchange
//! with a completion backend.
//!
//! The orchestrator only ever speaks in these types. Each adapter owns the
//! translation of an [`Exchange`] into its backend's wire format and of the
//! backend's response back into a [`ProviderStep`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AdapterError, ToolError};
use crate::session::Turn;
use crate::tool::ToolDefinition;

/// Arguments of a requested tool call, as decoded by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallArguments {
    Parsed { args: Map<String, Value> },
    /// The provider sent something that is not a JSON object.
    Malformed { raw: String, reason: String },
}

impl CallArguments {
    /// Decode an argument string the way most chat APIs send it.
    /// An empty string means "no arguments".
    pub fn from_json_str(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Parsed { args: Map::new() };
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(args)) => Self::Parsed { args },
            Ok(other) => Self::Malformed {
                raw: raw.to_string(),
                reason: format!("expected a JSON object, got {other}"),
            },
            Err(e) => Self::Malformed {
                raw: raw.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Decode an already-structured argument value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(args) => Self::Parsed { args },
            Value::Null => Self::Parsed { args: Map::new() },
            other => Self::Malformed {
                raw: other.to_string(),
                reason: "expected a JSON object".into(),
            },
        }
    }

    /// The arguments as a JSON string, for APIs that carry them as text.
    pub fn to_json_string(&self) -> String {
        match self {
            Self::Parsed { args } => Value::Object(args.clone()).to_string(),
            Self::Malformed { raw, .. } => raw.clone(),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedCall {
    /// Call id; synthesized by adapters whose backend has none
    pub id: String,
    pub name: String,
    pub arguments: CallArguments,
}

/// What a provider answered for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderStep {
    /// Final text for the user (possibly empty)
    Text(String),
    /// One or more tool calls, in the order the provider returned them
    ToolCalls(Vec<RequestedCall>),
}

/// The result of one tool call, keyed by the originating call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReply {
    pub call_id: String,
    pub name: String,
    /// `{"result": value}` or `{"error": message}`
    pub payload: Value,
}

impl ToolReply {
    pub fn from_result(call: &RequestedCall, result: &Result<Value, ToolError>) -> Self {
        let payload = match result {
            Ok(value) => serde_json::json!({ "result": value }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            payload,
        }
    }

    pub fn is_error(&self) -> bool {
        self.payload.get("error").is_some()
    }
}

/// One model step that requested tools, together with the replies sent back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRound {
    pub calls: Vec<RequestedCall>,
    pub replies: Vec<ToolReply>,
}

/// Everything a provider needs to produce the next model step of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub instruction: String,
    pub tools: Vec<ToolDefinition>,
    /// Completed turns before this one
    pub history: Vec<Turn>,
    pub prompt: String,
    /// Tool rounds completed so far in this turn
    #[serde(default)]
    pub rounds: Vec<ToolRound>,
}

impl Exchange {
    pub fn new(
        instruction: impl Into<String>,
        tools: Vec<ToolDefinition>,
        history: Vec<Turn>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            tools,
            history,
            prompt: prompt.into(),
            rounds: Vec::new(),
        }
    }

    /// Record the replies to a tool-call step; the next `converse` call
    /// carries them to the model.
    pub fn record_round(&mut self, calls: Vec<RequestedCall>, replies: Vec<ToolReply>) {
        self.rounds.push(ToolRound { calls, replies });
    }
}

/// The core provider trait.
///
/// Every completion backend implements this. `converse` is called once to
/// open a turn and again after every recorded tool round; adapters render
/// the rounds in whatever shape their backend expects.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// A human-readable backend name (e.g., "gemini", "openrouter").
    fn name(&self) -> &str;

    /// The model identifier this adapter targets.
    fn model(&self) -> &str;

    /// Send the exchange and decode the next model step.
    async fn converse(&self, exchange: &Exchange) -> Result<ProviderStep, AdapterError>;
}
