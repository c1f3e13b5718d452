//! Google Gemini native provider implementation.
//!
//! Uses the `generateContent` REST endpoint directly.
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - System instruction as a top-level field
//! - Native function calling with `functionCall` / `functionResponse` parts
//! - Upper-case OpenAPI type names in function declarations

use addis_core::{
    AdapterError, CallArguments, Exchange, ParameterSchema, ParamType, ProviderAdapter,
    ProviderStep, RequestedCall, ToolDefinition, TurnRole,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` adapter.
pub struct GeminiProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            temperature: 0.0,
            client: http::build_client(Duration::from_secs(120)),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Gemini's schema dialect spells types in upper case.
    fn schema_type(kind: ParamType) -> &'static str {
        match kind {
            ParamType::String => "STRING",
            ParamType::Integer => "INTEGER",
            ParamType::Number => "NUMBER",
            ParamType::Boolean => "BOOLEAN",
            ParamType::Object => "OBJECT",
            ParamType::Array => "ARRAY",
        }
    }

    fn to_schema(params: &ParameterSchema) -> Value {
        let mut properties = Map::new();
        for (name, spec) in params.iter() {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::from(Self::schema_type(spec.kind)));
            if !spec.description.is_empty() {
                prop.insert("description".into(), Value::from(spec.description.clone()));
            }
            properties.insert(name.to_string(), Value::Object(prop));
        }
        serde_json::json!({
            "type": "OBJECT",
            "properties": properties,
            "required": params.required_names(),
        })
    }

    fn to_function_declarations(tools: &[ToolDefinition]) -> Vec<FunctionDeclaration> {
        tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                // Gemini rejects an OBJECT schema with no properties
                parameters: (!t.parameters.is_empty()).then(|| Self::to_schema(&t.parameters)),
            })
            .collect()
    }

    /// Render history, prompt, and tool rounds as Gemini contents.
    ///
    /// A round becomes a `model` content holding every `functionCall` part,
    /// then a `user` content holding every `functionResponse` part.
    fn to_contents(exchange: &Exchange) -> Vec<Content> {
        let mut contents = Vec::with_capacity(exchange.history.len() + 1 + exchange.rounds.len() * 2);

        for turn in &exchange.history {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Model => "model",
            };
            contents.push(Content::text(role, &turn.content));
        }

        contents.push(Content::text("user", &exchange.prompt));

        for round in &exchange.rounds {
            contents.push(Content {
                role: "model".into(),
                parts: round
                    .calls
                    .iter()
                    .map(|call| Part::FunctionCall {
                        function_call: FunctionCall {
                            name: call.name.clone(),
                            args: match &call.arguments {
                                CallArguments::Parsed { args } => Value::Object(args.clone()),
                                CallArguments::Malformed { .. } => Value::Object(Map::new()),
                            },
                        },
                    })
                    .collect(),
            });

            contents.push(Content {
                role: "user".into(),
                parts: round
                    .replies
                    .iter()
                    .map(|reply| Part::FunctionResponse {
                        function_response: FunctionResponse {
                            name: reply.name.clone(),
                            response: reply.payload.clone(),
                        },
                    })
                    .collect(),
            });
        }

        contents
    }

    pub(crate) fn build_request_body(&self, exchange: &Exchange) -> Value {
        let mut body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": exchange.instruction }] },
            "contents": Self::to_contents(exchange),
            "generationConfig": { "temperature": self.temperature },
        });

        if !exchange.tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": Self::to_function_declarations(&exchange.tools),
            }]);
        }

        body
    }

    /// Decode a 200 response body. `round` is the number of rounds already
    /// in the exchange; Gemini has no call ids, so they are synthesized from
    /// the round and the part's position.
    pub(crate) fn parse_response(body: Value, round: usize) -> Result<ProviderStep, AdapterError> {
        let response: GenerateResponse = serde_json::from_value(body).map_err(|e| {
            AdapterError::ProtocolFailure(format!("gemini: failed to parse response: {e}"))
        })?;

        // A blocked prompt has no candidates and reads as an empty answer
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".into());
            warn!(reason = %reason, "gemini returned an empty candidate list");
            return Ok(ProviderStep::Text(String::new()));
        };

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        let calls: Vec<RequestedCall> = parts
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .enumerate()
            .map(|(i, fc)| RequestedCall {
                id: format!("gemini-{round}-{i}"),
                name: fc.name.clone(),
                arguments: CallArguments::from_value(fc.args.clone().unwrap_or(Value::Null)),
            })
            .collect();

        if !calls.is_empty() {
            return Ok(ProviderStep::ToolCalls(calls));
        }

        let text: String = parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();

        Ok(ProviderStep::Text(text))
    }

    /// Gemini reports a bad key as 400 with reason `API_KEY_INVALID`.
    fn error_for_status(status: u16, body: &str) -> AdapterError {
        if status == 400 && body.contains("API_KEY_INVALID") {
            return AdapterError::AuthFailure("gemini: API key not valid".into());
        }
        http::status_error("gemini", status, body)
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn converse(&self, exchange: &Exchange) -> Result<ProviderStep, AdapterError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AdapterError::AuthFailure(
                "gemini: no API key configured".into(),
            ));
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_request_body(exchange);

        debug!(
            provider = "gemini",
            model = %self.model,
            rounds = exchange.rounds.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error("gemini", e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(Self::error_for_status(status, &error_body));
        }

        let body: Value = response.json().await.map_err(|e| {
            AdapterError::ProtocolFailure(format!("gemini: undecodable body: {e}"))
        })?;

        Self::parse_response(body, exchange.rounds.len())
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
}

#[derive(Debug, Serialize)]
struct FunctionCall {
    name: String,
    args: Value,
}

#[derive(Debug, Serialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<ResponseFunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseFunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
