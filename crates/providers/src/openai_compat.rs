//! OpenAI-compatible provider implementation.
//!
//! Works with OpenRouter and any endpoint exposing `/chat/completions` with
//! OpenAI-style function calling. One instance targets one model, so several
//! free-tier models become separate fallback candidates.

use addis_core::{
    AdapterError, CallArguments, Exchange, ProviderAdapter, ProviderStep, RequestedCall,
    ToolDefinition, TurnRole,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::http;

/// An OpenAI-compatible chat completion adapter.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            temperature: 0.0,
            client: http::build_client(Duration::from_secs(120)),
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Render an exchange as an OpenAI message list.
    ///
    /// Each tool round becomes one assistant message carrying all of the
    /// round's `tool_calls`, followed by one `tool` message per call.
    fn to_api_messages(exchange: &Exchange) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(exchange.history.len() + 2);
        messages.push(ApiMessage::text("system", &exchange.instruction));

        for turn in &exchange.history {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Model => "assistant",
            };
            messages.push(ApiMessage::text(role, &turn.content));
        }

        messages.push(ApiMessage::text("user", &exchange.prompt));

        for round in &exchange.rounds {
            messages.push(ApiMessage {
                role: "assistant".into(),
                content: None,
                tool_calls: Some(
                    round
                        .calls
                        .iter()
                        .map(|call| ApiToolCall {
                            id: call.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: call.name.clone(),
                                arguments: call.arguments.to_json_string(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            });

            for reply in &round.replies {
                messages.push(ApiMessage {
                    role: "tool".into(),
                    content: Some(reply.payload.to_string()),
                    tool_calls: None,
                    tool_call_id: Some(reply.call_id.clone()),
                });
            }
        }

        messages
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.to_json_schema(),
                },
            })
            .collect()
    }

    pub(crate) fn build_request_body(&self, exchange: &Exchange) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(exchange),
            "temperature": self.temperature,
            "stream": false,
        });

        if !exchange.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&exchange.tools));
        }

        body
    }

    /// Decode a 200 response body into the next model step.
    pub(crate) fn parse_response(
        provider: &str,
        body: serde_json::Value,
    ) -> Result<ProviderStep, AdapterError> {
        // OpenRouter reports some upstream failures as 200 + error object
        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(|c| c.as_u64()).unwrap_or(0) as u16;
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(http::status_error(provider, code, message));
        }

        let api_response: ApiResponse = serde_json::from_value(body).map_err(|e| {
            AdapterError::ProtocolFailure(format!("{provider}: failed to parse response: {e}"))
        })?;

        let Some(choice) = api_response.choices.into_iter().next() else {
            warn!(provider, "response carried no choices");
            return Ok(ProviderStep::Text(String::new()));
        };

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        if !tool_calls.is_empty() {
            let calls = tool_calls
                .into_iter()
                .map(|tc| RequestedCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: CallArguments::from_json_str(&tc.function.arguments),
                })
                .collect();
            return Ok(ProviderStep::ToolCalls(calls));
        }

        Ok(ProviderStep::Text(choice.message.content.unwrap_or_default()))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn converse(&self, exchange: &Exchange) -> Result<ProviderStep, AdapterError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AdapterError::AuthFailure(format!(
                "{}: no API key configured",
                self.name
            )));
        };

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(exchange);

        debug!(
            provider = %self.name,
            model = %self.model,
            rounds = exchange.rounds.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .header("X-Title", "Addis-Sync")
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(&self.name, e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(http::status_error(&self.name, status, &error_body));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AdapterError::ProtocolFailure(format!("{}: undecodable body: {e}", self.name))
        })?;

        Self::parse_response(&self.name, body)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}
