// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI provider implementation.
//!
//! Also serves OpenAI-compatible endpoints (Ollama's `/v1` surface and
//! Gemini's compatibility layer) via [`OpenAiProvider::compatible`].

use crate::traits::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ProviderError, Role, ToolCall,
    ToolDef,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// OpenAI API provider.
#[derive(Debug)]
pub struct OpenAiProvider {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// API base URL.
    base_url: String,
    /// Provider name reported in logs and errors.
    name: String,
}

/// OpenAI chat completion request.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Chat message in OpenAI wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Tool call in OpenAI wire format; arguments are a JSON-encoded string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool definition in OpenAI wire format.
#[derive(Debug, Serialize)]
pub(crate) struct WireTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireFunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Response format selector (JSON mode).
#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

/// OpenAI chat completion response.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    pub model: String,
    pub usage: Option<Usage>,
}

/// Completion choice.
#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: WireMessage,
    #[allow(dead_code)]
    pub finish_reason: Option<String>,
}

/// Token usage information.
#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    #[allow(dead_code)]
    pub prompt_tokens: u32,
    #[allow(dead_code)]
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// OpenAI error response.
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    #[allow(dead_code)]
    code: Option<String>,
}

/// Converts internal messages to the OpenAI wire shape.
pub(crate) fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let tool_calls = if msg.tool_calls.is_empty() {
                None
            } else {
                Some(
                    msg.tool_calls
                        .iter()
                        .map(|call| WireToolCall {
                            id: call.id.clone(),
                            call_type: "function".to_string(),
                            function: WireFunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect(),
                )
            };
            WireMessage {
                role: role.to_string(),
                content: Some(msg.content.clone()),
                tool_calls,
                tool_call_id: msg.tool_call_id.clone(),
            }
        })
        .collect()
}

/// Converts internal tool definitions to the OpenAI wire shape.
pub(crate) fn to_wire_tools(tools: &[ToolDef]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| WireTool {
            tool_type: "function".to_string(),
            function: WireFunctionDef {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

/// Converts a wire assistant message back to the internal shape.
pub(crate) fn message_from_wire(wire: WireMessage) -> ChatMessage {
    let tool_calls = wire
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    ChatMessage {
        role: Role::Assistant,
        content: wire.content.unwrap_or_default(),
        tool_calls,
        tool_call_id: None,
    }
}

/// Parses an OpenAI-shaped error body.
pub(crate) fn parse_openai_error(status: StatusCode, body: &str) -> ProviderError {
    if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
        let error = error_response.error;
        let error_type = error.error_type.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS || error_type == "rate_limit_error" {
            return ProviderError::RateLimitExceeded;
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ProviderError::AuthError(error.message);
        }

        if error_type == "invalid_request_error" {
            return ProviderError::InvalidRequest(error.message);
        }

        return ProviderError::ProviderSpecific(format!(
            "[{}] {}: {}",
            status.as_u16(),
            error_type,
            error.message
        ));
    }

    ProviderError::HttpError(format!("[{}] {}", status.as_u16(), body))
}

impl OpenAiProvider {
    /// Creates a new OpenAI provider.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string())
    }

    /// Creates a new OpenAI provider with a custom base URL.
    ///
    /// Useful for testing or using OpenAI-compatible APIs.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self::compatible("openai", api_key, base_url)
    }

    /// Creates a provider for an OpenAI-compatible endpoint under a
    /// different name (e.g. `ollama`, `gemini`).
    pub fn compatible(name: impl Into<String>, api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url,
            name: name.into(),
        }
    }

    /// Converts a facade completion request to OpenAI format.
    fn to_openai_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: to_wire_messages(&request.messages),
            max_tokens: request.max_tokens,
            tools: to_wire_tools(&request.tools),
            response_format: request.json_output.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let openai_request = self.to_openai_request(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Failed to read response body"));

        if !status.is_success() {
            return Err(parse_openai_error(status, &body));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ProviderSpecific("response contained no choices".to_string()))?;

        Ok(CompletionResponse {
            message: message_from_wire(choice.message),
            model: completion.model,
            tokens_used: completion.usage.map(|usage| usage.total_tokens),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
