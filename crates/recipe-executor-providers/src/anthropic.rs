// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic (Claude) provider implementation.

use crate::traits::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ProviderError, Role, ToolCall,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic API provider.
#[derive(Debug)]
pub struct AnthropicProvider {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// API base URL.
    base_url: String,
    /// Default API version.
    api_version: String,
}

/// Anthropic messages request.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

/// Message in the conversation.
#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

/// Content block sent to the API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Tool definition in Anthropic wire format.
#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

/// Anthropic messages response.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    model: String,
    #[allow(dead_code)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

/// Content block in a response.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

/// Token usage information.
#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic error response.
#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(
            api_key,
            "https://api.anthropic.com/v1".to_string(),
            "2023-06-01".to_string(),
        )
    }

    /// Creates a new Anthropic provider with custom base URL and API version.
    pub fn with_base_url(api_key: String, base_url: String, api_version: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url,
            api_version,
        }
    }

    /// Converts a facade completion request to Anthropic format.
    ///
    /// System messages fold into the request-level `system` field; tool
    /// results become `tool_result` blocks, with consecutive results merged
    /// into a single user message so roles alternate as the API requires.
    fn to_anthropic_request(&self, request: &CompletionRequest) -> MessagesRequest {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User => messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::Text {
                        text: msg.content.clone(),
                    }],
                }),
                Role::Assistant => {
                    let mut content = Vec::new();
                    if !msg.content.is_empty() {
                        content.push(ContentBlock::Text {
                            text: msg.content.clone(),
                        });
                    }
                    for call in &msg.tool_calls {
                        content.push(ContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: call.arguments.clone(),
                        });
                    }
                    messages.push(AnthropicMessage {
                        role: "assistant".to_string(),
                        content,
                    });
                }
                Role::Tool => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                    };
                    match messages.last_mut() {
                        Some(last)
                            if last.role == "user"
                                && last
                                    .content
                                    .iter()
                                    .all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                        {
                            last.content.push(block)
                        }
                        _ => messages.push(AnthropicMessage {
                            role: "user".to_string(),
                            content: vec![block],
                        }),
                    }
                }
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        MessagesRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            tools: request
                .tools
                .iter()
                .map(|tool| AnthropicTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.parameters.clone(),
                })
                .collect(),
        }
    }

    /// Parses an error response from Anthropic.
    fn parse_error(&self, status: StatusCode, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            let error = error_response.error;

            if status == StatusCode::TOO_MANY_REQUESTS || error.error_type == "rate_limit_error" {
                return ProviderError::RateLimitExceeded;
            }

            if status == StatusCode::UNAUTHORIZED
                || status == StatusCode::FORBIDDEN
                || error.error_type == "authentication_error"
                || error.error_type == "permission_error"
            {
                return ProviderError::AuthError(error.message);
            }

            if error.error_type == "invalid_request_error" {
                return ProviderError::InvalidRequest(error.message);
            }

            return ProviderError::ProviderSpecific(format!(
                "[{}] {}: {}",
                status.as_u16(),
                error.error_type,
                error.message
            ));
        }

        ProviderError::HttpError(format!("[{}] {}", status.as_u16(), body))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let anthropic_request = self.to_anthropic_request(&request);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("Content-Type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Failed to read response body"));

        if !status.is_success() {
            return Err(self.parse_error(status, &body));
        }

        let messages_response: MessagesResponse = serde_json::from_str(&body)?;

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in messages_response.content {
            match block {
                ResponseBlock::Text { text } => text_parts.push(text),
                ResponseBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                ResponseBlock::Other => {}
            }
        }

        Ok(CompletionResponse {
            message: ChatMessage {
                role: Role::Assistant,
                content: text_parts.join(""),
                tool_calls,
                tool_call_id: None,
            },
            model: messages_response.model,
            tokens_used: Some(
                messages_response.usage.input_tokens + messages_response.usage.output_tokens,
            ),
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ToolDef;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new("test-key".to_string());
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, "https://api.anthropic.com/v1");
    }

    #[test]
    fn test_system_message_folds_into_system_field() {
        let provider = AnthropicProvider::new("test-key".to_string());
        let request = CompletionRequest {
            model: "claude-3-5-sonnet-latest".to_string(),
            messages: vec![
                ChatMessage::system("You are a helpful assistant"),
                ChatMessage::user("Hello, world!"),
            ],
            max_tokens: Some(100),
            tools: Vec::new(),
            json_output: false,
        };

        let anthropic_request = provider.to_anthropic_request(&request);
        assert_eq!(
            anthropic_request.system.as_deref(),
            Some("You are a helpful assistant")
        );
        assert_eq!(anthropic_request.messages.len(), 1);
        assert_eq!(anthropic_request.messages[0].role, "user");
        assert_eq!(anthropic_request.max_tokens, 100);
    }

    #[test]
    fn test_consecutive_tool_results_merge_into_one_user_message() {
        let provider = AnthropicProvider::new("test-key".to_string());
        let assistant = ChatMessage {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: vec![
                ToolCall {
                    id: "a".to_string(),
                    name: "one".to_string(),
                    arguments: json!({}),
                },
                ToolCall {
                    id: "b".to_string(),
                    name: "two".to_string(),
                    arguments: json!({}),
                },
            ],
            tool_call_id: None,
        };

        let request = CompletionRequest {
            model: "claude-3-5-sonnet-latest".to_string(),
            messages: vec![
                ChatMessage::user("go"),
                assistant,
                ChatMessage::tool("a", "1"),
                ChatMessage::tool("b", "2"),
            ],
            max_tokens: None,
            tools: Vec::new(),
            json_output: false,
        };

        let anthropic_request = provider.to_anthropic_request(&request);
        // user, assistant(tool_use x2), user(tool_result x2)
        assert_eq!(anthropic_request.messages.len(), 3);
        assert_eq!(anthropic_request.messages[2].role, "user");
        assert_eq!(anthropic_request.messages[2].content.len(), 2);
    }

    #[test]
    fn test_tools_translate_to_input_schema() {
        let provider = AnthropicProvider::new("test-key".to_string());
        let request = CompletionRequest {
            model: "claude-3-5-sonnet-latest".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: None,
            tools: vec![ToolDef {
                name: "search".to_string(),
                description: "Search things".to_string(),
                parameters: json!({"type": "object", "properties": {"q": {"type": "string"}}}),
            }],
            json_output: false,
        };

        let anthropic_request = provider.to_anthropic_request(&request);
        assert_eq!(anthropic_request.tools.len(), 1);
        assert_eq!(anthropic_request.tools[0].name, "search");
        assert_eq!(anthropic_request.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_parse_rate_limit_error() {
        let provider = AnthropicProvider::new("test-key".to_string());
        let error_json = r#"{"error": {"type": "rate_limit_error", "message": "Rate limit exceeded"}}"#;
        let error = provider.parse_error(StatusCode::TOO_MANY_REQUESTS, error_json);
        assert!(matches!(error, ProviderError::RateLimitExceeded));
    }

    #[test]
    fn test_parse_auth_error() {
        let provider = AnthropicProvider::new("test-key".to_string());
        let error_json = r#"{"error": {"type": "authentication_error", "message": "Invalid API key"}}"#;
        let error = provider.parse_error(StatusCode::UNAUTHORIZED, error_json);
        match error {
            ProviderError::AuthError(msg) => assert_eq!(msg, "Invalid API key"),
            other => panic!("Expected AuthError, got {other:?}"),
        }
    }

    #[test]
    fn test_response_tool_use_becomes_tool_call() {
        let body = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-latest",
            "content": [
                { "type": "text", "text": "Let me check." },
                { "type": "tool_use", "id": "tu_1", "name": "search", "input": {"q": "rust"} }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 10, "output_tokens": 20 }
        });

        let parsed: MessagesResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.usage.input_tokens, 10);
    }
}
