// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider trait definitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instruction.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool invocation result.
    Tool,
}

/// One message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,

    /// Text content.
    pub content: String,

    /// Tool calls requested by the assistant (assistant messages only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifier of the tool call this message answers (tool messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Builds a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Builds a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Builds a tool-result message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool name.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// JSON schema of the tool's arguments.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    pub id: String,

    /// Name of the tool to invoke.
    pub name: String,

    /// Parsed argument object.
    pub arguments: Value,
}

/// Completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model name (provider-local, without the `provider/` prefix).
    pub model: String,

    /// Conversation so far.
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,

    /// Tools the model may call.
    pub tools: Vec<ToolDef>,

    /// Request a JSON-object response where the provider supports it.
    pub json_output: bool,
}

/// Completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The assistant message (text and/or tool calls).
    pub message: ChatMessage,

    /// Model that produced the response.
    pub model: String,

    /// Total tokens used, when reported.
    pub tokens_used: Option<u32>,
}

/// LLM provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    /// Generate a completion.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get provider name.
    fn name(&self) -> &str;
}

/// Provider error.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Authentication error.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Invalid request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider-specific error.
    #[error("Provider error: {0}")]
    ProviderSpecific(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Timeout error.
    #[error("Request timed out")]
    Timeout,
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl ProviderError {
    /// Converts a reqwest error to a ProviderError.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_status() {
            if let Some(status) = err.status() {
                if status == 401 || status == 403 {
                    Self::AuthError(err.to_string())
                } else if status == 429 {
                    Self::RateLimitExceeded
                } else {
                    Self::HttpError(err.to_string())
                }
            } else {
                Self::HttpError(err.to_string())
            }
        } else {
            Self::HttpError(err.to_string())
        }
    }
}
