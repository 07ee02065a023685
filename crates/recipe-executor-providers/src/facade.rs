// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider-agnostic LLM facade.
//!
//! A single async entry point accepts a rendered prompt, a `provider/name`
//! model identifier, optional MCP tool servers, and a declared output shape,
//! and returns the typed result. Provider selection and credentials come from
//! the run's config map; MCP sessions are scoped to the call and released on
//! every exit path.

use crate::anthropic::AnthropicProvider;
use crate::azure::AzureOpenAiProvider;
use crate::model::{ModelId, ProviderKind};
use crate::openai::OpenAiProvider;
use crate::structured;
use crate::traits::{ChatMessage, CompletionRequest, LlmProvider, ProviderError, ToolDef};
use recipe_executor_mcp::{McpError, McpServerConfig, McpSession};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Read-only run configuration (credentials, endpoints, defaults).
pub type ConfigMap = BTreeMap<String, Value>;

/// Maximum number of provider round-trips in a tool-use conversation.
const MAX_TOOL_ROUNDS: usize = 10;

/// Declared output shape of an LLM call.
#[derive(Debug, Clone)]
pub enum OutputSpec {
    /// Plain text.
    Text,
    /// A JSON value validated against the given schema.
    Json {
        /// JSON schema the response must conform to.
        schema: Value,
    },
}

/// Result of an LLM call, matching the declared [`OutputSpec`].
#[derive(Debug, Clone)]
pub enum GenerateOutput {
    /// Plain text response.
    Text(String),
    /// Schema-validated JSON response.
    Json(Value),
}

/// A fully-rendered LLM invocation.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Rendered prompt.
    pub prompt: String,

    /// Model identifier, `provider/name[/deployment]`.
    pub model: String,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,

    /// Tool servers exposed to the model for this call.
    pub mcp_servers: Vec<McpServerConfig>,

    /// Declared output shape.
    pub output: OutputSpec,
}

/// Facade error.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// Provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Tool-server acquisition or invocation failed.
    #[error(transparent)]
    Mcp(#[from] McpError),

    /// Structured response failed schema validation.
    #[error("{0}")]
    Validation(String),
}

/// Runs one LLM call end to end: resolve the provider, connect tool servers,
/// drive the tool-use conversation, and shape the final response.
pub async fn generate(
    request: GenerateRequest,
    config: &ConfigMap,
) -> Result<GenerateOutput, FacadeError> {
    let model_id: ModelId = request.model.parse().map_err(FacadeError::Provider)?;
    let provider = resolve_provider(&model_id, config)?;

    debug!(model = %model_id, provider = provider.name(), "Starting LLM call");

    let mut sessions = Vec::new();
    for server in &request.mcp_servers {
        match McpSession::connect(server).await {
            Ok(session) => sessions.push(session),
            Err(error) => {
                close_sessions(sessions).await;
                return Err(error.into());
            }
        }
    }

    let result = run_conversation(provider.as_ref(), &model_id, &request, &sessions).await;
    close_sessions(sessions).await;
    let text = result?;

    match &request.output {
        OutputSpec::Text => Ok(GenerateOutput::Text(text)),
        OutputSpec::Json { schema } => {
            let value = structured::extract_json(&text)?;
            structured::validate(schema, &value)?;
            Ok(GenerateOutput::Json(value))
        }
    }
}

/// Builds the provider for a parsed model identifier from run config.
pub fn resolve_provider(
    model: &ModelId,
    config: &ConfigMap,
) -> Result<Box<dyn LlmProvider>, FacadeError> {
    match model.provider {
        ProviderKind::OpenAi | ProviderKind::OpenAiResponses => {
            let api_key = required_key(config, "openai_api_key")?;
            Ok(Box::new(OpenAiProvider::new(api_key)))
        }
        ProviderKind::Anthropic => {
            let api_key = required_key(config, "anthropic_api_key")?;
            Ok(Box::new(AnthropicProvider::new(api_key)))
        }
        ProviderKind::Azure | ProviderKind::AzureResponses => {
            let base_url = required_key(config, "azure_openai_base_url")?;
            let api_version = config_str(config, "azure_openai_api_version");
            let deployment = model
                .deployment
                .clone()
                .or_else(|| config_str(config, "azure_openai_deployment_name"))
                .unwrap_or_else(|| model.name.clone());

            if let Some(api_key) = config_str(config, "azure_openai_api_key") {
                Ok(Box::new(AzureOpenAiProvider::new(
                    api_key,
                    base_url,
                    deployment,
                    api_version,
                )))
            } else if config_bool(config, "azure_use_managed_identity") {
                Err(FacadeError::Provider(ProviderError::AuthError(
                    "azure managed identity token acquisition is not available in this build; \
                     set azure_openai_api_key"
                        .to_string(),
                )))
            } else {
                Err(FacadeError::Provider(ProviderError::AuthError(
                    "azure_openai_api_key not configured".to_string(),
                )))
            }
        }
        ProviderKind::Ollama => {
            let base_url = config_str(config, "ollama_base_url")
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            Ok(Box::new(OpenAiProvider::compatible(
                "ollama",
                "ollama".to_string(),
                format!("{}/v1", base_url.trim_end_matches('/')),
            )))
        }
        ProviderKind::Gemini => {
            let api_key = required_key(config, "gemini_api_key")?;
            Ok(Box::new(OpenAiProvider::compatible(
                "gemini",
                api_key,
                "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            )))
        }
    }
}

/// Drives the provider conversation, executing MCP tool calls until the
/// model produces a final (tool-call-free) message.
async fn run_conversation(
    provider: &dyn LlmProvider,
    model: &ModelId,
    request: &GenerateRequest,
    sessions: &[McpSession],
) -> Result<String, FacadeError> {
    let mut tools: Vec<ToolDef> = Vec::new();
    let mut routes: HashMap<String, usize> = HashMap::new();
    for (index, session) in sessions.iter().enumerate() {
        for tool in session.list_tools().await? {
            if routes.contains_key(&tool.name) {
                warn!(
                    tool = %tool.name,
                    server = session.label(),
                    "Duplicate MCP tool name, keeping the first server's definition"
                );
                continue;
            }
            routes.insert(tool.name.clone(), index);
            tools.push(ToolDef {
                name: tool.name,
                description: tool.description,
                parameters: tool.input_schema,
            });
        }
    }

    let json_output = matches!(request.output, OutputSpec::Json { .. });
    let mut messages = Vec::new();
    if let OutputSpec::Json { schema } = &request.output {
        messages.push(ChatMessage::system(structured::schema_instruction(schema)));
    }
    messages.push(ChatMessage::user(request.prompt.clone()));

    for round in 0..MAX_TOOL_ROUNDS {
        let response = provider
            .complete(CompletionRequest {
                model: model.name.clone(),
                messages: messages.clone(),
                max_tokens: request.max_tokens,
                tools: tools.clone(),
                json_output,
            })
            .await?;

        if response.message.tool_calls.is_empty() {
            debug!(
                model = %model,
                rounds = round + 1,
                tokens = ?response.tokens_used,
                "LLM call completed"
            );
            return Ok(response.message.content);
        }

        let calls = response.message.tool_calls.clone();
        messages.push(response.message);

        for call in calls {
            debug!(tool = %call.name, "Executing MCP tool call");
            let session_index = *routes.get(&call.name).ok_or_else(|| {
                FacadeError::Provider(ProviderError::InvalidRequest(format!(
                    "model requested unknown tool '{}'",
                    call.name
                )))
            })?;
            let result = sessions[session_index]
                .call_tool(&call.name, call.arguments)
                .await?;
            let content = match result {
                Value::String(text) => text,
                other => other.to_string(),
            };
            messages.push(ChatMessage::tool(call.id, content));
        }
    }

    Err(FacadeError::Provider(ProviderError::ProviderSpecific(
        format!("tool-use conversation exceeded {MAX_TOOL_ROUNDS} rounds"),
    )))
}

async fn close_sessions(sessions: Vec<McpSession>) {
    for session in sessions {
        session.close().await;
    }
}

fn config_str(config: &ConfigMap, key: &str) -> Option<String> {
    match config.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn config_bool(config: &ConfigMap, key: &str) -> bool {
    match config.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn required_key(config: &ConfigMap, key: &str) -> Result<String, FacadeError> {
    config_str(config, key).ok_or_else(|| {
        FacadeError::Provider(ProviderError::AuthError(format!("{key} not configured")))
    })
}
