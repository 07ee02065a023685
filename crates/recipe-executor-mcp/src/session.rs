// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped MCP client sessions.

use crate::config::McpServerConfig;
use crate::McpError;
use rmcp::model::{CallToolRequestParam, RawContent};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::Value;
use tracing::{debug, warn};

/// A tool advertised by a connected server.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub input_schema: Value,
}

/// A live connection to one MCP server.
///
/// The session owns its transport: for stdio servers the child process is
/// terminated when the session is closed or dropped, for SSE servers the
/// event stream is torn down.
pub struct McpSession {
    service: RunningService<RoleClient, ()>,
    label: String,
}

impl McpSession {
    /// Connects to the server described by `config`.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let label = config.label();
        debug!(server = %label, "Connecting to MCP server");

        let service = match config {
            McpServerConfig::Stdio(stdio) => {
                let mut command = tokio::process::Command::new(&stdio.command);
                command.args(&stdio.args);
                for (key, value) in &stdio.env {
                    command.env(key, value);
                }
                if let Some(cwd) = &stdio.cwd {
                    command.current_dir(cwd);
                }

                let transport = TokioChildProcess::new(command)
                    .map_err(|e| McpError::Connect(label.clone(), e.to_string()))?;

                ()
                    .serve(transport)
                    .await
                    .map_err(|e| McpError::Connect(label.clone(), e.to_string()))?
            }
            McpServerConfig::Http(http) => {
                let transport = if http.headers.is_empty() {
                    StreamableHttpClientTransport::from_uri(http.url.clone())
                } else {
                    let mut header_map = reqwest::header::HeaderMap::new();
                    for (name, value) in &http.headers {
                        let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                            .map_err(|e| McpError::Config(format!("bad header name '{name}': {e}")))?;
                        let value = reqwest::header::HeaderValue::from_str(value)
                            .map_err(|e| McpError::Config(format!("bad header value: {e}")))?;
                        header_map.insert(name, value);
                    }
                    let client = reqwest::Client::builder()
                        .default_headers(header_map)
                        .build()
                        .map_err(|e| McpError::Connect(label.clone(), e.to_string()))?;
                    StreamableHttpClientTransport::with_client(
                        client,
                        StreamableHttpClientTransportConfig {
                            uri: http.url.clone().into(),
                            ..Default::default()
                        },
                    )
                };

                ()
                    .serve(transport)
                    .await
                    .map_err(|e| McpError::Connect(label.clone(), e.to_string()))?
            }
        };

        debug!(server = %label, "MCP server connected");
        Ok(Self { service, label })
    }

    /// The server label used in logs and error messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Lists the tools the server advertises.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let result = self
            .service
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Tool(format!("{}: list_tools: {e}", self.label)))?;

        Ok(result
            .tools
            .into_iter()
            .map(|tool| ToolInfo {
                name: tool.name.to_string(),
                description: tool
                    .description
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                input_schema: Value::Object(tool.input_schema.as_ref().clone()),
            })
            .collect())
    }

    /// Invokes a tool with the given arguments.
    ///
    /// Text content that parses as JSON is returned as the parsed value,
    /// otherwise the joined text of the result is returned as a string.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(McpError::Config(format!(
                    "tool arguments must be an object, got: {other}"
                )))
            }
        };

        debug!(server = %self.label, tool = name, "Calling MCP tool");

        let result = self
            .service
            .call_tool(CallToolRequestParam {
                meta: None,
                name: name.to_string().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| McpError::Tool(format!("{}: {name}: {e}", self.label)))?;

        let text = result
            .content
            .iter()
            .filter_map(|content| match &content.raw {
                RawContent::Text(text_content) => Some(text_content.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error.unwrap_or(false) {
            return Err(McpError::ToolResult(name.to_string(), text));
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Shuts the session down, terminating the transport.
    pub async fn close(self) {
        if let Err(e) = self.service.cancel().await {
            warn!(server = %self.label, error = %e, "MCP session did not shut down cleanly");
        }
    }
}
