// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mcp` step: invoke a single tool on an MCP server.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::step::{parse_config, Step};
use crate::template::{render, render_value};
use async_trait::async_trait;
use recipe_executor_mcp::{McpServerConfig, McpSession};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

/// `mcp` configuration.
#[derive(Debug, Deserialize)]
pub struct McpStepConfig {
    /// Server descriptor (HTTP/SSE or stdio); templated.
    pub server: Value,

    /// Tool to invoke; templated.
    pub tool_name: String,

    /// Tool arguments; templated.
    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Artifact key receiving the tool result; templated.
    pub result_key: String,
}

/// Acquires the server, calls the tool, stores the result, and releases the
/// server on all exit paths.
pub struct McpStep {
    config: McpStepConfig,
}

impl McpStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self {
            config: parse_config("mcp", config)?,
        }))
    }
}

#[async_trait]
impl Step for McpStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        let server_value = render_value(&self.config.server, context)?;
        let server: McpServerConfig = serde_json::from_value(server_value)
            .map_err(|e| ExecutorError::Config(format!("invalid mcp server descriptor: {e}")))?;

        let tool_name = render(&self.config.tool_name, context)?;
        let result_key = render(&self.config.result_key, context)?;
        let arguments =
            render_value(&Value::Object(self.config.arguments.clone()), context)?;

        let session = McpSession::connect(&server).await?;
        let outcome = session.call_tool(&tool_name, arguments).await;
        session.close().await;
        let value = outcome?;

        info!(tool = %tool_name, key = %result_key, "Stored MCP tool result");
        context.set(result_key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_parses_both_transports() {
        let config = json!({
            "server": { "url": "http://localhost:3001/sse" },
            "tool_name": "lookup",
            "arguments": { "q": "{{query}}" },
            "result_key": "found"
        });
        let Value::Object(map) = config else { unreachable!() };
        assert!(McpStep::from_config(&map).is_ok());

        let config = json!({
            "server": { "command": "python", "args": ["-m", "server"] },
            "tool_name": "lookup",
            "result_key": "found"
        });
        let Value::Object(map) = config else { unreachable!() };
        assert!(McpStep::from_config(&map).is_ok());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let config = json!({ "server": { "url": "http://x" } });
        let Value::Object(map) = config else { unreachable!() };
        assert!(McpStep::from_config(&map).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_stdio_server_is_mcp_error() {
        let config = json!({
            "server": { "command": "/no/such/binary" },
            "tool_name": "lookup",
            "result_key": "found"
        });
        let Value::Object(map) = config else { unreachable!() };
        let step = McpStep::from_config(&map).unwrap();

        let mut ctx = Context::default();
        match step.execute(&mut ctx).await {
            Err(ExecutorError::Mcp(_)) => {}
            other => panic!("Expected McpError, got {other:?}"),
        }
    }
}
