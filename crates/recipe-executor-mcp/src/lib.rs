// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP (Model Context Protocol) tool-server support.
//!
//! This crate holds the declarative server descriptors that recipes embed
//! (`url`-based HTTP/SSE servers and `command`-based stdio servers) and a
//! scoped client session over the `rmcp` SDK. Sessions are acquired for the
//! duration of a single LLM call or tool invocation and released on every
//! exit path.

mod config;
mod session;

pub use config::{HttpServerConfig, McpServerConfig, StdioServerConfig};
pub use session::{McpSession, ToolInfo};

/// MCP error.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Server descriptor is malformed.
    #[error("invalid MCP server config: {0}")]
    Config(String),

    /// Transport could not be established.
    #[error("failed to connect to MCP server '{0}': {1}")]
    Connect(String, String),

    /// Tool listing or invocation failed.
    #[error("MCP tool call failed: {0}")]
    Tool(String),

    /// The server reported an error result for a tool call.
    #[error("MCP tool '{0}' returned an error: {1}")]
    ToolResult(String, String),
}
