// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative MCP server descriptors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configured MCP server, as it appears in recipe JSON.
///
/// The two transports are distinguished by field shape: an HTTP/SSE server
/// carries a `url`, a stdio server carries a `command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    /// HTTP server reached over Server-Sent Events.
    Http(HttpServerConfig),
    /// Local child process speaking MCP over stdin/stdout.
    Stdio(StdioServerConfig),
}

/// HTTP/SSE server descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Base URL of the SSE endpoint.
    pub url: String,

    /// Extra request headers (e.g. authorization).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Stdio server descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdioServerConfig {
    /// Executable to launch.
    pub command: String,

    /// Arguments passed to the executable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables for the child process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl McpServerConfig {
    /// A short human-readable label for logs and error messages.
    pub fn label(&self) -> String {
        match self {
            Self::Http(http) => http.url.clone(),
            Self::Stdio(stdio) => stdio.command.clone(),
        }
    }
}
