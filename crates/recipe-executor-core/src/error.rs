// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine error taxonomy.

use std::path::PathBuf;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Engine error.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Recipe is unparseable or structurally wrong.
    #[error("invalid recipe: {0}")]
    InvalidRecipe(String),

    /// A descriptor's `type` is not in the registry.
    #[error("unknown step type '{0}'")]
    UnknownStepType(String),

    /// A step descriptor fails validation or references inconsistent fields.
    #[error("invalid step config: {0}")]
    Config(String),

    /// Template has invalid syntax or failed to render.
    #[error("template error: {0}")]
    Template(String),

    /// Strict context read of a missing key.
    #[error("unknown context key '{0}'")]
    UnknownKey(String),

    /// Required input file absent.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Filesystem operation failed.
    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Provider call failed, including structured-response validation.
    #[error("llm call failed: {0}")]
    Llm(String),

    /// Tool-server acquisition or invocation failed.
    #[error("mcp error: {0}")]
    Mcp(String),

    /// Propagated cancellation.
    #[error("cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// Enriches message-bearing errors with the failing step's identity.
    ///
    /// Kinds carrying a structured payload (paths, keys, cancellation) pass
    /// through unchanged.
    pub(crate) fn in_step(self, index: usize, step_type: &str) -> Self {
        match self {
            Self::InvalidRecipe(msg) => {
                Self::InvalidRecipe(format!("step {index} ({step_type}): {msg}"))
            }
            Self::Config(msg) => Self::Config(format!("step {index} ({step_type}): {msg}")),
            Self::Template(msg) => Self::Template(format!("step {index} ({step_type}): {msg}")),
            Self::Llm(msg) => Self::Llm(format!("step {index} ({step_type}): {msg}")),
            Self::Mcp(msg) => Self::Mcp(format!("step {index} ({step_type}): {msg}")),
            other => other,
        }
    }
}

impl From<recipe_executor_mcp::McpError> for ExecutorError {
    fn from(err: recipe_executor_mcp::McpError) -> Self {
        Self::Mcp(err.to_string())
    }
}

impl From<recipe_executor_providers::FacadeError> for ExecutorError {
    fn from(err: recipe_executor_providers::FacadeError) -> Self {
        match err {
            recipe_executor_providers::FacadeError::Mcp(mcp) => Self::Mcp(mcp.to_string()),
            other => Self::Llm(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_step_prefixes_message_kinds() {
        let err = ExecutorError::Config("bad field".to_string()).in_step(2, "loop");
        assert_eq!(
            err.to_string(),
            "invalid step config: step 2 (loop): bad field"
        );
    }

    #[test]
    fn test_in_step_preserves_structured_kinds() {
        let err = ExecutorError::UnknownKey("greeting".to_string()).in_step(0, "set_context");
        assert!(matches!(err, ExecutorError::UnknownKey(key) if key == "greeting"));

        let err = ExecutorError::Cancelled.in_step(1, "loop");
        assert!(matches!(err, ExecutorError::Cancelled));
    }
}
