// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `llm_generate` step: call the LLM facade and store the typed result.
//!
//! The declared `output_format` selects the acceptor: `"text"` stores a
//! string, `"files"` stores a list of file specs, an object schema stores
//! the validated record, and an array schema is wrapped internally under
//! `items` and unwrapped before storage.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::filespec::file_specs_from_value;
use crate::step::{parse_config, Step};
use crate::template::{render, render_value};
use async_trait::async_trait;
use recipe_executor_mcp::McpServerConfig;
use recipe_executor_providers::{generate, GenerateOutput, GenerateRequest, OutputSpec};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// `llm_generate` configuration.
#[derive(Debug, Deserialize)]
pub struct LlmGenerateConfig {
    /// Prompt; templated.
    pub prompt: String,

    /// Model identifier `provider/name[/deployment]`; templated.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens; an integer or a templated string.
    #[serde(default)]
    pub max_tokens: Option<Value>,

    /// MCP tool-server descriptors exposed to the call; templated.
    #[serde(default)]
    pub mcp_servers: Vec<Value>,

    /// `"text"`, `"files"`, or a JSON schema (object or array).
    #[serde(default = "default_output_format")]
    pub output_format: Value,

    /// Artifact key receiving the result; templated.
    pub output_key: String,
}

fn default_model() -> String {
    "openai/gpt-4o".to_string()
}

fn default_output_format() -> Value {
    Value::String("text".to_string())
}

/// The declared output acceptor.
enum OutputShape {
    Text,
    Files,
    Object(Value),
    List(Value),
}

impl OutputShape {
    /// Parses and validates the `output_format` field; schema problems are
    /// config errors raised before any remote call.
    fn from_config(format: &Value) -> Result<Self> {
        match format {
            Value::String(name) => match name.as_str() {
                "text" => Ok(Self::Text),
                "files" => Ok(Self::Files),
                other => Err(ExecutorError::Config(format!(
                    "output_format must be 'text', 'files', or a JSON schema, got: '{other}'"
                ))),
            },
            Value::Object(schema) => {
                let shape = if schema.get("type") == Some(&Value::String("array".into())) {
                    Self::List(wrap_array_schema(format))
                } else {
                    Self::Object(format.clone())
                };
                let schema_value = match &shape {
                    Self::List(wrapped) => wrapped,
                    Self::Object(object) => object,
                    _ => unreachable!(),
                };
                jsonschema::validator_for(schema_value).map_err(|e| {
                    ExecutorError::Config(format!("output_format is not a valid JSON schema: {e}"))
                })?;
                Ok(shape)
            }
            other => Err(ExecutorError::Config(format!(
                "output_format must be a string or a JSON schema, got: {other}"
            ))),
        }
    }

    fn output_spec(&self) -> OutputSpec {
        match self {
            Self::Text => OutputSpec::Text,
            Self::Files => OutputSpec::Json {
                schema: files_schema(),
            },
            Self::Object(schema) => OutputSpec::Json {
                schema: schema.clone(),
            },
            Self::List(wrapped) => OutputSpec::Json {
                schema: wrapped.clone(),
            },
        }
    }
}

/// Internal wrapper for array schemas; unwrapped before storage.
fn wrap_array_schema(items: &Value) -> Value {
    json!({
        "type": "object",
        "properties": { "items": items },
        "required": ["items"]
    })
}

/// Acceptor for `"files"` output: `{ files: [{ path, content }, ...] }`.
fn files_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "files": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "content": { "type": "string" }
                    },
                    "required": ["path", "content"]
                }
            }
        },
        "required": ["files"]
    })
}

/// Calls the LLM facade and stores the (unwrapped) result.
pub struct LlmGenerateStep {
    config: LlmGenerateConfig,
}

impl LlmGenerateStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        let parsed: LlmGenerateConfig = parse_config("llm_generate", config)?;
        // Surface bad schemas at validation time, not mid-run.
        OutputShape::from_config(&parsed.output_format)?;
        Ok(Box::new(Self { config: parsed }))
    }

    fn rendered_max_tokens(&self, context: &Context) -> Result<Option<u32>> {
        match &self.config.max_tokens {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number
                .as_u64()
                .map(|n| Some(n as u32))
                .ok_or_else(|| {
                    ExecutorError::Config(format!("max_tokens must be a positive integer: {number}"))
                }),
            Some(Value::String(template)) => {
                let rendered = render(template, context)?;
                if rendered.is_empty() {
                    return Ok(None);
                }
                rendered.parse::<u32>().map(Some).map_err(|_| {
                    ExecutorError::Config(format!("max_tokens is not an integer: '{rendered}'"))
                })
            }
            Some(other) => Err(ExecutorError::Config(format!(
                "max_tokens must be an integer or string, got: {other}"
            ))),
        }
    }
}

#[async_trait]
impl Step for LlmGenerateStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        let prompt = render(&self.config.prompt, context)?;
        let model = render(&self.config.model, context)?;
        let output_key = render(&self.config.output_key, context)?;
        let max_tokens = self.rendered_max_tokens(context)?;
        let shape = OutputShape::from_config(&self.config.output_format)?;

        let mut servers = Vec::new();
        for raw in &self.config.mcp_servers {
            let rendered = render_value(raw, context)?;
            let server: McpServerConfig = serde_json::from_value(rendered).map_err(|e| {
                ExecutorError::Config(format!("invalid mcp server descriptor: {e}"))
            })?;
            servers.push(server);
        }

        debug!(model = %model, prompt = %prompt, "Calling LLM");

        let output = generate(
            GenerateRequest {
                prompt,
                model,
                max_tokens,
                mcp_servers: servers,
                output: shape.output_spec(),
            },
            context.config(),
        )
        .await?;

        let value = match (&shape, output) {
            (OutputShape::Text, GenerateOutput::Text(text)) => Value::String(text),
            (OutputShape::Files, GenerateOutput::Json(value)) => {
                let specs = file_specs_from_value(&value)
                    .map_err(|e| ExecutorError::Llm(format!("validation failed: {e}")))?;
                serde_json::to_value(specs)
                    .map_err(|e| ExecutorError::Llm(format!("unserializable file specs: {e}")))?
            }
            (OutputShape::Object(_), GenerateOutput::Json(value)) => value,
            (OutputShape::List(_), GenerateOutput::Json(value)) => value
                .get("items")
                .cloned()
                .ok_or_else(|| ExecutorError::Llm("validation failed: missing 'items'".to_string()))?,
            _ => {
                return Err(ExecutorError::Llm(
                    "facade returned a result of the wrong shape".to_string(),
                ))
            }
        };

        info!(key = %output_key, "Stored LLM result");
        context.set(output_key, value);
        Ok(())
    }
}
