// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `read_files` step: load one or more files into the context.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::step::{parse_config, Step};
use crate::template::render;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, info};

/// `read_files` configuration.
#[derive(Debug, Deserialize)]
pub struct ReadFilesConfig {
    /// One path, a comma-separated string, or a list of paths; templated.
    pub path: PathInput,

    /// Artifact key receiving the result; templated.
    pub content_key: String,

    /// Skip missing files instead of failing.
    #[serde(default)]
    pub optional: bool,

    /// How multiple files combine.
    #[serde(default)]
    pub merge_mode: MergeMode,
}

/// Path field: a single string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PathInput {
    /// Single path, possibly comma-separated.
    Single(String),
    /// Explicit list of paths.
    Many(Vec<String>),
}

/// Merge mode for multi-file reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Concatenate contents with per-path headers.
    #[default]
    Concat,
    /// Mapping from full path string to content.
    Dict,
}

/// Reads files, parsing `.json`/`.yaml`/`.yml` into structured values.
pub struct ReadFilesStep {
    config: ReadFilesConfig,
}

impl ReadFilesStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self {
            config: parse_config("read_files", config)?,
        }))
    }

    fn rendered_paths(&self, context: &Context) -> Result<Vec<String>> {
        let raw: Vec<&str> = match &self.config.path {
            PathInput::Single(path) => vec![path.as_str()],
            PathInput::Many(paths) => paths.iter().map(String::as_str).collect(),
        };

        let mut paths = Vec::new();
        for entry in raw {
            let rendered = render(entry, context)?;
            for part in rendered.split(',') {
                let part = part.trim();
                if !part.is_empty() {
                    paths.push(part.to_string());
                }
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl Step for ReadFilesStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        let content_key = render(&self.config.content_key, context)?;
        let paths = self.rendered_paths(context)?;

        let mut entries: Vec<(String, Value)> = Vec::new();
        for path in &paths {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => entries.push((path.clone(), parse_by_suffix(path, text))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if self.config.optional {
                        debug!(path = %path, "Optional file missing, skipping");
                    } else {
                        return Err(ExecutorError::FileNotFound(PathBuf::from(path)));
                    }
                }
                Err(e) => {
                    return Err(ExecutorError::Io {
                        path: PathBuf::from(path),
                        source: e,
                    })
                }
            }
        }

        let read = entries.len();
        let value = if paths.len() <= 1 {
            entries
                .pop()
                .map(|(_, content)| content)
                .unwrap_or_else(|| Value::String(String::new()))
        } else {
            match self.config.merge_mode {
                MergeMode::Concat => Value::String(
                    entries
                        .iter()
                        .map(|(path, content)| format!("=== {path} ===\n{}", stringify(content)))
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                ),
                MergeMode::Dict => Value::Object(entries.into_iter().collect()),
            }
        };

        info!(key = %content_key, files = read, "Read files into context");
        context.set(content_key, value);
        Ok(())
    }
}

/// Parses structured formats by file suffix; unparseable content stays raw.
fn parse_by_suffix(path: &str, text: String) -> Value {
    let suffix = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match suffix.as_str() {
        "json" => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        "yaml" | "yml" => serde_yaml::from_str(&text).unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
