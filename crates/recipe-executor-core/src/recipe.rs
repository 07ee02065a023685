// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipe document types.
//!
//! A recipe is an ordered sequence of step descriptors. The JSON root may be
//! either a bare array of descriptors or an object with a `steps` key. Legacy
//! recipes put config fields as top-level siblings of `type`; loading merges
//! those into `config`.

use crate::error::{ExecutorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// One step inside a recipe: a registry type name plus its raw config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawStep")]
pub struct StepDescriptor {
    /// Step type, resolved through the registry.
    #[serde(rename = "type")]
    pub step_type: String,

    /// Raw configuration object, validated by the step's config schema.
    pub config: Map<String, Value>,
}

/// Wire form of a step descriptor, accepting legacy top-level config fields.
#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawStep> for StepDescriptor {
    fn from(raw: RawStep) -> Self {
        let mut config = raw.config;
        for (key, value) in raw.extra {
            config.entry(key).or_insert(value);
        }
        Self {
            step_type: raw.step_type,
            config,
        }
    }
}

/// A parsed recipe.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recipe {
    /// Ordered step descriptors. Empty is permitted and is a no-op.
    pub steps: Vec<StepDescriptor>,
}

/// Wire form of a recipe root: `{ "steps": [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeDoc {
    Wrapped { steps: Vec<StepDescriptor> },
    Bare(Vec<StepDescriptor>),
}

impl<'de> Deserialize<'de> for Recipe {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let doc = RecipeDoc::deserialize(deserializer)?;
        let steps = match doc {
            RecipeDoc::Wrapped { steps } => steps,
            RecipeDoc::Bare(steps) => steps,
        };
        Ok(Self { steps })
    }
}

impl Recipe {
    /// Wraps a descriptor list.
    pub fn from_steps(steps: Vec<StepDescriptor>) -> Self {
        Self { steps }
    }

    /// Parses a recipe from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ExecutorError::InvalidRecipe(e.to_string()))
    }

    /// Converts a parsed JSON value into a recipe.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ExecutorError::InvalidRecipe(e.to_string()))
    }

    /// Loads a recipe from any [`RecipeSource`].
    pub async fn load(source: RecipeSource) -> Result<Self> {
        match source {
            RecipeSource::Path(path) => {
                let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ExecutorError::FileNotFound(path.clone())
                    } else {
                        ExecutorError::Io {
                            path: path.clone(),
                            source: e,
                        }
                    }
                })?;
                Self::parse(&text).map_err(|e| {
                    ExecutorError::InvalidRecipe(format!("{}: {e}", path.display()))
                })
            }
            RecipeSource::Text(text) => Self::parse(&text),
            RecipeSource::Value(value) => Self::from_value(value),
            RecipeSource::Steps(steps) => Ok(Self::from_steps(steps)),
        }
    }
}

/// Where a recipe comes from: a file, JSON text, a parsed value, or an
/// in-memory descriptor list.
#[derive(Debug, Clone)]
pub enum RecipeSource {
    /// Filesystem path to a JSON recipe.
    Path(PathBuf),
    /// Recipe JSON text.
    Text(String),
    /// Parsed recipe value.
    Value(Value),
    /// In-memory descriptor list.
    Steps(Vec<StepDescriptor>),
}

impl From<&str> for RecipeSource {
    /// Treats text that looks like a JSON document as inline recipe text,
    /// anything else as a path.
    fn from(s: &str) -> Self {
        let trimmed = s.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Self::Text(s.to_string())
        } else {
            Self::Path(PathBuf::from(s))
        }
    }
}

impl From<String> for RecipeSource {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&Path> for RecipeSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for RecipeSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Value> for RecipeSource {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Vec<StepDescriptor>> for RecipeSource {
    fn from(steps: Vec<StepDescriptor>) -> Self {
        Self::Steps(steps)
    }
}

impl From<&Recipe> for RecipeSource {
    fn from(recipe: &Recipe) -> Self {
        Self::Steps(recipe.steps.clone())
    }
}
