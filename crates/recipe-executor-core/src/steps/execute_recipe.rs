// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `execute_recipe` step: run a sub-recipe against the caller's context.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::executor::Executor;
use crate::recipe::RecipeSource;
use crate::step::{parse_config, Step};
use crate::template::{render, render_value};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

/// `execute_recipe` configuration.
#[derive(Debug, Deserialize)]
pub struct ExecuteRecipeConfig {
    /// Templated path to a recipe file, or an inline recipe value.
    pub recipe_path: Value,

    /// Artifact overrides applied before the sub-recipe runs; values are
    /// templated, and replace whatever the keys held.
    #[serde(default)]
    pub context_overrides: Map<String, Value>,
}

/// Runs a nested recipe with shared context: the sub-recipe's writes persist
/// in the caller.
pub struct ExecuteRecipeStep {
    config: ExecuteRecipeConfig,
}

impl ExecuteRecipeStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self {
            config: parse_config("execute_recipe", config)?,
        }))
    }
}

#[async_trait]
impl Step for ExecuteRecipeStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        for (key, value) in &self.config.context_overrides {
            let rendered = render_value(value, context)?;
            context.set(key.clone(), rendered);
        }

        let (label, source) = match &self.config.recipe_path {
            Value::String(template) => {
                let path = render(template, context)?;
                (path.clone(), RecipeSource::Path(PathBuf::from(path)))
            }
            inline @ (Value::Object(_) | Value::Array(_)) => {
                ("<inline>".to_string(), RecipeSource::Value(inline.clone()))
            }
            other => {
                return Err(ExecutorError::Config(format!(
                    "recipe_path must be a path string or an inline recipe, got: {other}"
                )))
            }
        };

        info!(recipe = %label, "Starting sub-recipe");
        Executor::new().execute(source, context).await?;
        info!(recipe = %label, "Completed sub-recipe");
        Ok(())
    }
}
