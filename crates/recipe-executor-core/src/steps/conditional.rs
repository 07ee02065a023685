// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `conditional` step: branch on a rendered boolean expression.

use crate::condition;
use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::executor::Executor;
use crate::recipe::Recipe;
use crate::step::{parse_config, Step};
use crate::template::render;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// `conditional` configuration.
#[derive(Debug, Deserialize)]
pub struct ConditionalConfig {
    /// Boolean expression, templated against the context.
    pub condition: Value,

    /// Recipe fragment executed when the condition holds.
    #[serde(default)]
    pub if_true: Option<Value>,

    /// Recipe fragment executed otherwise.
    #[serde(default)]
    pub if_false: Option<Value>,
}

/// Evaluates the condition and dispatches the chosen branch through the
/// executor on the same context. A missing branch is a no-op.
pub struct ConditionalStep {
    config: ConditionalConfig,
}

impl ConditionalStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self {
            config: parse_config("conditional", config)?,
        }))
    }
}

#[async_trait]
impl Step for ConditionalStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        let outcome = match &self.config.condition {
            Value::Bool(b) => *b,
            Value::String(expression) => {
                let rendered = render(expression, context)?;
                condition::evaluate(&rendered)?
            }
            other => {
                return Err(ExecutorError::Config(format!(
                    "condition must be a string or boolean, got: {other}"
                )))
            }
        };

        debug!(outcome, "Evaluated condition");

        let branch = if outcome {
            &self.config.if_true
        } else {
            &self.config.if_false
        };

        if let Some(fragment) = branch {
            let recipe = Recipe::from_value(fragment.clone())?;
            Executor::new().run(&recipe, context).await?;
        }

        Ok(())
    }
}
