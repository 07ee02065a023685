// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `set_context` step: write a (templated) value into the context.

use crate::context::Context;
use crate::error::Result;
use crate::step::{parse_config, Step};
use crate::template::{render, render_value};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Re-render cap for `nested_render`.
const MAX_RENDER_PASSES: usize = 10;

/// `set_context` configuration.
#[derive(Debug, Deserialize)]
pub struct SetContextConfig {
    /// Artifact key; templated.
    pub key: String,

    /// Value to store; strings (including nested ones) are templated.
    pub value: Value,

    /// Re-render the result until it stops changing (bounded).
    #[serde(default)]
    pub nested_render: bool,

    /// What to do when the key already holds a value.
    #[serde(default)]
    pub if_exists: IfExists,
}

/// Collision policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Replace the existing value.
    #[default]
    Overwrite,
    /// Merge with the existing value (see [`merge_values`]).
    Merge,
}

/// Stores a rendered value, optionally merging with an existing artifact.
pub struct SetContextStep {
    config: SetContextConfig,
}

impl SetContextStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self {
            config: parse_config("set_context", config)?,
        }))
    }
}

#[async_trait]
impl Step for SetContextStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        let key = render(&self.config.key, context)?;
        let mut value = render_value(&self.config.value, context)?;

        if self.config.nested_render {
            for _ in 0..MAX_RENDER_PASSES {
                // Rendered output may legitimately contain braces that are
                // not templates; a failing re-render keeps the last good value.
                let next = match render_value(&value, context) {
                    Ok(next) => next,
                    Err(_) => break,
                };
                if next == value {
                    break;
                }
                value = next;
            }
        }

        let stored = match self.config.if_exists {
            IfExists::Overwrite => value,
            IfExists::Merge => match context.get(&key).cloned() {
                Some(existing) => merge_values(existing, value),
                None => value,
            },
        };

        debug!(key = %key, "Set context artifact");
        context.set(key, stored);
        Ok(())
    }
}

/// Merge rules: string+string concatenates, sequence+anything appends,
/// mapping+mapping shallow-merges (new wins), anything else pairs the two
/// values into a sequence.
pub(crate) fn merge_values(existing: Value, new: Value) -> Value {
    match (existing, new) {
        (Value::String(a), Value::String(b)) => Value::String(a + &b),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (Value::Array(mut a), b) => {
            a.push(b);
            Value::Array(a)
        }
        (Value::Object(mut a), Value::Object(b)) => {
            for (key, value) in b {
                a.insert(key, value);
            }
            Value::Object(a)
        }
        (a, b) => Value::Array(vec![a, b]),
    }
}
