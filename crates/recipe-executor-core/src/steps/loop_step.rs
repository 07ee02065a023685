// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `loop` step: run substeps once per item of a sequence or mapping.
//!
//! Each iteration runs against a clone of the parent context with the item
//! under `item_key` (plus `__index` or `__key`). Iterations launch through a
//! semaphore gate sized by `max_concurrency`, optionally staggered by
//! `delay`. After the substeps finish, whatever the clone holds under
//! `item_key` becomes that item's result; results aggregate into the parent
//! under `result_key`, preserving source order (or source keys).

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::executor::Executor;
use crate::recipe::{Recipe, StepDescriptor};
use crate::step::{parse_config, Step};
use crate::template::render;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// `loop` configuration.
#[derive(Debug, Deserialize)]
pub struct LoopConfig {
    /// Dotted path to the source sequence or mapping; templated.
    pub items: String,

    /// Key the current item is placed under in each iteration's clone.
    pub item_key: String,

    /// Concurrent iteration bound: 0 = unbounded, 1 = sequential.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Seconds between iteration launches.
    #[serde(default)]
    pub delay: f64,

    /// Steps executed per item.
    pub substeps: Vec<StepDescriptor>,

    /// Parent artifact key receiving the aggregate.
    pub result_key: String,

    /// Cancel peers and fail on the first iteration error.
    #[serde(default = "default_true")]
    pub fail_fast: bool,
}

fn default_concurrency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Iterates substeps over a collection with bounded concurrency.
pub struct LoopStep {
    config: LoopConfig,
}

impl LoopStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        let parsed: LoopConfig = parse_config("loop", config)?;
        if parsed.substeps.is_empty() {
            return Err(ExecutorError::Config(
                "loop: substeps must be non-empty".to_string(),
            ));
        }
        Ok(Box::new(Self { config: parsed }))
    }
}

#[async_trait]
impl Step for LoopStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        let items_path = render(&self.config.items, context)?;
        let item_key = render(&self.config.item_key, context)?;
        let result_key = render(&self.config.result_key, context)?;

        let source = context
            .resolve_path(&items_path)
            .ok_or_else(|| ExecutorError::UnknownKey(items_path.clone()))?
            .clone();

        let (from_mapping, entries): (bool, Vec<(Value, Value)>) = match source {
            Value::Array(items) => (
                false,
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (Value::from(index), item))
                    .collect(),
            ),
            Value::Object(map) => (
                true,
                map.into_iter()
                    .map(|(key, item)| (Value::String(key), item))
                    .collect(),
            ),
            other => {
                return Err(ExecutorError::Config(format!(
                    "loop items '{items_path}' must resolve to a sequence or mapping, got: {other}"
                )))
            }
        };

        if entries.is_empty() {
            debug!(items = %items_path, "Loop source is empty");
            let empty = if from_mapping {
                Value::Object(Map::new())
            } else {
                Value::Array(Vec::new())
            };
            context.set(result_key, empty);
            return Ok(());
        }

        let total = entries.len();
        let bound = if self.config.max_concurrency == 0 {
            total
        } else {
            self.config.max_concurrency
        };

        debug!(
            items = %items_path,
            count = total,
            max_concurrency = bound,
            "Starting loop"
        );

        let keys: Vec<Value> = entries.iter().map(|(key, _)| key.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(bound));
        let branch_token = context.cancellation().child_token();
        let recipe = Arc::new(Recipe::from_steps(self.config.substeps.clone()));
        let fail_fast = self.config.fail_fast;

        let mut join_set: JoinSet<(usize, Result<Value>)> = JoinSet::new();

        for (position, (entry_key, item)) in entries.into_iter().enumerate() {
            if branch_token.is_cancelled() {
                break;
            }
            let permit = tokio::select! {
                _ = branch_token.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if position > 0 && self.config.delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(self.config.delay)).await;
            }

            let mut iteration = context.clone().with_cancellation(branch_token.child_token());
            iteration.set(item_key.clone(), item);
            match &entry_key {
                Value::String(key) => iteration.set("__key", Value::String(key.clone())),
                index => iteration.set("__index", index.clone()),
            }

            let recipe = recipe.clone();
            let token = branch_token.clone();
            let item_key = item_key.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = Executor::new()
                    .run(&recipe, &mut iteration)
                    .await
                    .map(|_| iteration.get(&item_key).cloned().unwrap_or(Value::Null));
                if result.is_err() && fail_fast {
                    token.cancel();
                }
                (position, result)
            });
        }

        let mut results: Vec<Option<Value>> = vec![None; total];
        let mut failures: Vec<(usize, ExecutorError)> = Vec::new();
        let mut fatal: Option<ExecutorError> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((position, Ok(value))) => results[position] = Some(value),
                Ok((position, Err(error))) => failures.push((position, error)),
                Err(join_error) => {
                    branch_token.cancel();
                    fatal.get_or_insert(ExecutorError::Config(format!(
                        "loop iteration task failed: {join_error}"
                    )));
                }
            }
        }

        if let Some(error) = fatal {
            return Err(error);
        }
        if context.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        failures.sort_by_key(|(position, _)| *position);

        if fail_fast {
            if let Some(index) = failures
                .iter()
                .position(|(_, error)| !matches!(error, ExecutorError::Cancelled))
            {
                return Err(failures.swap_remove(index).1);
            }
            if !failures.is_empty() {
                return Err(failures.remove(0).1);
            }
        } else if !failures.is_empty() {
            let records: Vec<Value> = failures
                .iter()
                .map(|(position, error)| {
                    let mut record = Map::new();
                    let field = if from_mapping { "key" } else { "index" };
                    record.insert(field.to_string(), keys[*position].clone());
                    record.insert("message".to_string(), Value::String(error.to_string()));
                    Value::Object(record)
                })
                .collect();
            for (position, _) in &failures {
                results[*position] = Some(Value::Null);
            }
            context.set(format!("{result_key}__errors"), Value::Array(records));
        }

        let succeeded = total - failures.len();
        let aggregate = if from_mapping {
            Value::Object(
                keys.into_iter()
                    .zip(results)
                    .map(|(key, value)| {
                        let key = match key {
                            Value::String(key) => key,
                            other => other.to_string(),
                        };
                        (key, value.unwrap_or(Value::Null))
                    })
                    .collect(),
            )
        } else {
            Value::Array(
                results
                    .into_iter()
                    .map(|value| value.unwrap_or(Value::Null))
                    .collect(),
            )
        };

        info!(
            key = %result_key,
            total,
            succeeded,
            "Loop completed"
        );
        context.set(result_key, aggregate);
        Ok(())
    }
}
