// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parallel` step: run substeps concurrently on isolated context clones.
//!
//! Unlike `loop`, nothing aggregates back into the parent: a branch's writes
//! vanish with its clone unless the branch persists them externally. The
//! first failure cancels the remaining branches and fails the step.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::executor::Executor;
use crate::recipe::{Recipe, StepDescriptor};
use crate::step::{parse_config, Step};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// `parallel` configuration.
#[derive(Debug, Deserialize)]
pub struct ParallelConfig {
    /// Branches; each substep runs as its own branch.
    pub substeps: Vec<StepDescriptor>,

    /// Concurrent branch bound: 0 = unbounded, 1 = sequential.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Seconds between branch launches.
    #[serde(default)]
    pub delay: f64,
}

fn default_concurrency() -> usize {
    1
}

/// Runs branches concurrently with fail-fast cancellation.
pub struct ParallelStep {
    config: ParallelConfig,
}

impl ParallelStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self {
            config: parse_config("parallel", config)?,
        }))
    }
}

#[async_trait]
impl Step for ParallelStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        if self.config.substeps.is_empty() {
            debug!("Parallel step has no substeps");
            return Ok(());
        }

        let total = self.config.substeps.len();
        let bound = if self.config.max_concurrency == 0 {
            total
        } else {
            self.config.max_concurrency
        };

        debug!(branches = total, max_concurrency = bound, "Starting parallel step");

        let semaphore = Arc::new(Semaphore::new(bound));
        let branch_token = context.cancellation().child_token();
        let mut join_set: JoinSet<(usize, Result<()>)> = JoinSet::new();

        for (position, descriptor) in self.config.substeps.iter().enumerate() {
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

            let mut branch = context.clone().with_cancellation(branch_token.child_token());
            let recipe = Arc::new(Recipe::from_steps(vec![descriptor.clone()]));
            let token = branch_token.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let result = Executor::new().run(&recipe, &mut branch).await;
                if result.is_err() {
                    token.cancel();
                }
                (position, result)
            });
        }

        let mut failures: Vec<(usize, ExecutorError)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((position, Err(error))) => failures.push((position, error)),
                Err(join_error) => {
                    branch_token.cancel();
                    failures.push((
                        usize::MAX,
                        ExecutorError::Config(format!("parallel branch task failed: {join_error}")),
                    ));
                }
            }
        }

        if context.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        failures.sort_by_key(|(position, _)| *position);
        if let Some(index) = failures
            .iter()
            .position(|(_, error)| !matches!(error, ExecutorError::Cancelled))
        {
            return Err(failures.swap_remove(index).1);
        }
        if let Some((_, error)) = failures.into_iter().next() {
            return Err(error);
        }

        debug!(branches = total, "Parallel step completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(config: Value) -> Box<dyn Step> {
        let Value::Object(map) = config else {
            panic!("config must be an object")
        };
        ParallelStep::from_config(&map).unwrap()
    }

    #[tokio::test]
    async fn test_zero_substeps_is_a_noop() {
        let mut ctx = Context::default();
        step(json!({"substeps": []})).execute(&mut ctx).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_branch_writes_do_not_leak() {
        let mut ctx = Context::default();
        ctx.set("work", json!("original"));
        step(json!({
            "max_concurrency": 0,
            "substeps": [
                { "type": "set_context", "config": { "key": "work", "value": "A" } },
                { "type": "set_context", "config": { "key": "work", "value": "B" } }
            ]
        }))
        .execute(&mut ctx)
        .await
        .unwrap();
        // Neither branch's write leaks; the parent keeps its value.
        assert_eq!(ctx.get("work"), Some(&json!("original")));
    }

    #[tokio::test]
    async fn test_branches_see_parent_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().display().to_string();

        let mut ctx = Context::default();
        ctx.set("who", json!("Ada"));
        step(json!({
            "max_concurrency": 0,
            "substeps": [
                { "type": "write_files", "config": {
                    "root": out,
                    "files": [ { "path": "a.txt", "content": "{{who}}" } ]
                } },
                { "type": "write_files", "config": {
                    "root": out,
                    "files": [ { "path": "b.txt", "content": "{{who}}" } ]
                } }
            ]
        }))
        .execute(&mut ctx)
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "Ada");
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "Ada");
    }

    #[tokio::test]
    async fn test_first_failure_fails_the_step() {
        let mut ctx = Context::default();
        let result = step(json!({
            "max_concurrency": 0,
            "substeps": [
                { "type": "set_context", "config": { "key": "fine", "value": 1 } },
                { "type": "read_files", "config": { "path": "/no/such/file", "content_key": "x" } }
            ]
        }))
        .execute(&mut ctx)
        .await;
        assert!(matches!(result, Err(ExecutorError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_sequential_bound_runs_all_branches() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().display().to_string();

        let mut ctx = Context::default();
        step(json!({
            "max_concurrency": 1,
            "substeps": [
                { "type": "write_files", "config": {
                    "root": out,
                    "files": [ { "path": "1.txt", "content": "1" } ]
                } },
                { "type": "write_files", "config": {
                    "root": out,
                    "files": [ { "path": "2.txt", "content": "2" } ]
                } }
            ]
        }))
        .execute(&mut ctx)
        .await
        .unwrap();

        assert!(dir.path().join("1.txt").exists());
        assert!(dir.path().join("2.txt").exists());
    }
}
