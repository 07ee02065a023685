// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared per-run state.
//!
//! A [`Context`] carries the artifact map steps read and write, a read-only
//! config map seeded by the runner, and the run's cancellation token. The
//! Context is single-owner: concurrent branches operate on clones, which are
//! deep and independent.

use crate::error::{ExecutorError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// The shared mutable state carried through a recipe run.
#[derive(Debug, Default)]
pub struct Context {
    artifacts: BTreeMap<String, Value>,
    config: BTreeMap<String, Value>,
    cancel: CancellationToken,
}

impl Clone for Context {
    /// Deep copy of both maps. The clone observes the parent's cancellation
    /// (it receives a child token) but cancelling the clone never cancels
    /// the parent.
    fn clone(&self) -> Self {
        Self {
            artifacts: self.artifacts.clone(),
            config: self.config.clone(),
            cancel: self.cancel.child_token(),
        }
    }
}

impl Context {
    /// Creates a context with the given artifacts and config.
    pub fn new(artifacts: BTreeMap<String, Value>, config: BTreeMap<String, Value>) -> Self {
        Self {
            artifacts,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Reads an artifact, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.artifacts.get(key)
    }

    /// Reads an artifact, failing with `UnknownKey` when absent.
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.artifacts
            .get(key)
            .ok_or_else(|| ExecutorError::UnknownKey(key.to_string()))
    }

    /// Reads an artifact, returning `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.artifacts.get(key).cloned().unwrap_or(default)
    }

    /// Inserts or overwrites an artifact.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.artifacts.insert(key.into(), value);
    }

    /// Deletes an artifact; silent if absent.
    pub fn remove(&mut self, key: &str) {
        self.artifacts.remove(key);
    }

    /// Membership test.
    pub fn has(&self, key: &str) -> bool {
        self.artifacts.contains_key(key)
    }

    /// Snapshot of the artifact keys, safe to iterate during mutation.
    pub fn keys(&self) -> Vec<String> {
        self.artifacts.keys().cloned().collect()
    }

    /// Number of artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// True when no artifacts are present.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// The artifact map.
    pub fn artifacts(&self) -> &BTreeMap<String, Value> {
        &self.artifacts
    }

    /// The read-only config map.
    pub fn config(&self) -> &BTreeMap<String, Value> {
        &self.config
    }

    /// A serializable snapshot of the artifacts, for diagnostics.
    pub fn dump(&self) -> Value {
        Value::Object(
            self.artifacts
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Resolves a dotted path (`key.sub.0`) through the artifacts.
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.artifacts.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// The run's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True when the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Replaces the cancellation token (used by branching steps to give
    /// clones a shared branch token).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}
