// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step base abstraction.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A unit of work executed against the shared context.
///
/// A step is constructed from its validated configuration and performs all
/// of its effects through context mutations and external I/O. A step may
/// suspend, but must not spawn background work that outlives `execute`.
#[async_trait]
pub trait Step: Send + Sync {
    /// Runs the step against the context.
    async fn execute(&self, context: &mut Context) -> Result<()>;
}

/// Constructor registered per step type: validates the raw config object and
/// builds the step.
pub type StepFactory = fn(&Map<String, Value>) -> Result<Box<dyn Step>>;

/// Deserializes a step's typed config struct from the raw descriptor config.
pub(crate) fn parse_config<T: DeserializeOwned>(
    step_type: &str,
    config: &Map<String, Value>,
) -> Result<T> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| ExecutorError::Config(format!("{step_type}: {e}")))
}
