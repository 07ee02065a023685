// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipe execution engine.
//!
//! The executor loads a recipe from any [`RecipeSource`], resolves each
//! descriptor through the step registry, validates its config, and drives
//! the steps in document order against the shared context. It is re-entrant:
//! `execute_recipe`, `conditional`, `loop`, and `parallel` call back into it
//! for their sub-recipes.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::recipe::{Recipe, RecipeSource};
use crate::registry::{self, StepRegistry};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Drives recipes against a context.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<StepRegistry>,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            registry: registry::global(),
        }
    }
}

impl Executor {
    /// Creates an executor over the built-in step registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor over a custom registry.
    pub fn with_registry(registry: Arc<StepRegistry>) -> Self {
        Self { registry }
    }

    /// Loads and runs a recipe. `source` may be a path, JSON text, a parsed
    /// value, or an in-memory descriptor list.
    pub async fn execute(
        &self,
        source: impl Into<RecipeSource>,
        context: &mut Context,
    ) -> Result<()> {
        let recipe = Recipe::load(source.into()).await?;
        self.run(&recipe, context).await
    }

    /// Runs an already-loaded recipe, step by step.
    ///
    /// Any failure aborts the run immediately; mutations already committed
    /// to the context remain visible (no rollback). Cancellation is observed
    /// at step boundaries.
    pub async fn run(&self, recipe: &Recipe, context: &mut Context) -> Result<()> {
        let run_id = Uuid::new_v4();
        debug!(run_id = %run_id, steps = recipe.steps.len(), "Executing recipe");

        for (index, descriptor) in recipe.steps.iter().enumerate() {
            if context.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }

            let factory = self.registry.lookup(&descriptor.step_type)?;
            let step = factory(&descriptor.config)
                .map_err(|e| e.in_step(index, &descriptor.step_type))?;

            debug!(
                run_id = %run_id,
                step = index,
                step_type = %descriptor.step_type,
                "Executing step"
            );

            step.execute(context)
                .await
                .map_err(|e| e.in_step(index, &descriptor.step_type))?;
        }

        debug!(run_id = %run_id, "Recipe completed");
        Ok(())
    }

    /// Validates a recipe without executing it: every descriptor must name a
    /// registered type and satisfy that step's config schema.
    pub fn validate(&self, recipe: &Recipe) -> Result<()> {
        for (index, descriptor) in recipe.steps.iter().enumerate() {
            let factory = self.registry.lookup(&descriptor.step_type)?;
            factory(&descriptor.config).map_err(|e| e.in_step(index, &descriptor.step_type))?;
        }
        Ok(())
    }
}
