// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step registry: type name to constructor.

use crate::error::{ExecutorError, Result};
use crate::step::StepFactory;
use crate::steps;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from step type name to step constructor.
///
/// The built-in registry is initialized once per process at startup; there
/// is no runtime mutation after that.
#[derive(Default)]
pub struct StepRegistry {
    entries: HashMap<String, StepFactory>,
}

impl StepRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in step types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins: &[(&str, StepFactory)] = &[
            ("read_files", steps::read_files::ReadFilesStep::from_config),
            ("write_files", steps::write_files::WriteFilesStep::from_config),
            ("set_context", steps::set_context::SetContextStep::from_config),
            ("conditional", steps::conditional::ConditionalStep::from_config),
            ("loop", steps::loop_step::LoopStep::from_config),
            ("parallel", steps::parallel::ParallelStep::from_config),
            (
                "execute_recipe",
                steps::execute_recipe::ExecuteRecipeStep::from_config,
            ),
            (
                "llm_generate",
                steps::llm_generate::LlmGenerateStep::from_config,
            ),
            ("mcp", steps::mcp_step::McpStep::from_config),
        ];
        for (step_type, factory) in builtins {
            registry
                .register(step_type, *factory)
                .expect("duplicate builtin step type");
        }
        registry
    }

    /// Registers a step type; duplicate registration fails.
    pub fn register(&mut self, step_type: &str, factory: StepFactory) -> Result<()> {
        if self.entries.contains_key(step_type) {
            return Err(ExecutorError::Config(format!(
                "step type '{step_type}' is already registered"
            )));
        }
        self.entries.insert(step_type.to_string(), factory);
        Ok(())
    }

    /// Looks up the constructor for a step type.
    pub fn lookup(&self, step_type: &str) -> Result<StepFactory> {
        self.entries
            .get(step_type)
            .copied()
            .ok_or_else(|| ExecutorError::UnknownStepType(step_type.to_string()))
    }

    /// Membership test.
    pub fn contains(&self, step_type: &str) -> bool {
        self.entries.contains_key(step_type)
    }

    /// Registered type names, sorted.
    pub fn step_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// The process-wide registry of built-in steps.
pub fn global() -> Arc<StepRegistry> {
    static REGISTRY: Lazy<Arc<StepRegistry>> = Lazy::new(|| Arc::new(StepRegistry::builtin()));
    REGISTRY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_vocabulary() {
        let registry = StepRegistry::builtin();
        assert_eq!(
            registry.step_types(),
            vec![
                "conditional",
                "execute_recipe",
                "llm_generate",
                "loop",
                "mcp",
                "parallel",
                "read_files",
                "set_context",
                "write_files",
            ]
        );
    }

    #[test]
    fn test_unknown_type_carries_the_name() {
        let registry = StepRegistry::builtin();
        match registry.lookup("teleport") {
            Err(ExecutorError::UnknownStepType(name)) => assert_eq!(name, "teleport"),
            other => panic!("Expected UnknownStepType, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = StepRegistry::builtin();
        let err = registry
            .register("loop", steps::loop_step::LoopStep::from_config)
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }
}
