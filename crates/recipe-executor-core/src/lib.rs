// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core recipe execution engine.
//!
//! Recipes are JSON documents describing ordered pipelines of steps. The
//! engine holds the shared [`Context`], the step registry, the Liquid-style
//! template renderer, and the [`Executor`] that drives step dispatch. The
//! nine built-in step types cover file I/O, context manipulation,
//! conditionals, bounded-concurrency iteration, sub-recipes, LLM calls, and
//! direct MCP tool invocation.

pub mod condition;
pub mod context;
pub mod error;
pub mod executor;
pub mod filespec;
pub mod recipe;
pub mod registry;
pub mod step;
pub mod steps;
pub mod template;

pub use context::Context;
pub use error::{ExecutorError, Result};
pub use executor::Executor;
pub use filespec::FileSpec;
pub use recipe::{Recipe, RecipeSource, StepDescriptor};
pub use registry::StepRegistry;
pub use step::Step;
pub use template::{render, render_value};
