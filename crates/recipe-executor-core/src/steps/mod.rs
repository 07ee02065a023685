// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in step implementations.

pub mod conditional;
pub mod execute_recipe;
pub mod llm_generate;
pub mod loop_step;
pub mod mcp_step;
pub mod parallel;
pub mod read_files;
pub mod set_context;
pub mod write_files;
