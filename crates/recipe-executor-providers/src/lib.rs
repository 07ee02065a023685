// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider-agnostic LLM facade for the recipe executor.
//!
//! The [`generate`] entry point takes a rendered prompt, a
//! `provider/name[/deployment]` model identifier, optional MCP tool servers,
//! and a declared output shape; it resolves a provider from run config,
//! drives the tool-use conversation, and validates structured responses
//! against the declared schema.

mod anthropic;
mod azure;
mod facade;
mod model;
mod openai;
mod structured;
mod traits;

pub use anthropic::AnthropicProvider;
pub use azure::AzureOpenAiProvider;
pub use facade::{
    generate, resolve_provider, ConfigMap, FacadeError, GenerateOutput, GenerateRequest,
    OutputSpec,
};
pub use model::{ModelId, ProviderKind};
pub use openai::OpenAiProvider;
pub use traits::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ProviderError, Role, ToolCall,
    ToolDef,
};
