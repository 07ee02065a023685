// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Azure OpenAI provider implementation.
//!
//! Shares the OpenAI wire format but addresses a named deployment under the
//! resource base URL and authenticates with the `api-key` header.

use crate::openai::{
    message_from_wire, parse_openai_error, to_wire_messages, to_wire_tools, ChatCompletionRequest,
    ChatCompletionResponse, ResponseFormat,
};
use crate::traits::{CompletionRequest, CompletionResponse, LlmProvider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI provider.
#[derive(Debug)]
pub struct AzureOpenAiProvider {
    /// HTTP client.
    client: Client,
    /// API key (`api-key` header).
    api_key: String,
    /// Resource base URL, e.g. `https://my-resource.openai.azure.com`.
    base_url: String,
    /// API version query parameter.
    api_version: String,
    /// Deployment name addressed in the URL path.
    deployment: String,
}

impl AzureOpenAiProvider {
    /// Creates a new Azure OpenAI provider.
    pub fn new(
        api_key: String,
        base_url: String,
        deployment: String,
        api_version: Option<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            deployment,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.base_url, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let azure_request = ChatCompletionRequest {
            model: request.model.clone(),
            messages: to_wire_messages(&request.messages),
            max_tokens: request.max_tokens,
            tools: to_wire_tools(&request.tools),
            response_format: request.json_output.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&azure_request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Failed to read response body"));

        if !status.is_success() {
            return Err(parse_openai_error(status, &body));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ProviderSpecific("response contained no choices".to_string()))?;

        Ok(CompletionResponse {
            message: message_from_wire(choice.message),
            model: completion.model,
            tokens_used: completion.usage.map(|usage| usage.total_tokens),
        })
    }

    fn name(&self) -> &str {
        "azure"
    }
}
