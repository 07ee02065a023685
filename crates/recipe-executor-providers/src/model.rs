// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model identifier grammar: `provider/name[/deployment]`.

use crate::traits::ProviderError;
use std::fmt;
use std::str::FromStr;

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI chat completions.
    OpenAi,
    /// OpenAI responses surface (served through the chat client).
    OpenAiResponses,
    /// Azure OpenAI deployments.
    Azure,
    /// Azure OpenAI responses surface (served through the chat client).
    AzureResponses,
    /// Anthropic messages API.
    Anthropic,
    /// Local Ollama instance (OpenAI-compatible endpoint).
    Ollama,
    /// Google Gemini (OpenAI-compatible endpoint).
    Gemini,
}

impl ProviderKind {
    /// The identifier used in model strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenAiResponses => "openai_responses",
            Self::Azure => "azure",
            Self::AzureResponses => "azure_responses",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "openai_responses" => Ok(Self::OpenAiResponses),
            "azure" => Ok(Self::Azure),
            "azure_responses" => Ok(Self::AzureResponses),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            other => Err(ProviderError::InvalidRequest(format!(
                "unknown provider '{other}'"
            ))),
        }
    }
}

/// A parsed model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    /// Provider family.
    pub provider: ProviderKind,

    /// Provider-local model name.
    pub name: String,

    /// Optional deployment (Azure); defaults to `name` when omitted.
    pub deployment: Option<String>,
}

impl ModelId {
    /// The Azure deployment to target: the explicit deployment or the model name.
    pub fn deployment_or_name(&self) -> &str {
        self.deployment.as_deref().unwrap_or(&self.name)
    }
}

impl FromStr for ModelId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let provider = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ProviderError::InvalidRequest(format!("invalid model id '{s}'")))?
            .parse::<ProviderKind>()?;
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "model id '{s}' is missing a model name (expected provider/name)"
                ))
            })?
            .to_string();
        let deployment = parts.next().filter(|d| !d.is_empty()).map(String::from);

        Ok(Self {
            provider,
            name,
            deployment,
        })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider.as_str(), self.name)?;
        if let Some(deployment) = &self.deployment {
            write!(f, "/{deployment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_and_name() {
        let id: ModelId = "openai/gpt-4o".parse().unwrap();
        assert_eq!(id.provider, ProviderKind::OpenAi);
        assert_eq!(id.name, "gpt-4o");
        assert!(id.deployment.is_none());
    }

    #[test]
    fn test_parse_with_deployment() {
        let id: ModelId = "azure/gpt-4o/prod-gpt4o".parse().unwrap();
        assert_eq!(id.provider, ProviderKind::Azure);
        assert_eq!(id.name, "gpt-4o");
        assert_eq!(id.deployment.as_deref(), Some("prod-gpt4o"));
        assert_eq!(id.deployment_or_name(), "prod-gpt4o");
    }

    #[test]
    fn test_azure_deployment_defaults_to_name() {
        let id: ModelId = "azure/gpt-4o".parse().unwrap();
        assert_eq!(id.deployment_or_name(), "gpt-4o");
    }

    #[test]
    fn test_all_providers_parse() {
        for provider in [
            "openai",
            "azure",
            "anthropic",
            "ollama",
            "gemini",
            "openai_responses",
            "azure_responses",
        ] {
            let id: ModelId = format!("{provider}/m").parse().unwrap();
            assert_eq!(id.provider.as_str(), provider);
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!("mistral/large".parse::<ModelId>().is_err());
    }

    #[test]
    fn test_missing_name_rejected() {
        assert!("openai".parse::<ModelId>().is_err());
        assert!("openai/".parse::<ModelId>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["openai/gpt-4o", "azure/gpt-4o/prod"] {
            let id: ModelId = s.parse().unwrap();
            assert_eq!(id.to_string(), s);
        }
    }

    #[test]
    fn test_model_name_may_contain_dots_and_colons() {
        let id: ModelId = "ollama/llama3.2:1b".parse().unwrap();
        assert_eq!(id.name, "llama3.2:1b");
    }
}
