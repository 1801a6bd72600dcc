//! Chat backend abstractions for arbiter-runtime.
//!
//! This module defines the trait a chat-capable LLM backend implements and
//! the feature-gated transports for OpenAI, Anthropic, and GitHub Models.
//!
//! ## Security
//!
//! All transports use the [`secrets`] module for credential handling. See
//! [`ApiCredential`] for the recommended patterns.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "github-models")]
mod github_models;

pub use factory::{EnvProviderFactory, ProviderFactory};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "openai")]
pub use openai::OpenAiBackend;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicBackend;

#[cfg(feature = "github-models")]
pub use github_models::GithubModelsBackend;

/// Model used when neither the caller nor the environment picks one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default endpoint for the GitHub Models OpenAI-compatible gateway.
/// Overridden by `GITHUB_MODELS_BASE_URL`.
pub const GITHUB_MODELS_DEFAULT_BASE_URL: &str = "https://models.inference.ai.azure.com";

/// Errors from chat backends.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// A single-prompt completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,

    /// User prompt (the full rendered evaluation prompt)
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Run metadata attached to the invocation (repository, run id, ...)
    pub metadata: BTreeMap<String, String>,

    /// Tags attached to the invocation for trace grouping
    pub tags: Vec<String>,
}

impl CompletionRequest {
    /// Build a request with the default temperature and token budget.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.1,
            max_tokens: 4000,
            metadata: BTreeMap::new(),
            tags: Vec::new(),
        }
    }
}

/// Response from a chat completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Model that actually served the request
    pub model: String,

    /// Backend request id, when the transport reports one
    pub request_id: Option<String>,
}

/// A chat-capable LLM backend.
///
/// This is the only place where network calls to model providers are
/// made. Everything above it (invocation client, structured output,
/// review runner) is transport-agnostic.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Execute a single completion.
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;

    /// Canonical provider id ("openai", "anthropic", "github-models").
    fn provider_id(&self) -> &str;
}

/// Canonicalize a provider name, folding known aliases.
///
/// Unrecognized names pass through lowercased so error messages still
/// carry what the user typed.
pub fn normalize_provider(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    match lowered.as_str() {
        "github" | "github_models" | "github-models" => "github-models".to_string(),
        "anthropic" | "claude" => "anthropic".to_string(),
        "openai" => "openai".to_string(),
        _ => lowered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_provider_aliases() {
        assert_eq!(normalize_provider("github"), "github-models");
        assert_eq!(normalize_provider("github_models"), "github-models");
        assert_eq!(normalize_provider("GitHub-Models"), "github-models");
        assert_eq!(normalize_provider("claude"), "anthropic");
        assert_eq!(normalize_provider("Anthropic"), "anthropic");
        assert_eq!(normalize_provider(" openai "), "openai");
    }

    #[test]
    fn test_normalize_provider_passes_unknown_through() {
        assert_eq!(normalize_provider("Mistral"), "mistral");
    }

    #[test]
    fn test_completion_request_defaults() {
        let request = CompletionRequest::new("gpt-4o", "review this");
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.max_tokens, 4000);
        assert!(request.metadata.is_empty());
        assert!(request.tags.is_empty());
    }
}
