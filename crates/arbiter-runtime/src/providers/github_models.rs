//! GitHub Models transport.
//!
//! GitHub Models exposes an OpenAI-compatible chat-completions gateway
//! authenticated with a `GITHUB_TOKEN`, so this transport reuses the
//! OpenAI wire format and only swaps the endpoint and credential.

use std::time::Duration;

use async_trait::async_trait;

use super::{
    openai::execute_chat_completion,
    secrets::{ApiCredential, CredentialSource},
    ChatBackend, CompletionRequest, CompletionResponse, ProviderError,
    GITHUB_MODELS_DEFAULT_BASE_URL,
};

/// Environment variable name for the GitHub Models token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable overriding the gateway endpoint.
pub const GITHUB_MODELS_BASE_URL_ENV: &str = "GITHUB_MODELS_BASE_URL";

/// GitHub Models chat backend.
pub struct GithubModelsBackend {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for GithubModelsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubModelsBackend")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GithubModelsBackend {
    /// Create a backend with an explicit token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                token,
                CredentialSource::Programmatic,
                "GitHub Models token",
            ),
            base_url: default_base_url(),
        }
    }

    /// Create from `GITHUB_TOKEN`, honoring `GITHUB_MODELS_BASE_URL`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(GITHUB_TOKEN_ENV, "GitHub Models token")?;
        Ok(Self {
            credential,
            base_url: default_base_url(),
        })
    }

    /// Set a custom gateway endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn get_client(&self) -> &reqwest::Client {
        static CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();
        CLIENT.get_or_init(|| {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client")
        })
    }
}

fn default_base_url() -> String {
    std::env::var(GITHUB_MODELS_BASE_URL_ENV)
        .unwrap_or_else(|_| GITHUB_MODELS_DEFAULT_BASE_URL.to_string())
}

#[async_trait]
impl ChatBackend for GithubModelsBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        execute_chat_completion(self.get_client(), &self.base_url, &self.credential, request).await
    }

    fn provider_id(&self) -> &str {
        "github-models"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_identity() {
        let backend = GithubModelsBackend::new("ghp_test");
        assert_eq!(backend.provider_id(), "github-models");
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let secret = "ghp_super_secret_token_12345";
        let backend = GithubModelsBackend::new(secret);

        let debug_output = format!("{:?}", backend);
        assert!(
            !debug_output.contains(secret),
            "Token was exposed in Debug output!"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_base_url_override() {
        let backend = GithubModelsBackend::new("ghp_test")
            .with_base_url("https://models.github.ai/inference");
        assert_eq!(backend.base_url, "https://models.github.ai/inference");
    }
}
