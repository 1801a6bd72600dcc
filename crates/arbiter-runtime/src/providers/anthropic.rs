//! Anthropic messages-API transport.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed at the
//! point of setting the `x-api-key` header.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    secrets::{ApiCredential, CredentialSource},
    ChatBackend, CompletionRequest, CompletionResponse, ProviderError,
};

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic chat backend.
pub struct AnthropicBackend {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicBackend {
    /// Create a backend with an explicit key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Anthropic API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Set a custom base URL.
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

/// Messages-API request format.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<MessagesMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct MessagesMessage {
    role: &'static str,
    content: String,
}

/// Messages-API response format.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)] // Required for deserialization, not read directly
    type_: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesError {
    error: MessagesErrorDetail,
}

#[derive(Debug, Deserialize)]
struct MessagesErrorDetail {
    message: String,
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![MessagesMessage {
                role: "user",
                content: request.prompt.clone(),
            }],
            temperature: Some(request.temperature),
        };

        // SECURITY: only expose the credential here, at the point of use
        let response = self
            .get_client()
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if matches!(status.as_u16(), 401 | 403) {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = match response.json::<MessagesError>().await {
                Ok(body) => body.error.message,
                Err(e) => e.to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            model: parsed.model,
            request_id: parsed.id,
        })
    }

    fn provider_id(&self) -> &str {
        "anthropic"
    }
}
