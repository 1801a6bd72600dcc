//! OpenAI chat-completions transport.
//!
//! Also serves as the wire format for any OpenAI-compatible gateway;
//! the GitHub Models transport reuses these request/response structs.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed at the
//! point of setting the `Authorization` header.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    secrets::{ApiCredential, CredentialSource},
    ChatBackend, CompletionRequest, CompletionResponse, ProviderError,
};

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat backend.
pub struct OpenAiBackend {
    credential: ApiCredential,
    base_url: String,
    provider_id: &'static str,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("provider_id", &self.provider_id)
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a backend with an explicit key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "OpenAI API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            provider_id: "openai",
        }
    }

    /// Create from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(OPENAI_API_KEY_ENV, "OpenAI API key")?;
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            provider_id: "openai",
        })
    }

    /// Point the transport at an OpenAI-compatible gateway.
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

/// Chat-completions request format.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionMessage {
    pub role: &'static str,
    pub content: String,
}

/// Chat-completions response format.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
    pub model: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChoice {
    pub message: ChatCompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}

pub(crate) async fn execute_chat_completion(
    client: &reqwest::Client,
    base_url: &str,
    credential: &ApiCredential,
    request: &CompletionRequest,
) -> Result<CompletionResponse, ProviderError> {
    let body = ChatCompletionRequest {
        model: request.model.clone(),
        messages: vec![ChatCompletionMessage {
            role: "user",
            content: request.prompt.clone(),
        }],
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
    };

    // SECURITY: only expose the credential here, at the point of use
    let response = client
        .post(format!("{}/chat/completions", base_url))
        .header("Authorization", format!("Bearer {}", credential.expose()))
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
        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.error.message,
            Err(e) => e.to_string(),
        };
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    let parsed: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        model: parsed.model,
        request_id: parsed.id,
    })
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        execute_chat_completion(self.get_client(), &self.base_url, &self.credential, request).await
    }

    fn provider_id(&self) -> &str {
        self.provider_id
    }
}
