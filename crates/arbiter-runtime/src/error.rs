//! Error taxonomy for LLM invocation and structured-output handling.
//!
//! Transport failures surface as [`crate::providers::ProviderError`]; this
//! module classifies them into the coarse buckets the review runner routes
//! on (authentication vs. size-limit vs. transient) and defines the
//! top-level [`LlmError`] returned by invocation and parsing.

use std::time::Duration;

use thiserror::Error;

use crate::providers::ProviderError;

/// Coarse failure class used to pick a fallback strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Credentials rejected or missing; switching model on the same
    /// backend will not help.
    Auth,
    /// Request body exceeded the backend's token/size limit; a retry on
    /// the same backend with a smaller model can succeed.
    SizeLimit,
    /// Anything else. Assumed transient.
    Transient,
}

const AUTH_MARKERS: [&str; 6] = [
    "401",
    "unauthorized",
    "forbidden",
    "403",
    "permission",
    "authentication",
];

/// Classify a provider failure from its structure, falling back to
/// message sniffing for transports that only expose text.
pub fn classify_error(error: &ProviderError) -> ErrorClass {
    match error {
        ProviderError::AuthError => ErrorClass::Auth,
        ProviderError::NotConfigured(_) => ErrorClass::Auth,
        ProviderError::ApiError { status, message } => {
            if matches!(status, 401 | 403) {
                return ErrorClass::Auth;
            }
            if *status == 413 {
                return ErrorClass::SizeLimit;
            }
            classify_message(message)
        }
        other => classify_message(&other.to_string()),
    }
}

fn classify_message(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    if AUTH_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return ErrorClass::Auth;
    }
    let has_413 = lowered.contains("413")
        && (lowered.contains("error code") || lowered.contains("status code"));
    if has_413
        && (lowered.contains("tokens_limit_reached") || lowered.contains("request body too large"))
    {
        return ErrorClass::SizeLimit;
    }
    ErrorClass::Transient
}

/// Whether a failure is worth retrying on the same backend.
///
/// Auth and configuration failures are permanent for the process
/// lifetime; everything else (timeouts, 5xx, rate limits, connection
/// resets) may clear on a later attempt.
pub fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::AuthError | ProviderError::NotConfigured(_) => false,
        ProviderError::ApiError { status, .. } => !matches!(status, 400..=499) || *status == 429,
        ProviderError::ParseError(_) => false,
        ProviderError::HttpError(_)
        | ProviderError::RateLimited { .. }
        | ProviderError::Timeout(_) => true,
    }
}

/// Errors surfaced by the invocation client and structured-output layer.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("no credential available for provider '{provider}': set {env_var}")]
    CredentialUnavailable { provider: String, env_var: String },

    #[error("authentication failed for provider '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    #[error("request exceeded size limit on provider '{provider}': {detail}")]
    SizeLimit { provider: String, detail: String },

    #[error("invocation failed on provider '{provider}': {detail}")]
    Transient { provider: String, detail: String },

    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("structured output invalid at stage '{stage}' after {attempts} repair attempt(s): {detail}")]
    Validation {
        stage: &'static str,
        attempts: u32,
        detail: String,
    },

    #[error("structured output repair unavailable at stage '{stage}': {detail}")]
    RepairUnavailable { stage: &'static str, detail: String },
}

impl LlmError {
    /// Fold a transport failure into the invocation taxonomy.
    pub fn from_provider(provider: &str, error: ProviderError) -> Self {
        match classify_error(&error) {
            ErrorClass::Auth => LlmError::Auth {
                provider: provider.to_string(),
                detail: error.to_string(),
            },
            ErrorClass::SizeLimit => LlmError::SizeLimit {
                provider: provider.to_string(),
                detail: error.to_string(),
            },
            ErrorClass::Transient => match error {
                ProviderError::Timeout(elapsed) => LlmError::Timeout(elapsed),
                other => LlmError::Transient {
                    provider: provider.to_string(),
                    detail: other.to_string(),
                },
            },
        }
    }

    /// Classification of this error for fallback routing.
    pub fn class(&self) -> ErrorClass {
        match self {
            LlmError::CredentialUnavailable { .. } | LlmError::Auth { .. } => ErrorClass::Auth,
            LlmError::SizeLimit { .. } => ErrorClass::SizeLimit,
            _ => ErrorClass::Transient,
        }
    }
}
