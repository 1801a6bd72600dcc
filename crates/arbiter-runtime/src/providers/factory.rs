//! Backend construction behind a factory seam.
//!
//! The slot registry never constructs transports directly; it asks a
//! [`ProviderFactory`] whether a provider's credential is present and,
//! if so, for a backend instance. Tests substitute stub factories so
//! slot fallback can be exercised without credentials or network.

use std::sync::Arc;

use super::{normalize_provider, ChatBackend, ProviderError};

/// Creates chat backends by canonical provider id.
pub trait ProviderFactory: Send + Sync {
    /// Whether the named provider could be built right now
    /// (credential present and transport compiled in).
    fn available(&self, provider: &str) -> bool;

    /// Build a backend for the named provider.
    fn build(&self, provider: &str) -> Result<Arc<dyn ChatBackend>, ProviderError>;
}

/// Default factory: builds the feature-gated transports from
/// environment credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvProviderFactory;

impl EnvProviderFactory {
    /// Environment variable holding the credential for a provider.
    pub fn credential_var(provider: &str) -> Option<&'static str> {
        match normalize_provider(provider).as_str() {
            "openai" => Some("OPENAI_API_KEY"),
            "anthropic" => Some("ANTHROPIC_API_KEY"),
            "github-models" => Some("GITHUB_TOKEN"),
            _ => None,
        }
    }

    fn transport_compiled(provider: &str) -> bool {
        match provider {
            "openai" => cfg!(feature = "openai"),
            "anthropic" => cfg!(feature = "anthropic"),
            "github-models" => cfg!(feature = "github-models"),
            _ => false,
        }
    }
}

impl ProviderFactory for EnvProviderFactory {
    fn available(&self, provider: &str) -> bool {
        let canonical = normalize_provider(provider);
        if !Self::transport_compiled(&canonical) {
            return false;
        }
        Self::credential_var(&canonical)
            .map(super::ApiCredential::is_available)
            .unwrap_or(false)
    }

    fn build(&self, provider: &str) -> Result<Arc<dyn ChatBackend>, ProviderError> {
        let canonical = normalize_provider(provider);
        match canonical.as_str() {
            #[cfg(feature = "openai")]
            "openai" => Ok(Arc::new(super::OpenAiBackend::from_env()?)),

            #[cfg(feature = "anthropic")]
            "anthropic" => Ok(Arc::new(super::AnthropicBackend::from_env()?)),

            #[cfg(feature = "github-models")]
            "github-models" => Ok(Arc::new(super::GithubModelsBackend::from_env()?)),

            other => Err(ProviderError::NotConfigured(format!(
                "Unknown or unavailable provider: '{}'",
                other
            ))),
        }
    }
}
