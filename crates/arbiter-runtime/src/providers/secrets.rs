//! Secure credential handling for chat backends.
//!
//! All transports load their API keys through this module, which ensures:
//!
//! - **No accidental logging**: credentials cannot appear in Debug/Display output
//! - **Memory safety**: credentials are zeroed on drop via `secrecy`
//! - **Consistent patterns**: every provider resolves keys the same way

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use super::ProviderError;

/// Where a credential was loaded from. Useful for debugging
/// configuration issues without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// Debug and Display show `[REDACTED]`; the raw value is only reachable
/// through [`ApiCredential::expose`], which call sites use at the point
/// of setting an HTTP header and nowhere else.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value. After this point it cannot be logged.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from an environment variable.
    ///
    /// `name` is the human-readable label for error messages
    /// (e.g. "OpenAI API key").
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Check whether an environment credential is present without loading it.
    pub fn is_available(env_var: &str) -> bool {
        std::env::var(env_var).map(|v| !v.is_empty()).unwrap_or(false)
    }

    /// Expose the credential for use in an API call.
    ///
    /// Only call this at the point where the credential is actually
    /// needed. Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Whether the stored value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    /// Source of this credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Human-readable name of this credential.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
