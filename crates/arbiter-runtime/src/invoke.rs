//! Invocation client: one backend, one prompt, bounded retries.
//!
//! Wraps a [`BackendHandle`] with a per-attempt timeout and an exponential
//! backoff retry budget. Only transient transport failures are retried;
//! auth and size-limit failures surface immediately so the caller can apply
//! its own fallback policy. Cross-provider fallback is deliberately not
//! handled here.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::error::{is_retryable, LlmError};
use crate::providers::{CompletionRequest, ProviderError};
use crate::registry::BackendHandle;
use crate::trace::TracingConfig;

/// Per-call options layered over the handle's defaults.
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// Operation name for tracing ("evaluate_pr", "repair_structured_output", ...).
    pub operation: String,
    /// Override the handle's per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Override the handle's retry budget.
    pub max_retries: Option<u32>,
}

impl InvokeOptions {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            timeout: None,
            max_retries: None,
        }
    }
}

/// Result of one invocation (including its internal retries).
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub raw_text: String,
    pub provider: String,
    pub model: String,
    pub trace_id: Option<String>,
    pub trace_url: Option<String>,
}

/// Sends prompts through resolved backend handles.
#[derive(Debug, Clone, Default)]
pub struct InvocationClient {
    tracing: TracingConfig,
}

impl InvocationClient {
    pub fn new(tracing: TracingConfig) -> Self {
        Self { tracing }
    }

    /// Invoke `prompt` on `handle`.
    ///
    /// Each attempt runs under `tokio::time::timeout`; a lapse counts as a
    /// transient failure against the retry budget. Retries use exponential
    /// backoff and stop at the first non-retryable error.
    pub async fn invoke(
        &self,
        handle: &BackendHandle,
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<InvocationOutcome, LlmError> {
        let timeout = options.timeout.unwrap_or(handle.timeout);
        let max_retries = options.max_retries.unwrap_or(handle.max_retries);

        let mut request = CompletionRequest::new(&handle.model, prompt);
        if self.tracing.enabled {
            request.metadata = self.tracing.metadata(&options.operation);
            request.tags = self.tracing.tags(&options.operation);
        }

        let backend = &handle.backend;
        let request_ref = &request;
        let attempt = || async move {
            tokio::time::timeout(timeout, backend.complete(request_ref))
                .await
                .map_err(|_| ProviderError::Timeout(timeout))?
        };

        let response = attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(250))
                    .with_max_times(max_retries as usize),
            )
            .when(is_retryable)
            .notify(|err: &ProviderError, delay: Duration| {
                warn!(error = %err, retry_in = ?delay, "invocation attempt failed, retrying");
            })
            .await
            .map_err(|err| LlmError::from_provider(&handle.provider, err))?;

        let trace_id = response.request_id.clone();
        let trace_url = match (&trace_id, self.tracing.enabled) {
            (Some(id), true) => Some(self.tracing.trace_url(id)),
            _ => None,
        };

        Ok(InvocationOutcome {
            raw_text: response.content,
            provider: handle.provider.clone(),
            model: response.model,
            trace_id,
            trace_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatBackend, CompletionResponse};
    use crate::registry::{BackendHandle, DEFAULT_MAX_RETRIES};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyBackend {
        calls: AtomicU32,
        fail_first: u32,
        error: fn() -> ProviderError,
    }

    #[async_trait]
    impl ChatBackend for FlakyBackend {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err((self.error)());
            }
            Ok(CompletionResponse {
                content: "ok".to_string(),
                model: request.model.clone(),
                request_id: Some("trace-1".to_string()),
            })
        }

        fn provider_id(&self) -> &str {
            "openai"
        }
    }

    fn handle(backend: Arc<FlakyBackend>) -> BackendHandle {
        BackendHandle {
            backend,
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let backend = Arc::new(FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: 2,
            error: || ProviderError::HttpError("connection reset".to_string()),
        });
        let client = InvocationClient::default();
        let outcome = client
            .invoke(&handle(backend.clone()), "hi", &InvokeOptions::new("test"))
            .await
            .unwrap();
        assert_eq!(outcome.raw_text, "ok");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let backend = Arc::new(FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: || ProviderError::AuthError,
        });
        let client = InvocationClient::default();
        let err = client
            .invoke(&handle(backend.clone()), "hi", &InvokeOptions::new("test"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Auth { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_surfaces_transient() {
        let backend = Arc::new(FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: || ProviderError::HttpError("connection reset".to_string()),
        });
        let client = InvocationClient::default();
        let mut options = InvokeOptions::new("test");
        options.max_retries = Some(1);
        let err = client
            .invoke(&handle(backend.clone()), "hi", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Transient { .. }));
        // initial attempt + one retry
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_trace_url_derived_when_tracing_enabled() {
        let backend = Arc::new(FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: 0,
            error: || ProviderError::AuthError,
        });
        let mut tracing = TracingConfig::disabled();
        tracing.enabled = true;
        let client = InvocationClient::new(tracing);
        let outcome = client
            .invoke(&handle(backend), "hi", &InvokeOptions::new("test"))
            .await
            .unwrap();
        assert_eq!(outcome.trace_id.as_deref(), Some("trace-1"));
        assert_eq!(
            outcome.trace_url.as_deref(),
            Some("https://smith.langchain.com/public/trace-1/r")
        );
    }

    #[tokio::test]
    async fn test_trace_url_absent_when_tracing_disabled() {
        let backend = Arc::new(FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: 0,
            error: || ProviderError::AuthError,
        });
        let client = InvocationClient::default();
        let outcome = client
            .invoke(&handle(backend), "hi", &InvokeOptions::new("test"))
            .await
            .unwrap();
        assert!(outcome.trace_url.is_none());
    }

    struct SlowBackend;

    #[async_trait]
    impl ChatBackend for SlowBackend {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }

        fn provider_id(&self) -> &str {
            "openai"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_attempt_timeout_counts_as_transient() {
        let handle = BackendHandle {
            backend: Arc::new(SlowBackend),
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(1),
            max_retries: 0,
        };
        let client = InvocationClient::default();
        let err = client
            .invoke(&handle, "hi", &InvokeOptions::new("test"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }
}
