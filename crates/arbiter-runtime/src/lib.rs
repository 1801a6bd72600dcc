//! # arbiter-runtime
//!
//! Async LLM layer for arbiter: slot-ordered backend registry, invocation
//! client with bounded retries, structured output validation with one
//! repair round-trip, and the review runner that ties them together.
//!
//! Deterministic decision logic (verdict policies, calibration, report
//! formatting) lives in `arbiter-core`; this crate owns everything that
//! touches the network or the environment.
//!
//! Concrete transports are feature-gated: `openai`, `anthropic`,
//! `github-models` (implies `openai`), or `all-providers`.

pub mod error;
pub mod invoke;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod review;
pub mod structured;
pub mod trace;

pub use error::{classify_error, is_retryable, ErrorClass, LlmError};
pub use invoke::{InvocationClient, InvocationOutcome, InvokeOptions};
pub use providers::{
    normalize_provider, ChatBackend, CompletionRequest, CompletionResponse, EnvProviderFactory,
    ProviderError, ProviderFactory, DEFAULT_MODEL,
};
pub use registry::{
    default_slots, BackendHandle, BackendRegistry, BackendSelector, Slot, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT,
};
pub use review::{
    classify_change_type, extract_pr_metadata, fallback_review, prepare_prompt, ReviewOptions,
    ReviewRunner,
};
pub use structured::{
    parse_structured, BackendRepair, ErrorStage, OutputRepair, StructuredOutcome,
};
pub use trace::TracingConfig;
