//! # arbiter-core
//!
//! Deterministic decision logic for arbiter: verdict policy resolution,
//! confidence calibration, the review payload schema, and pure formatting.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same input always produces same output
//! 2. **No LLM calls**: everything here is rule-based; backends live in
//!    `arbiter-runtime`
//! 3. **No hidden state**: every result is fully derivable from its inputs
//! 4. **Total**: terminal failure states still produce well-formed values
//!
//! ## Example
//!
//! ```rust
//! use arbiter_core::{evaluate_verdicts, ProviderVerdict, VerdictPolicy};
//!
//! let verdicts = vec![
//!     ProviderVerdict::new("openai", "gpt-4o", "PASS", 0.9),
//!     ProviderVerdict::new("anthropic", "claude-sonnet-4-5", "CONCERNS", 0.5),
//! ];
//! let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
//! assert_eq!(result.verdict, "CONCERNS");
//! assert!(result.needs_human);
//! ```

pub mod calibrate;
pub mod payload;
pub mod report;
pub mod summary;
pub mod verdict;

// Re-export main types at crate root
pub use calibrate::{calibrate, CalibratedConfidence, DataQuality, QualityContext};
pub use payload::{
    review_validator, ChangeType, ProviderReview, ReviewPayload, ReviewScores, ReviewVerdict,
    REVIEW_SCHEMA_JSON, SCORE_DIMENSIONS,
};
pub use report::format_comparison_report;
pub use summary::{evaluate_summary, extract_provider_verdicts};
pub use verdict::{
    evaluate_verdicts, normalize_confidence, ParsePolicyError, ProviderVerdict, VerdictKind,
    VerdictPolicy, VerdictPolicyResult, CONCERNS_NEEDS_HUMAN_THRESHOLD,
};
