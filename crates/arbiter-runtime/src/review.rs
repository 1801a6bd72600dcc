//! Review runner: resolve, invoke, parse, fall back.
//!
//! This is the caller-level orchestration the invocation client stays out
//! of: cross-provider retry on auth failures, primary-backend substitution
//! on size limits, change-type-aware prompt selection, and the
//! deterministic fallback review when no backend can run at all. Every
//! path ends in a well-formed [`ProviderReview`].

use std::collections::BTreeSet;

use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use arbiter_core::{ChangeType, ProviderReview, ReviewPayload, ReviewVerdict};
use arbiter_core::payload::{review_validator, REVIEW_SCHEMA_JSON};

use crate::error::ErrorClass;
use crate::invoke::{InvocationClient, InvokeOptions};
use crate::prompts::{
    ensure_rubric, render_chain_depth_addendum, render_evaluation_prompt, INFRA_PROMPT_ADDENDUM,
    PR_EVALUATION_PROMPT, PR_EVALUATION_PROMPT_INFRA,
};
use crate::registry::{BackendHandle, BackendRegistry, BackendSelector};
use crate::structured::{parse_structured, BackendRepair, ErrorStage};
use crate::trace::TracingConfig;

/// File path prefixes/suffixes considered infrastructure rather than
/// application code.
pub const INFRA_PATH_PATTERNS: [&str; 19] = [
    ".github/",
    "scripts/",
    "docs/",
    "templates/",
    ".eslintrc",
    ".prettierrc",
    "pyproject.toml",
    "setup.cfg",
    "setup.py",
    "Makefile",
    "Dockerfile",
    "docker-compose",
    ".gitignore",
    ".pre-commit-config",
    "requirements",
    "CLAUDE.md",
    "README.md",
    "CHANGELOG.md",
    "LICENSE",
];

/// Fraction of changed files that must be infrastructure to trigger the
/// relaxed prompt.
pub const INFRA_THRESHOLD: f64 = 0.6;

lazy_static! {
    static ref PR_LINK_RE: Regex = Regex::new(r"\[#(\d+)\]\(([^)]+)\)").expect("valid regex");
    static ref PR_NUMBER_RE: Regex = Regex::new(r"#(\d+)").expect("valid regex");
}

/// Classify a change by scanning unified-diff headers for file paths.
///
/// `infrastructure` when at least [`INFRA_THRESHOLD`] of the changed files
/// match an infrastructure pattern, `application` when at most the
/// complement does, `mixed` otherwise. A missing or empty diff defaults
/// to `application`.
pub fn classify_change_type(diff: Option<&str>) -> ChangeType {
    let Some(diff) = diff.map(str::trim).filter(|d| !d.is_empty()) else {
        return ChangeType::Application;
    };

    let mut paths: BTreeSet<&str> = BTreeSet::new();
    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(first) = rest.split_whitespace().next() {
                paths.insert(first.strip_prefix("a/").unwrap_or(first));
            }
        } else if let Some(path) = line
            .strip_prefix("+++ b/")
            .or_else(|| line.strip_prefix("--- a/"))
        {
            if !path.is_empty() && path != "/dev/null" {
                paths.insert(path);
            }
        }
    }

    if paths.is_empty() {
        return ChangeType::Application;
    }

    let infra_count = paths
        .iter()
        .filter(|path| {
            INFRA_PATH_PATTERNS
                .iter()
                .any(|pattern| path.starts_with(pattern) || path.ends_with(pattern))
        })
        .count();
    let ratio = infra_count as f64 / paths.len() as f64;
    debug!(
        infra = infra_count,
        total = paths.len(),
        ratio = format!("{:.0}%", ratio * 100.0),
        "change-type classification"
    );

    if ratio >= INFRA_THRESHOLD {
        ChangeType::Infrastructure
    } else if ratio <= 1.0 - INFRA_THRESHOLD {
        ChangeType::Application
    } else {
        ChangeType::Mixed
    }
}

/// Extract `(pr_number, pr_url)` from a `Pull request: [#N](url)` context
/// line, falling back to a bare `#N` reference on the same line.
pub fn extract_pr_metadata(context: &str) -> (Option<u64>, Option<String>) {
    for line in context.lines() {
        if !line.contains("Pull request:") {
            continue;
        }
        if let Some(caps) = PR_LINK_RE.captures(line) {
            let number = caps[1].parse().ok();
            return (number, Some(caps[2].to_string()));
        }
        if let Some(caps) = PR_NUMBER_RE.captures(line) {
            return (caps[1].parse().ok(), None);
        }
    }
    (None, None)
}

fn chain_depth() -> u32 {
    std::env::var("CHAIN_DEPTH")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(|depth| depth.max(0) as u32)
        .unwrap_or(0)
}

/// Build the full evaluation prompt for one artifact.
///
/// Infrastructure-dominant changes use the relaxed rubric (or, with a
/// custom prompt, the lighter addendum); follow-up iterations carry the
/// chain-depth guidance.
pub fn prepare_prompt(context: &str, diff: Option<&str>, custom_prompt: Option<&str>) -> String {
    let change_type = classify_change_type(diff);

    let mut template = match (custom_prompt, change_type) {
        (Some(custom), ChangeType::Infrastructure) => {
            info!("infrastructure change detected; appending infra guidance to custom prompt");
            format!(
                "{}\n\n{}",
                ensure_rubric(custom).trim_end(),
                INFRA_PROMPT_ADDENDUM
            )
        }
        (Some(custom), _) => ensure_rubric(custom),
        (None, ChangeType::Infrastructure) => {
            info!("using infrastructure-relaxed evaluation prompt");
            ensure_rubric(PR_EVALUATION_PROMPT_INFRA)
        }
        (None, _) => ensure_rubric(PR_EVALUATION_PROMPT),
    };

    let depth = chain_depth();
    if depth > 0 {
        info!(depth, "follow-up chain detected; appending depth-aware guidance");
        template = format!(
            "{}\n\n{}",
            template.trim_end(),
            render_chain_depth_addendum(depth)
        );
    }

    render_evaluation_prompt(&template, context, diff)
}

/// Deterministic review produced when no backend could run.
pub fn fallback_review(message: impl Into<String>) -> ProviderReview {
    ProviderReview {
        verdict: ReviewVerdict::Concerns,
        scores: None,
        confidence: None,
        concerns: vec!["LLM evaluation could not run.".to_string()],
        summary: Some(
            "Review the PR manually or re-run once LLM credentials are available.".to_string(),
        ),
        provider: None,
        model: None,
        used_llm: false,
        raw_content: None,
        error: Some(message.into()),
        change_type: None,
    }
}

/// Per-evaluation options.
#[derive(Debug, Clone, Default)]
pub struct ReviewOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub custom_prompt: Option<String>,
}

/// Orchestrates evaluation of one artifact across the registry.
pub struct ReviewRunner {
    registry: BackendRegistry,
    tracing: TracingConfig,
}

impl ReviewRunner {
    pub fn new(registry: BackendRegistry, tracing: TracingConfig) -> Self {
        Self { registry, tracing }
    }

    fn client_for(&self, pr_number: Option<u64>) -> InvocationClient {
        let mut tracing = self.tracing.clone();
        if let Some(number) = pr_number {
            tracing.issue_or_pr = number.to_string();
        }
        InvocationClient::new(tracing)
    }

    fn selector(&self, opts: &ReviewOptions) -> BackendSelector {
        BackendSelector {
            provider: opts.provider.clone(),
            model: opts.model.clone(),
            force_primary: false,
        }
    }

    /// Alternate handle for auth fallback: `force_primary` when the
    /// failure was off-primary, otherwise the next distinct credentialed
    /// provider in slot order.
    fn fallback_handle(&self, failed: &BackendHandle, opts: &ReviewOptions) -> Option<BackendHandle> {
        let primary = self
            .registry
            .resolve(&BackendSelector::primary())
            .ok();
        if let Some(primary) = primary {
            if primary.provider != failed.provider {
                return Some(primary);
            }
        }
        self.registry
            .resolve_many(2, &self.selector(opts), None)
            .into_iter()
            .find(|handle| handle.provider != failed.provider)
    }

    async fn parse_review(
        &self,
        client: &InvocationClient,
        handle: &BackendHandle,
        content: &str,
    ) -> ProviderReview {
        let repair = BackendRepair::new(client.clone(), handle.clone());
        let outcome = parse_structured::<ReviewPayload>(
            content,
            REVIEW_SCHEMA_JSON,
            review_validator(),
            Some(&repair),
            1,
        )
        .await;

        match outcome.payload {
            Some(payload) => ProviderReview::from_payload(
                payload,
                handle.provider.clone(),
                handle.model.clone(),
                outcome.raw_content.or_else(|| Some(content.to_string())),
            ),
            None => {
                let detail = outcome.error_detail.unwrap_or_default();
                let error = if outcome.error_stage == ErrorStage::RepairValidation {
                    format!("Failed to parse JSON response after repair: {}", detail)
                } else {
                    format!("Failed to parse JSON response: {}", detail)
                };
                ProviderReview {
                    verdict: ReviewVerdict::Concerns,
                    scores: None,
                    confidence: None,
                    concerns: vec![],
                    summary: None,
                    provider: Some(handle.provider.clone()),
                    model: Some(handle.model.clone()),
                    used_llm: true,
                    raw_content: Some(content.to_string()),
                    error: Some(error),
                    change_type: None,
                }
            }
        }
    }

    /// Evaluate one artifact, applying the auth and size-limit fallback
    /// policies before settling for the deterministic fallback review.
    pub async fn evaluate(
        &self,
        context: &str,
        diff: Option<&str>,
        opts: &ReviewOptions,
    ) -> ProviderReview {
        let change_type = classify_change_type(diff);
        let with_change_type = |mut review: ProviderReview| {
            review.change_type = Some(change_type);
            review
        };

        let handle = match self.registry.resolve(&self.selector(opts)) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "no backend available for review");
                return with_change_type(fallback_review(
                    "LLM client unavailable (missing credentials or dependency).",
                ));
            }
        };

        let prompt = prepare_prompt(context, diff, opts.custom_prompt.as_deref());
        let (pr_number, _) = extract_pr_metadata(context);
        let client = self.client_for(pr_number);

        let first_error = match client
            .invoke(&handle, &prompt, &InvokeOptions::new("evaluate_pr"))
            .await
        {
            Ok(outcome) => {
                return with_change_type(
                    self.parse_review(&client, &handle, &outcome.raw_text).await,
                );
            }
            Err(err) => err,
        };

        match first_error.class() {
            ErrorClass::Auth if opts.provider.is_none() => {
                let Some(fallback) = self.fallback_handle(&handle, opts) else {
                    return with_change_type(fallback_review(format!(
                        "LLM invocation failed: {}",
                        first_error
                    )));
                };
                warn!(
                    failed = %handle.label(),
                    fallback = %fallback.label(),
                    "auth failure, retrying on fallback provider"
                );
                match client
                    .invoke(&fallback, &prompt, &InvokeOptions::new("evaluate_pr_fallback"))
                    .await
                {
                    Ok(outcome) => {
                        let mut review =
                            self.parse_review(&client, &fallback, &outcome.raw_text).await;
                        if review.summary.is_some() {
                            review.error = Some(format!(
                                "Primary provider ({}) failed, used fallback",
                                handle.provider
                            ));
                        }
                        with_change_type(review)
                    }
                    Err(fallback_error) => with_change_type(fallback_review(format!(
                        "Primary ({}): {}; Fallback ({}): {}",
                        handle.provider, first_error, fallback.provider, fallback_error
                    ))),
                }
            }
            ErrorClass::SizeLimit => {
                let primary = self.registry.resolve(&BackendSelector::primary()).ok();
                let Some(primary) = primary.filter(|p| p.provider != handle.provider) else {
                    return with_change_type(fallback_review(format!(
                        "LLM invocation failed: {}",
                        first_error
                    )));
                };
                warn!(
                    failed = %handle.label(),
                    primary = %primary.label(),
                    "size limit hit, retrying on primary backend"
                );
                match client
                    .invoke(&primary, &prompt, &InvokeOptions::new("evaluate_pr"))
                    .await
                {
                    Ok(outcome) => with_change_type(
                        self.parse_review(&client, &primary, &outcome.raw_text).await,
                    ),
                    Err(retry_error) => with_change_type(fallback_review(format!(
                        "Primary ({}): {}; Fallback ({}): {}",
                        handle.provider, first_error, primary.provider, retry_error
                    ))),
                }
            }
            _ => with_change_type(fallback_review(format!(
                "LLM invocation failed: {}",
                first_error
            ))),
        }
    }

    /// Evaluate the same artifact on up to two distinct backends
    /// concurrently, for the comparison report.
    pub async fn compare(
        &self,
        context: &str,
        diff: Option<&str>,
        opts: &ReviewOptions,
        alternate_model: Option<&str>,
    ) -> Vec<ProviderReview> {
        let change_type = classify_change_type(diff);
        let handles = self
            .registry
            .resolve_many(2, &self.selector(opts), alternate_model);
        if handles.is_empty() {
            let mut review =
                fallback_review("LLM client unavailable (missing credentials or dependency).");
            review.change_type = Some(change_type);
            return vec![review];
        }

        let prompt = prepare_prompt(context, diff, opts.custom_prompt.as_deref());
        let (pr_number, _) = extract_pr_metadata(context);
        let client = self.client_for(pr_number);

        let evaluations = handles.iter().map(|handle| {
            let client = &client;
            let prompt = &prompt;
            async move {
                match client
                    .invoke(handle, prompt, &InvokeOptions::new("evaluate_pr_compare"))
                    .await
                {
                    Ok(outcome) => self.parse_review(client, handle, &outcome.raw_text).await,
                    Err(err) => {
                        let mut review =
                            fallback_review(format!("LLM invocation failed: {}", err));
                        review.provider = Some(handle.provider.clone());
                        review.model = Some(handle.model.clone());
                        review
                    }
                }
            }
        });

        join_all(evaluations)
            .await
            .into_iter()
            .map(|mut review| {
                review.change_type = Some(change_type);
                review
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        ChatBackend, CompletionRequest, CompletionResponse, ProviderError, ProviderFactory,
    };
    use crate::registry::{default_slots, BackendRegistry};
    use async_trait::async_trait;
    use std::sync::Arc;

    const VALID_REVIEW: &str = r#"{"verdict": "PASS", "confidence": 0.9, "summary": "fine"}"#;

    struct ScriptedBackend {
        id: String,
        response: Result<&'static str, fn() -> ProviderError>,
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            match self.response {
                Ok(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    model: request.model.clone(),
                    request_id: None,
                }),
                Err(make) => Err(make()),
            }
        }

        fn provider_id(&self) -> &str {
            &self.id
        }
    }

    struct ScriptedFactory {
        scripts: Vec<(&'static str, Result<&'static str, fn() -> ProviderError>)>,
    }

    impl ProviderFactory for ScriptedFactory {
        fn available(&self, provider: &str) -> bool {
            self.scripts.iter().any(|(id, _)| *id == provider)
        }

        fn build(&self, provider: &str) -> Result<Arc<dyn ChatBackend>, ProviderError> {
            self.scripts
                .iter()
                .find(|(id, _)| *id == provider)
                .map(|(id, response)| {
                    Arc::new(ScriptedBackend {
                        id: id.to_string(),
                        response: response.clone(),
                    }) as Arc<dyn ChatBackend>
                })
                .ok_or_else(|| ProviderError::NotConfigured(provider.to_string()))
        }
    }

    fn runner(
        scripts: Vec<(&'static str, Result<&'static str, fn() -> ProviderError>)>,
    ) -> ReviewRunner {
        let registry =
            BackendRegistry::with_slots(default_slots(), Arc::new(ScriptedFactory { scripts }));
        ReviewRunner::new(registry, TracingConfig::disabled())
    }

    #[test]
    fn test_change_type_infrastructure() {
        let diff = "\
diff --git a/.github/workflows/ci.yml b/.github/workflows/ci.yml
--- a/.github/workflows/ci.yml
+++ b/.github/workflows/ci.yml
diff --git a/scripts/run.sh b/scripts/run.sh
--- a/scripts/run.sh
+++ b/scripts/run.sh
";
        assert_eq!(
            classify_change_type(Some(diff)),
            ChangeType::Infrastructure
        );
    }

    #[test]
    fn test_change_type_application_and_default() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
--- a/src/main.rs
+++ b/src/main.rs
";
        assert_eq!(classify_change_type(Some(diff)), ChangeType::Application);
        assert_eq!(classify_change_type(None), ChangeType::Application);
        assert_eq!(classify_change_type(Some("   ")), ChangeType::Application);
    }

    #[test]
    fn test_change_type_mixed() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
diff --git a/README.md b/README.md
";
        assert_eq!(classify_change_type(Some(diff)), ChangeType::Mixed);
    }

    #[test]
    fn test_extract_pr_metadata_link_form() {
        let context = "Issue body\nPull request: [#42](https://example.test/pr/42)\n";
        let (number, url) = extract_pr_metadata(context);
        assert_eq!(number, Some(42));
        assert_eq!(url.as_deref(), Some("https://example.test/pr/42"));
    }

    #[test]
    fn test_extract_pr_metadata_bare_number() {
        let (number, url) = extract_pr_metadata("Pull request: #7 merged\n");
        assert_eq!(number, Some(7));
        assert!(url.is_none());
    }

    #[test]
    fn test_extract_pr_metadata_absent() {
        assert_eq!(extract_pr_metadata("no references here"), (None, None));
    }

    #[test]
    fn test_prepare_prompt_selects_infra_variant() {
        let infra_diff = "diff --git a/.github/workflows/ci.yml b/.github/workflows/ci.yml\n";
        let prompt = prepare_prompt("Some context", Some(infra_diff), None);
        assert!(prompt.contains("infrastructure and platform files"));
        assert!(prompt.contains("Some context"));
    }

    #[test]
    fn test_prepare_prompt_custom_gets_addendum() {
        let infra_diff = "diff --git a/.github/workflows/ci.yml b/.github/workflows/ci.yml\n";
        let prompt = prepare_prompt(
            "ctx",
            Some(infra_diff),
            Some("Custom rubric covering correctness, completeness, quality, testing, risks. {context} {diff}"),
        );
        assert!(prompt.contains("Custom rubric"));
        assert!(prompt.contains("Infrastructure Change Guidance"));
    }

    #[test]
    fn test_fallback_review_shape() {
        let review = fallback_review("boom");
        assert_eq!(review.verdict, ReviewVerdict::Concerns);
        assert!(!review.used_llm);
        assert_eq!(review.concerns, vec!["LLM evaluation could not run."]);
        assert_eq!(review.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_evaluate_happy_path() {
        let runner = runner(vec![("openai", Ok(VALID_REVIEW))]);
        let review = runner
            .evaluate("ctx", None, &ReviewOptions::default())
            .await;
        assert_eq!(review.verdict, ReviewVerdict::Pass);
        assert!(review.used_llm);
        assert_eq!(review.provider.as_deref(), Some("openai"));
        assert_eq!(review.change_type, Some(ChangeType::Application));
    }

    #[tokio::test]
    async fn test_evaluate_no_credentials_yields_fallback() {
        let runner = runner(vec![]);
        let review = runner
            .evaluate("ctx", None, &ReviewOptions::default())
            .await;
        assert!(!review.used_llm);
        assert_eq!(
            review.error.as_deref(),
            Some("LLM client unavailable (missing credentials or dependency).")
        );
    }

    #[tokio::test]
    async fn test_evaluate_auth_fallback_to_other_provider() {
        let runner = runner(vec![
            ("openai", Err(|| ProviderError::AuthError)),
            ("anthropic", Ok(VALID_REVIEW)),
        ]);
        let review = runner
            .evaluate("ctx", None, &ReviewOptions::default())
            .await;
        assert_eq!(review.verdict, ReviewVerdict::Pass);
        assert_eq!(review.provider.as_deref(), Some("anthropic"));
        assert_eq!(
            review.error.as_deref(),
            Some("Primary provider (openai) failed, used fallback")
        );
    }

    #[tokio::test]
    async fn test_evaluate_auth_no_fallback_when_provider_explicit() {
        let runner = runner(vec![
            ("openai", Err(|| ProviderError::AuthError)),
            ("anthropic", Ok(VALID_REVIEW)),
        ]);
        let opts = ReviewOptions {
            provider: Some("openai".to_string()),
            ..Default::default()
        };
        let review = runner.evaluate("ctx", None, &opts).await;
        assert!(!review.used_llm);
        assert!(review.error.unwrap().starts_with("LLM invocation failed:"));
    }

    #[tokio::test]
    async fn test_evaluate_size_limit_retries_on_primary() {
        let runner = runner(vec![
            ("openai", Ok(VALID_REVIEW)),
            (
                "anthropic",
                Err(|| ProviderError::ApiError {
                    status: 413,
                    message: "request body too large".to_string(),
                }),
            ),
        ]);
        let opts = ReviewOptions {
            provider: Some("anthropic".to_string()),
            ..Default::default()
        };
        let review = runner.evaluate("ctx", None, &opts).await;
        assert_eq!(review.verdict, ReviewVerdict::Pass);
        assert!(review.used_llm);
        assert_eq!(review.provider.as_deref(), Some("openai"));
        assert!(review.error.is_none());
    }

    #[tokio::test]
    async fn test_evaluate_size_limit_on_primary_is_terminal() {
        // The failing backend already is the primary; there is nothing to
        // substitute, so the deterministic fallback review is returned.
        let runner = runner(vec![(
            "openai",
            Err(|| ProviderError::ApiError {
                status: 413,
                message: "request body too large".to_string(),
            }),
        )]);
        let review = runner
            .evaluate("ctx", None, &ReviewOptions::default())
            .await;
        assert!(!review.used_llm);
        assert!(review.error.unwrap().starts_with("LLM invocation failed:"));
    }

    #[tokio::test]
    async fn test_evaluate_both_providers_failing() {
        let runner = runner(vec![
            ("openai", Err(|| ProviderError::AuthError)),
            ("anthropic", Err(|| ProviderError::AuthError)),
        ]);
        let review = runner
            .evaluate("ctx", None, &ReviewOptions::default())
            .await;
        assert!(!review.used_llm);
        let error = review.error.unwrap();
        assert!(error.contains("Primary (openai):"), "{error}");
        assert!(error.contains("Fallback (anthropic):"), "{error}");
    }

    #[tokio::test]
    async fn test_evaluate_unparseable_response() {
        let runner = runner(vec![("openai", Ok("not json at all"))]);
        let review = runner
            .evaluate("ctx", None, &ReviewOptions::default())
            .await;
        assert_eq!(review.verdict, ReviewVerdict::Concerns);
        assert!(review.used_llm);
        assert!(review
            .error
            .unwrap()
            .starts_with("Failed to parse JSON response"));
        assert_eq!(review.raw_content.as_deref(), Some("not json at all"));
    }

    #[tokio::test]
    async fn test_compare_two_providers() {
        let runner = runner(vec![
            ("openai", Ok(VALID_REVIEW)),
            (
                "anthropic",
                Ok(r#"{"verdict": "CONCERNS", "confidence": 0.6}"#),
            ),
        ]);
        let reviews = runner
            .compare("ctx", None, &ReviewOptions::default(), None)
            .await;
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].provider.as_deref(), Some("openai"));
        assert_eq!(reviews[1].provider.as_deref(), Some("anthropic"));
        assert_eq!(reviews[1].verdict, ReviewVerdict::Concerns);
    }

    #[tokio::test]
    async fn test_compare_without_credentials() {
        let runner = runner(vec![]);
        let reviews = runner
            .compare("ctx", None, &ReviewOptions::default(), None)
            .await;
        assert_eq!(reviews.len(), 1);
        assert!(!reviews[0].used_llm);
    }

    #[tokio::test]
    async fn test_compare_one_provider_failing() {
        let runner = runner(vec![
            ("openai", Err(|| ProviderError::HttpError("reset".to_string()))),
            ("anthropic", Ok(VALID_REVIEW)),
        ]);
        let reviews = runner
            .compare("ctx", None, &ReviewOptions::default(), None)
            .await;
        assert_eq!(reviews.len(), 2);
        assert!(!reviews[0].used_llm);
        assert!(reviews[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("LLM invocation failed:"));
        assert_eq!(reviews[1].verdict, ReviewVerdict::Pass);
    }
}
