//! Verdict policy resolution.
//!
//! Given verdicts from one or more LLM backends on the same artifact, this
//! module applies a deterministic policy (worst-case or majority) to pick a
//! single verdict, detects the split pass/concerns pattern that warrants
//! human review, and reports the full provider-by-provider record.
//!
//! The resolution is a pure function of its inputs: same providers and
//! policy always produce the same result, regardless of input order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence threshold below which a dissenting "concerns" verdict in a
/// split result forces human escalation.
pub const CONCERNS_NEEDS_HUMAN_THRESHOLD: f64 = 0.85;

/// Categorical verdict kind, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Unknown,
    Pass,
    Concerns,
    Fail,
}

impl VerdictKind {
    /// Severity order: unknown(0) < pass(1) < concerns(2) < fail(3).
    pub fn severity(self) -> u8 {
        match self {
            VerdictKind::Unknown => 0,
            VerdictKind::Pass => 1,
            VerdictKind::Concerns => 2,
            VerdictKind::Fail => 3,
        }
    }

    /// Classify free-form verdict text by case-insensitive prefix match.
    pub fn classify(verdict: &str) -> Self {
        let normalized = verdict.trim().to_lowercase();
        if normalized.is_empty() {
            return VerdictKind::Unknown;
        }
        if normalized.starts_with("pass") {
            VerdictKind::Pass
        } else if normalized.starts_with("concerns") {
            VerdictKind::Concerns
        } else if normalized.starts_with("fail") {
            VerdictKind::Fail
        } else {
            VerdictKind::Unknown
        }
    }

    /// All kinds in ascending severity order.
    pub const ALL: [VerdictKind; 4] = [
        VerdictKind::Unknown,
        VerdictKind::Pass,
        VerdictKind::Concerns,
        VerdictKind::Fail,
    ];
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerdictKind::Unknown => "unknown",
            VerdictKind::Pass => "pass",
            VerdictKind::Concerns => "concerns",
            VerdictKind::Fail => "fail",
        };
        write!(f, "{}", name)
    }
}

/// One backend's verdict on the artifact under review.
///
/// `verdict` keeps the raw text the backend produced; the kind is derived
/// on use so the original wording survives for audit. `confidence` accepts
/// either the `[0,1]` scale or percentages and is normalized on use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderVerdict {
    pub provider: String,
    pub model: String,
    pub verdict: String,
    pub confidence: f64,
}

impl ProviderVerdict {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        verdict: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            verdict: verdict.into(),
            confidence,
        }
    }

    /// Derived verdict kind.
    pub fn kind(&self) -> VerdictKind {
        VerdictKind::classify(&self.verdict)
    }

    /// Confidence normalized to `[0,1]`; values above 1 are read as percent.
    pub fn normalized_confidence(&self) -> f64 {
        normalize_confidence(self.confidence)
    }
}

/// Normalize a confidence value: `<=0 -> 0`, `<=1 -> as-is`, `>1 -> /100`.
pub fn normalize_confidence(value: f64) -> f64 {
    if value <= 0.0 {
        0.0
    } else if value <= 1.0 {
        value
    } else {
        value / 100.0
    }
}

/// Policy used to resolve multiple provider verdicts into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictPolicy {
    /// Pick the most severe verdict.
    Worst,
    /// Pick the verdict kind with the most votes.
    Majority,
}

impl fmt::Display for VerdictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictPolicy::Worst => write!(f, "worst"),
            VerdictPolicy::Majority => write!(f, "majority"),
        }
    }
}

/// Error for unrecognized policy names.
#[derive(Error, Debug)]
#[error("unknown policy: {0} (expected 'worst' or 'majority')")]
pub struct ParsePolicyError(String);

impl FromStr for VerdictPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "worst" => Ok(VerdictPolicy::Worst),
            "majority" => Ok(VerdictPolicy::Majority),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// Outcome of a policy evaluation over a set of provider verdicts.
///
/// Fully derivable from the `providers` input and the `policy`; carries the
/// complete, unmodified input list for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictPolicyResult {
    pub verdict: String,
    pub verdict_kind: VerdictKind,
    pub policy: VerdictPolicy,
    pub needs_human: bool,
    pub needs_human_reason: String,
    pub selected_provider: Option<String>,
    pub selected_model: Option<String>,
    pub selected_confidence: Option<f64>,
    pub split_verdict: bool,
    pub concerns_confidence: Option<f64>,
    pub providers: Vec<ProviderVerdict>,
}

/// Deterministic tie-break chain shared by both policies: higher normalized
/// confidence wins, then the lexicographically smaller lowercased provider,
/// model, and verdict text.
fn tie_break(a: &ProviderVerdict, b: &ProviderVerdict) -> Ordering {
    a.normalized_confidence()
        .total_cmp(&b.normalized_confidence())
        .then_with(|| {
            b.provider
                .to_lowercase()
                .cmp(&a.provider.to_lowercase())
        })
        .then_with(|| b.model.to_lowercase().cmp(&a.model.to_lowercase()))
        .then_with(|| b.verdict.to_lowercase().cmp(&a.verdict.to_lowercase()))
}

/// Full ordering for the worst policy: severity first, then the tie-break
/// chain. The "maximum" entry under this ordering is the selection.
fn worst_order(a: &ProviderVerdict, b: &ProviderVerdict) -> Ordering {
    a.kind()
        .severity()
        .cmp(&b.kind().severity())
        .then_with(|| tie_break(a, b))
}

fn select<'a>(
    verdicts: &'a [ProviderVerdict],
    policy: VerdictPolicy,
) -> Option<&'a ProviderVerdict> {
    if verdicts.is_empty() {
        return None;
    }

    match policy {
        VerdictPolicy::Worst => verdicts
            .iter()
            .max_by(|a, b| worst_order(a, b)),
        VerdictPolicy::Majority => {
            // Bucket by kind; the winning bucket has the most members, with
            // ties between kinds broken by higher severity. Iterating kinds
            // in ascending severity with `>=` keeps this deterministic.
            let mut winner: Option<(VerdictKind, usize)> = None;
            for kind in VerdictKind::ALL {
                let count = verdicts.iter().filter(|v| v.kind() == kind).count();
                if count == 0 {
                    continue;
                }
                match winner {
                    Some((_, best)) if count < best => {}
                    _ => winner = Some((kind, count)),
                }
            }
            let (majority_kind, _) = winner?;
            verdicts
                .iter()
                .filter(|v| v.kind() == majority_kind)
                .max_by(|a, b| tie_break(a, b))
        }
    }
}

/// Detect the split pass/concerns pattern and report the maximum normalized
/// confidence among the `concerns` entries.
fn split_pass_concerns(verdicts: &[ProviderVerdict]) -> (bool, Option<f64>) {
    let has_pass = verdicts.iter().any(|v| v.kind() == VerdictKind::Pass);
    let has_concerns = verdicts.iter().any(|v| v.kind() == VerdictKind::Concerns);
    if !(has_pass && has_concerns) {
        return (false, None);
    }
    let max_confidence = verdicts
        .iter()
        .filter(|v| v.kind() == VerdictKind::Concerns)
        .map(|v| v.normalized_confidence())
        .fold(0.0_f64, f64::max);
    (true, Some(max_confidence))
}

/// Resolve a set of provider verdicts into one decision.
///
/// Split-verdict detection runs independently of the requested policy: a
/// low-confidence dissenting "concerns" verdict sitting alongside a "pass"
/// is exactly the ambiguous case an automated pipeline must not silently
/// resolve, so it raises `needs_human`.
pub fn evaluate_verdicts(
    verdicts: &[ProviderVerdict],
    policy: VerdictPolicy,
) -> VerdictPolicyResult {
    let selected = select(verdicts, policy);
    let (split_verdict, concerns_confidence) = split_pass_concerns(verdicts);

    let mut needs_human = false;
    let mut needs_human_reason = String::new();
    if split_verdict {
        let confidence_value = concerns_confidence.unwrap_or(0.0);
        if confidence_value < CONCERNS_NEEDS_HUMAN_THRESHOLD {
            needs_human = true;
            needs_human_reason = format!(
                "Provider verdicts split with low-confidence concerns; \
                 dissenting confidence {:.2} < {:.2}. \
                 Requires human review before starting another automated follow-up.",
                confidence_value, CONCERNS_NEEDS_HUMAN_THRESHOLD
            );
        }
    }

    let Some(selected) = selected else {
        return VerdictPolicyResult {
            verdict: "Unknown".to_string(),
            verdict_kind: VerdictKind::Unknown,
            policy,
            needs_human,
            needs_human_reason,
            selected_provider: None,
            selected_model: None,
            selected_confidence: None,
            split_verdict,
            concerns_confidence,
            providers: verdicts.to_vec(),
        };
    };

    let verdict_text = {
        let trimmed = selected.verdict.trim();
        if trimmed.is_empty() {
            "Unknown".to_string()
        } else {
            trimmed.to_string()
        }
    };
    let verdict_kind = VerdictKind::classify(&verdict_text);

    VerdictPolicyResult {
        verdict: verdict_text,
        verdict_kind,
        policy,
        needs_human,
        needs_human_reason,
        selected_provider: Some(selected.provider.clone()),
        selected_model: Some(selected.model.clone()),
        selected_confidence: Some(selected.normalized_confidence()),
        split_verdict,
        concerns_confidence,
        providers: verdicts.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pv(provider: &str, verdict: &str, confidence: f64) -> ProviderVerdict {
        ProviderVerdict::new(provider, "gpt-4o", verdict, confidence)
    }

    #[test]
    fn test_classify_prefix_match() {
        assert_eq!(VerdictKind::classify("PASS"), VerdictKind::Pass);
        assert_eq!(VerdictKind::classify("  passed "), VerdictKind::Pass);
        assert_eq!(VerdictKind::classify("Concerns"), VerdictKind::Concerns);
        assert_eq!(VerdictKind::classify("FAIL: broken"), VerdictKind::Fail);
        assert_eq!(VerdictKind::classify(""), VerdictKind::Unknown);
        assert_eq!(VerdictKind::classify("maybe"), VerdictKind::Unknown);
    }

    #[test]
    fn test_normalize_confidence_scales() {
        assert_eq!(normalize_confidence(-1.0), 0.0);
        assert_eq!(normalize_confidence(0.85), 0.85);
        assert_eq!(normalize_confidence(85.0), 0.85);
    }

    #[test]
    fn test_empty_input_is_unknown() {
        let result = evaluate_verdicts(&[], VerdictPolicy::Worst);
        assert_eq!(result.verdict, "Unknown");
        assert_eq!(result.verdict_kind, VerdictKind::Unknown);
        assert!(!result.needs_human);
        assert!(result.providers.is_empty());
        assert!(result.selected_provider.is_none());
    }

    #[test]
    fn test_worst_picks_highest_severity() {
        let verdicts = vec![
            pv("a", "PASS", 0.9),
            pv("b", "FAIL", 0.4),
            pv("c", "CONCERNS", 0.8),
        ];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
        assert_eq!(result.verdict, "FAIL");
        assert_eq!(result.selected_provider.as_deref(), Some("b"));
    }

    #[test]
    fn test_worst_tie_break_prefers_smaller_provider() {
        let verdicts = vec![pv("zeta", "FAIL", 0.7), pv("alpha", "FAIL", 0.7)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
        assert_eq!(result.selected_provider.as_deref(), Some("alpha"));

        // Same input reversed resolves identically.
        let reversed = vec![pv("alpha", "FAIL", 0.7), pv("zeta", "FAIL", 0.7)];
        let result2 = evaluate_verdicts(&reversed, VerdictPolicy::Worst);
        assert_eq!(result2.selected_provider.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_worst_tie_break_prefers_higher_confidence() {
        let verdicts = vec![pv("a", "FAIL", 0.5), pv("b", "FAIL", 0.9)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
        assert_eq!(result.selected_provider.as_deref(), Some("b"));
    }

    #[test]
    fn test_majority_picks_largest_bucket() {
        let verdicts = vec![
            pv("a", "PASS", 0.9),
            pv("b", "PASS", 0.8),
            pv("c", "FAIL", 0.95),
        ];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Majority);
        assert_eq!(result.verdict_kind, VerdictKind::Pass);
        assert_eq!(result.selected_provider.as_deref(), Some("a"));
    }

    #[test]
    fn test_majority_bucket_tie_prefers_higher_severity() {
        let verdicts = vec![pv("a", "PASS", 0.9), pv("b", "CONCERNS", 0.5)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Majority);
        assert_eq!(result.verdict_kind, VerdictKind::Concerns);
    }

    #[test]
    fn test_split_verdict_low_confidence_needs_human() {
        let verdicts = vec![pv("x", "pass", 0.9), pv("y", "concerns", 0.5)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
        assert_eq!(result.verdict_kind, VerdictKind::Concerns);
        assert!(result.split_verdict);
        assert_eq!(result.concerns_confidence, Some(0.5));
        assert!(result.needs_human);
        assert!(result.needs_human_reason.contains("0.50"));
    }

    #[test]
    fn test_split_verdict_high_confidence_resolves_automatically() {
        let verdicts = vec![pv("x", "pass", 0.9), pv("y", "concerns", 0.9)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
        assert!(result.split_verdict);
        assert!(!result.needs_human);
        assert!(result.needs_human_reason.is_empty());
    }

    #[test]
    fn test_split_detection_normalizes_percent_confidence() {
        let verdicts = vec![pv("x", "pass", 0.9), pv("y", "concerns", 90.0)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
        assert_eq!(result.concerns_confidence, Some(0.9));
        assert!(!result.needs_human);
    }

    #[test]
    fn test_blank_selected_verdict_becomes_unknown() {
        let verdicts = vec![pv("a", "   ", 0.9)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Worst);
        assert_eq!(result.verdict, "Unknown");
        assert_eq!(result.verdict_kind, VerdictKind::Unknown);
        assert_eq!(result.selected_provider.as_deref(), Some("a"));
    }

    #[test]
    fn test_result_carries_full_input_list() {
        let verdicts = vec![pv("a", "PASS", 0.9), pv("b", "FAIL", 0.1)];
        let result = evaluate_verdicts(&verdicts, VerdictPolicy::Majority);
        assert_eq!(result.providers, verdicts);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("worst".parse::<VerdictPolicy>().unwrap(), VerdictPolicy::Worst);
        assert_eq!(
            " Majority ".parse::<VerdictPolicy>().unwrap(),
            VerdictPolicy::Majority
        );
        assert!("best".parse::<VerdictPolicy>().is_err());
    }

    fn arb_verdict() -> impl Strategy<Value = ProviderVerdict> {
        (
            "[a-z]{1,8}",
            "[a-z0-9-]{1,10}",
            prop_oneof![
                Just("PASS".to_string()),
                Just("CONCERNS".to_string()),
                Just("FAIL".to_string()),
                Just("".to_string()),
                "[a-zA-Z ]{0,12}",
            ],
            0.0_f64..100.0,
        )
            .prop_map(|(provider, model, verdict, confidence)| ProviderVerdict {
                provider,
                model,
                verdict,
                confidence,
            })
    }

    proptest! {
        #[test]
        fn prop_evaluate_is_deterministic(
            verdicts in prop::collection::vec(arb_verdict(), 0..6),
            worst in any::<bool>(),
        ) {
            let policy = if worst { VerdictPolicy::Worst } else { VerdictPolicy::Majority };
            let first = evaluate_verdicts(&verdicts, policy);
            let second = evaluate_verdicts(&verdicts, policy);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_selection_is_order_independent(
            verdicts in prop::collection::vec(arb_verdict(), 1..6),
            worst in any::<bool>(),
        ) {
            let policy = if worst { VerdictPolicy::Worst } else { VerdictPolicy::Majority };
            let forward = evaluate_verdicts(&verdicts, policy);
            let mut reversed = verdicts.clone();
            reversed.reverse();
            let backward = evaluate_verdicts(&reversed, policy);
            prop_assert_eq!(forward.verdict, backward.verdict);
            prop_assert_eq!(forward.selected_provider, backward.selected_provider);
            prop_assert_eq!(forward.selected_model, backward.selected_model);
            prop_assert_eq!(forward.needs_human, backward.needs_human);
        }
    }
}
