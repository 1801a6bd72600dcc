//! Provider comparison report rendering.
//!
//! Pure formatting over a list of [`ProviderReview`] records: a per-provider
//! summary table, an expandable details block, and agreement, disagreement,
//! and unique-insight sections. No side effects; the comment-posting layer
//! consumes the returned markdown as-is.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::payload::{ProviderReview, SCORE_DIMENSIONS};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace regex compiles");
}

fn normalize_text(text: &str) -> String {
    WHITESPACE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

fn compact_text(text: &str, limit: usize) -> String {
    let cleaned = WHITESPACE.replace_all(text.trim(), " ").to_string();
    if cleaned.len() <= limit {
        return cleaned;
    }
    let cut = limit.saturating_sub(3);
    let mut end = cut;
    while end > 0 && !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", cleaned[..end].trim_end())
}

fn format_confidence(confidence: Option<f64>) -> String {
    match confidence {
        Some(value) => format!("{:.0}%", value * 100.0),
        None => "N/A".to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Concern texts appearing in more than one review, normalized by
/// whitespace and case, keeping the first original wording.
fn shared_concerns(results: &[ProviderReview]) -> Vec<String> {
    let mut counts: BTreeMap<String, (usize, String)> = BTreeMap::new();
    for result in results {
        for concern in &result.concerns {
            let normalized = normalize_text(concern);
            if normalized.is_empty() {
                continue;
            }
            counts
                .entry(normalized)
                .and_modify(|entry| entry.0 += 1)
                .or_insert((1, concern.clone()));
        }
    }
    counts
        .into_values()
        .filter(|(count, _)| *count > 1)
        .map(|(_, text)| text)
        .collect()
}

/// Per-review concerns that appear exactly once across all reviews.
fn unique_concerns(results: &[ProviderReview]) -> Vec<Vec<String>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for result in results {
        for concern in &result.concerns {
            let normalized = normalize_text(concern);
            if normalized.is_empty() {
                continue;
            }
            *counts.entry(normalized).or_insert(0) += 1;
        }
    }
    results
        .iter()
        .map(|result| {
            result
                .concerns
                .iter()
                .filter(|concern| {
                    let normalized = normalize_text(concern);
                    !normalized.is_empty() && counts.get(&normalized) == Some(&1)
                })
                .cloned()
                .collect()
        })
        .collect()
}

fn push_score_lines(lines: &mut Vec<String>, review: &ProviderReview) {
    if let Some(scores) = &review.scores {
        lines.push("- **Scores:**".to_string());
        lines.push(format!("  - Correctness: {}/10", scores.correctness));
        lines.push(format!("  - Completeness: {}/10", scores.completeness));
        lines.push(format!("  - Quality: {}/10", scores.quality));
        lines.push(format!("  - Testing: {}/10", scores.testing));
        lines.push(format!("  - Risks: {}/10", scores.risks));
    }
}

/// Render the provider comparison report for a set of reviews.
pub fn format_comparison_report(results: &[ProviderReview]) -> String {
    let mut lines: Vec<String> = vec!["## Provider Comparison Report".to_string(), String::new()];
    if results.is_empty() {
        lines.push("No evaluation results available.".to_string());
        return finish(lines);
    }

    if results.len() == 1 {
        lines.push("Only one provider was available; comparison skipped.".to_string());
        lines.push(String::new());
    }

    let labels: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(index, result)| result.provider_label(index))
        .collect();

    lines.push("### Provider Summary".to_string());
    lines.push("| Provider | Model | Verdict | Confidence | Summary |".to_string());
    lines.push("| --- | --- | --- | --- | --- |".to_string());
    for (index, result) in results.iter().enumerate() {
        let summary_source = result
            .summary
            .as_deref()
            .or(result.raw_content.as_deref())
            .unwrap_or("");
        let summary = if summary_source.is_empty() {
            "N/A".to_string()
        } else {
            compact_text(summary_source, 200)
        };
        let model_name = result.model.as_deref().unwrap_or("N/A");
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            labels[index],
            model_name,
            result.verdict,
            format_confidence(result.confidence),
            summary
        ));
    }
    lines.push(String::new());

    lines.push("<details>".to_string());
    lines.push("<summary>📋 Full Provider Details (click to expand)</summary>".to_string());
    lines.push(String::new());
    for (index, result) in results.iter().enumerate() {
        lines.push(format!("#### {}", labels[index]));
        if let Some(model) = &result.model {
            lines.push(format!("- **Model:** {}", model));
        }
        lines.push(format!("- **Verdict:** {}", result.verdict));
        lines.push(format!(
            "- **Confidence:** {}",
            format_confidence(result.confidence)
        ));
        push_score_lines(&mut lines, result);
        if let Some(summary) = &result.summary {
            lines.push(format!("- **Summary:** {}", summary));
        }
        if !result.concerns.is_empty() {
            lines.push("- **Concerns:**".to_string());
            for concern in &result.concerns {
                lines.push(format!("  - {}", concern));
            }
        }
        if let Some(error) = &result.error {
            lines.push(format!("- **Error:** {}", error));
        }
        lines.push(String::new());
    }
    lines.push("</details>".to_string());
    lines.push(String::new());

    lines.push("### Agreement".to_string());
    let mut agreements: Vec<String> = Vec::new();
    let verdicts_differ = results
        .iter()
        .any(|result| result.verdict != results[0].verdict);
    if !verdicts_differ {
        agreements.push(format!("- Verdict: {} (all providers)", results[0].verdict));
    }

    for dimension in SCORE_DIMENSIONS {
        let scores: Vec<f64> = results
            .iter()
            .filter_map(|result| result.scores.as_ref().and_then(|s| s.get(dimension)))
            .collect();
        if scores.len() != results.len() {
            continue;
        }
        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max - min <= 1.0 {
            let avg = scores.iter().sum::<f64>() / scores.len() as f64;
            agreements.push(format!(
                "- {}: scores within 1 point (avg {:.1}/10, range {:.1}-{:.1})",
                capitalize(dimension),
                avg,
                min,
                max
            ));
        }
    }

    for concern in shared_concerns(results) {
        agreements.push(format!("- Concern: {}", concern));
    }

    if agreements.is_empty() {
        lines.push("- No clear areas of agreement.".to_string());
    } else {
        lines.extend(agreements);
    }
    lines.push(String::new());

    lines.push("### Disagreement".to_string());
    let mut rows: Vec<(String, Vec<String>)> = Vec::new();
    if verdicts_differ {
        rows.push((
            "Verdict".to_string(),
            results.iter().map(|r| r.verdict.to_string()).collect(),
        ));
    }

    for dimension in SCORE_DIMENSIONS {
        let scores: Vec<Option<f64>> = results
            .iter()
            .map(|result| result.scores.as_ref().and_then(|s| s.get(dimension)))
            .collect();
        let available: Vec<f64> = scores.iter().filter_map(|s| *s).collect();
        if available.len() < 2 {
            continue;
        }
        let min = available.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = available.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max - min > 1.0 {
            let rendered = scores
                .iter()
                .map(|score| match score {
                    Some(value) => format!("{:.1}/10", value),
                    None => "N/A".to_string(),
                })
                .collect();
            rows.push((capitalize(dimension), rendered));
        }
    }

    if rows.is_empty() {
        lines.push("No major disagreements detected.".to_string());
    } else {
        lines.push(format!("| Dimension | {} |", labels.join(" | ")));
        lines.push(format!(
            "| --- | {} |",
            vec!["---"; labels.len()].join(" | ")
        ));
        for (dimension, values) in rows {
            lines.push(format!("| {} | {} |", dimension, values.join(" | ")));
        }
    }
    lines.push(String::new());

    lines.push("### Unique Insights".to_string());
    let unique_map = unique_concerns(results);
    for (index, result) in results.iter().enumerate() {
        let mut insights = unique_map[index].clone();
        if insights.is_empty() {
            if let Some(summary) = result.summary.as_deref().filter(|s| !s.is_empty()) {
                insights = vec![compact_text(summary, 300)];
            }
        }
        if insights.is_empty() {
            insights = vec!["No unique insights reported.".to_string()];
        }
        lines.push(format!("- {}: {}", labels[index], insights.join("; ")));
    }
    lines.push(String::new());

    finish(lines)
}

fn finish(lines: Vec<String>) -> String {
    format!("{}\n", lines.join("\n").trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{ReviewScores, ReviewVerdict};

    fn review(
        provider: &str,
        verdict: ReviewVerdict,
        confidence: Option<f64>,
        scores: Option<ReviewScores>,
        concerns: &[&str],
        summary: Option<&str>,
    ) -> ProviderReview {
        ProviderReview {
            verdict,
            scores,
            confidence,
            concerns: concerns.iter().map(|c| c.to_string()).collect(),
            summary: summary.map(str::to_string),
            provider: Some(provider.to_string()),
            model: Some("gpt-4o".to_string()),
            used_llm: true,
            raw_content: None,
            error: None,
            change_type: None,
        }
    }

    fn scores(correctness: f64, testing: f64) -> ReviewScores {
        ReviewScores {
            correctness,
            completeness: 8.0,
            quality: 8.0,
            testing,
            risks: 8.0,
        }
    }

    #[test]
    fn test_empty_results() {
        let report = format_comparison_report(&[]);
        assert!(report.contains("## Provider Comparison Report"));
        assert!(report.contains("No evaluation results available."));
    }

    #[test]
    fn test_single_result_skips_comparison() {
        let report = format_comparison_report(&[review(
            "openai",
            ReviewVerdict::Pass,
            Some(0.9),
            None,
            &[],
            Some("fine"),
        )]);
        assert!(report.contains("Only one provider was available; comparison skipped."));
        assert!(report.contains("| openai | gpt-4o | PASS | 90% | fine |"));
    }

    #[test]
    fn test_agreement_on_unanimous_verdict_and_close_scores() {
        let results = [
            review(
                "openai",
                ReviewVerdict::Pass,
                Some(0.9),
                Some(scores(9.0, 7.0)),
                &["needs docs"],
                Some("ok"),
            ),
            review(
                "anthropic",
                ReviewVerdict::Pass,
                Some(0.8),
                Some(scores(8.5, 7.5)),
                &["Needs docs"],
                Some("ok"),
            ),
        ];
        let report = format_comparison_report(&results);
        assert!(report.contains("- Verdict: PASS (all providers)"));
        assert!(report.contains("- Correctness: scores within 1 point (avg 8.8/10, range 8.5-9.0)"));
        // Shared concern matched case-insensitively, first wording kept.
        assert!(report.contains("- Concern: needs docs"));
        assert!(report.contains("No major disagreements detected."));
    }

    #[test]
    fn test_disagreement_table_on_wide_spread() {
        let results = [
            review(
                "openai",
                ReviewVerdict::Pass,
                Some(0.9),
                Some(scores(9.0, 9.0)),
                &[],
                None,
            ),
            review(
                "anthropic",
                ReviewVerdict::Concerns,
                Some(0.6),
                Some(scores(5.0, 3.0)),
                &[],
                None,
            ),
        ];
        let report = format_comparison_report(&results);
        assert!(report.contains("| Dimension | openai | anthropic |"));
        assert!(report.contains("| Verdict | PASS | CONCERNS |"));
        assert!(report.contains("| Correctness | 9.0/10 | 5.0/10 |"));
        assert!(report.contains("| Testing | 9.0/10 | 3.0/10 |"));
    }

    #[test]
    fn test_unique_insights_per_provider() {
        let results = [
            review(
                "openai",
                ReviewVerdict::Pass,
                None,
                None,
                &["shared worry", "only openai saw this"],
                None,
            ),
            review(
                "anthropic",
                ReviewVerdict::Pass,
                None,
                None,
                &["shared worry"],
                Some("summary fallback"),
            ),
        ];
        let report = format_comparison_report(&results);
        assert!(report.contains("- openai: only openai saw this"));
        assert!(report.contains("- anthropic: summary fallback"));
    }

    #[test]
    fn test_unique_insights_placeholder() {
        let results = [
            review("openai", ReviewVerdict::Pass, None, None, &[], None),
            review("anthropic", ReviewVerdict::Pass, None, None, &[], None),
        ];
        let report = format_comparison_report(&results);
        assert!(report.contains("- openai: No unique insights reported."));
    }

    #[test]
    fn test_error_rendered_in_details() {
        let mut failed = review("openai", ReviewVerdict::Concerns, None, None, &[], None);
        failed.error = Some("LLM invocation failed: timeout".to_string());
        let report = format_comparison_report(&[failed]);
        assert!(report.contains("- **Error:** LLM invocation failed: timeout"));
    }

    #[test]
    fn test_long_summary_is_compacted() {
        let long = "word ".repeat(100);
        let results = [
            review("openai", ReviewVerdict::Pass, None, None, &[], Some(&long)),
            review("anthropic", ReviewVerdict::Pass, None, None, &[], Some("short")),
        ];
        let report = format_comparison_report(&results);
        let table_line = report
            .lines()
            .find(|line| line.starts_with("| openai"))
            .unwrap();
        assert!(table_line.len() < 260);
        assert!(table_line.contains("..."));
    }
}
