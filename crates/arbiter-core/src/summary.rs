//! Provider verdict extraction from markdown summaries.
//!
//! Comparison reports and CI summaries carry a provider table of the shape
//! `| provider | model | verdict | confidence |`. This module walks those
//! rows back into [`ProviderVerdict`] records so a verdict can be resolved
//! from an existing summary without re-running any backend.

use crate::verdict::{evaluate_verdicts, ProviderVerdict, VerdictPolicy, VerdictPolicyResult};

fn split_row(line: &str) -> Option<Vec<&str>> {
    let line = line.trim_end();
    if !line.starts_with('|') {
        return None;
    }
    let cells: Vec<&str> = line
        .trim_matches('|')
        .split('|')
        .map(str::trim)
        .collect();
    if cells.is_empty() || cells.iter().all(|cell| cell.is_empty()) {
        return None;
    }
    Some(cells)
}

fn coerce_confidence(value: &str) -> f64 {
    let cleaned = value.trim().trim_end_matches('%');
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse().unwrap_or(0.0)
}

/// Parse provider verdict rows from a markdown summary table.
///
/// Header and separator rows are skipped, as are rows with fewer than four
/// cells or an empty provider cell. Unparseable confidence values read as
/// `0.0` rather than dropping the row.
pub fn extract_provider_verdicts(summary: &str) -> Vec<ProviderVerdict> {
    let mut verdicts = Vec::new();
    for line in summary.lines() {
        let Some(cells) = split_row(line) else {
            continue;
        };
        let first = cells[0].to_lowercase();
        if first == "provider" || first == "---" {
            continue;
        }
        if cells.len() < 4 {
            continue;
        }
        let provider = cells[0];
        if provider.is_empty() {
            continue;
        }
        verdicts.push(ProviderVerdict {
            provider: provider.to_string(),
            model: cells[1].to_string(),
            verdict: cells[2].to_string(),
            confidence: coerce_confidence(cells[3]),
        });
    }
    verdicts
}

/// Extract verdicts from a markdown summary and resolve them under `policy`.
pub fn evaluate_summary(summary: &str, policy: VerdictPolicy) -> VerdictPolicyResult {
    let verdicts = extract_provider_verdicts(summary);
    evaluate_verdicts(&verdicts, policy)
}
