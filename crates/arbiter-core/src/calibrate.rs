//! Confidence calibration ("BS detector").
//!
//! An LLM's self-reported confidence is not evidence. This module checks the
//! raw score against independent signals about the work being evaluated and
//! adjusts it downward when the two disagree. Every rule is a non-increasing
//! cap: calibration can lower confidence, never raise it.

use serde::{Deserialize, Serialize};

/// Cap applied when high confidence is claimed but no tasks were detected
/// despite independent evidence of work.
const HIGH_CONFIDENCE_NO_TASKS_CAP: f64 = 0.3;
/// Cap applied when the analysis text is suspiciously short.
const SHORT_ANALYSIS_CAP: f64 = 0.4;
/// Minimum analysis text length before the short-text cap fires.
const MIN_ANALYSIS_TEXT_LENGTH: usize = 200;
/// Cap applied when effort was spent but no tasks were detected.
const EFFORT_WITHOUT_TASKS_CAP: f64 = 0.4;
/// Effort score above which the effort/tasks mismatch rule fires.
const EFFORT_SCORE_THRESHOLD: u32 = 30;
/// Cap applied when the reasoning denies evidence that exists.
const DENIED_EVIDENCE_CAP: f64 = 0.35;
/// Raw confidence above which the no-tasks mismatch rule fires.
const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Phrases that indicate the model claims there was nothing to evaluate.
const NO_EVIDENCE_PHRASES: [&str; 4] = ["no evidence", "no work", "nothing done", "no specific"];

/// Tier describing how trustworthy the underlying session data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    High,
    Medium,
    Low,
    Minimal,
    Unknown,
}

impl DataQuality {
    /// Hard confidence ceiling for this tier.
    pub fn ceiling(self) -> f64 {
        match self {
            DataQuality::High => 1.0,
            DataQuality::Medium => 0.8,
            DataQuality::Low => 0.6,
            DataQuality::Minimal => 0.4,
            DataQuality::Unknown => 0.5,
        }
    }

    fn label(self) -> &'static str {
        match self {
            DataQuality::High => "high",
            DataQuality::Medium => "medium",
            DataQuality::Low => "low",
            DataQuality::Minimal => "minimal",
            DataQuality::Unknown => "unknown",
        }
    }
}

/// Independent evidence about the session being evaluated.
///
/// Supplied by the caller; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityContext {
    pub has_agent_messages: bool,
    pub has_work_evidence: bool,
    pub file_change_count: u32,
    pub successful_command_count: u32,
    pub effort_score: u32,
    pub data_quality: DataQuality,
    pub analysis_text_length: usize,
}

impl Default for QualityContext {
    fn default() -> Self {
        Self {
            has_agent_messages: false,
            has_work_evidence: false,
            file_change_count: 0,
            successful_command_count: 0,
            effort_score: 0,
            data_quality: DataQuality::Unknown,
            analysis_text_length: 0,
        }
    }
}

/// Result of calibrating a raw confidence value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedConfidence {
    pub raw_confidence: f64,
    pub adjusted_confidence: f64,
    pub adjusted: bool,
    pub warnings: Vec<String>,
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

/// Calibrate a self-reported confidence score against session evidence.
///
/// Rules apply in order; each can only lower the running value and appends
/// one warning when it fires. Because every rule is a cap, rule order does
/// not change the final value, only the order of the warnings.
///
/// With no `quality` context there is nothing to calibrate against: the raw
/// value is clamped to `[0,1]` and returned unchanged.
pub fn calibrate(
    raw_confidence: f64,
    completed_count: usize,
    in_progress_count: usize,
    quality: Option<&QualityContext>,
    reasoning: &str,
) -> CalibratedConfidence {
    let mut warnings = Vec::new();
    let mut confidence = raw_confidence.clamp(0.0, 1.0);

    let Some(quality) = quality else {
        return CalibratedConfidence {
            raw_confidence,
            adjusted_confidence: confidence,
            adjusted: false,
            warnings,
        };
    };

    let no_tasks = completed_count == 0 && in_progress_count == 0;

    // Rule 1: high confidence + zero tasks + evidence of work = suspicious.
    if raw_confidence > HIGH_CONFIDENCE_THRESHOLD && no_tasks && quality.has_work_evidence {
        warnings.push(format!(
            "High confidence ({}) but no tasks detected despite {} file changes and {} successful commands",
            percent(raw_confidence),
            quality.file_change_count,
            quality.successful_command_count,
        ));
        confidence = confidence.min(HIGH_CONFIDENCE_NO_TASKS_CAP);
        tracing::warn!(warning = %warnings[warnings.len() - 1], "confidence mismatch detected");
    }

    // Rule 2: very short analysis text likely means data loss upstream.
    if quality.analysis_text_length < MIN_ANALYSIS_TEXT_LENGTH {
        warnings.push(format!(
            "Analysis text suspiciously short ({} chars) - possible data loss in pipeline",
            quality.analysis_text_length,
        ));
        confidence = confidence.min(SHORT_ANALYSIS_CAP);
        tracing::warn!(
            analysis_text_length = quality.analysis_text_length,
            "short analysis text"
        );
    }

    // Rule 3: effort was spent but no tasks were detected.
    if quality.effort_score > EFFORT_SCORE_THRESHOLD && no_tasks {
        warnings.push(format!(
            "Effort score ({}) suggests work was done but no tasks detected",
            quality.effort_score,
        ));
        confidence = confidence.min(EFFORT_WITHOUT_TASKS_CAP);
    }

    // Rule 4: reasoning denies evidence that the session record contains.
    let reasoning_lower = reasoning.to_lowercase();
    if quality.has_work_evidence
        && NO_EVIDENCE_PHRASES
            .iter()
            .any(|phrase| reasoning_lower.contains(phrase))
    {
        warnings.push(
            "LLM claims 'no evidence' but session has file changes/commands".to_string(),
        );
        confidence = confidence.min(DENIED_EVIDENCE_CAP);
    }

    // Rule 5: data quality sets a hard ceiling.
    let ceiling = quality.data_quality.ceiling();
    if confidence > ceiling {
        warnings.push(format!(
            "Confidence capped from {} to {} due to {} data quality",
            percent(raw_confidence),
            percent(ceiling),
            quality.data_quality.label(),
        ));
        confidence = ceiling;
    }

    CalibratedConfidence {
        raw_confidence,
        adjusted_confidence: confidence,
        adjusted: !warnings.is_empty(),
        warnings,
    }
}
