//! Review payload schema and provider review records.
//!
//! The payload is the structured answer backends are asked for when
//! reviewing an artifact. It is validated against a fixed JSON Schema;
//! unknown fields are ignored so prompt drift does not break parsing.

use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::verdict::ProviderVerdict;

/// JSON Schema the review payload is validated against.
pub const REVIEW_SCHEMA_JSON: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "ReviewPayload",
  "type": "object",
  "required": ["verdict"],
  "properties": {
    "verdict": {
      "type": "string",
      "enum": ["PASS", "CONCERNS", "FAIL"]
    },
    "confidence": {
      "type": ["number", "null"],
      "minimum": 0,
      "maximum": 1
    },
    "scores": {
      "type": ["object", "null"],
      "required": ["correctness", "completeness", "quality", "testing", "risks"],
      "properties": {
        "correctness": { "type": "number", "minimum": 0, "maximum": 10 },
        "completeness": { "type": "number", "minimum": 0, "maximum": 10 },
        "quality": { "type": "number", "minimum": 0, "maximum": 10 },
        "testing": { "type": "number", "minimum": 0, "maximum": 10 },
        "risks": { "type": "number", "minimum": 0, "maximum": 10 }
      }
    },
    "concerns": {
      "type": "array",
      "items": { "type": "string" }
    },
    "summary": {
      "type": ["string", "null"]
    }
  }
}"#;

lazy_static! {
    static ref REVIEW_VALIDATOR: jsonschema::Validator = {
        let schema: serde_json::Value =
            serde_json::from_str(REVIEW_SCHEMA_JSON).expect("embedded review schema is valid JSON");
        jsonschema::options()
            .build(&schema)
            .expect("embedded review schema compiles")
    };
}

/// Compiled validator for [`REVIEW_SCHEMA_JSON`] (built once, reused).
pub fn review_validator() -> &'static jsonschema::Validator {
    &REVIEW_VALIDATOR
}

/// Categorical review verdict a backend assigns to the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewVerdict {
    Pass,
    Concerns,
    Fail,
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewVerdict::Pass => write!(f, "PASS"),
            ReviewVerdict::Concerns => write!(f, "CONCERNS"),
            ReviewVerdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Per-dimension rubric scores, each on a 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewScores {
    pub correctness: f64,
    pub completeness: f64,
    pub quality: f64,
    pub testing: f64,
    pub risks: f64,
}

/// Rubric dimensions in report order.
pub const SCORE_DIMENSIONS: [&str; 5] =
    ["correctness", "completeness", "quality", "testing", "risks"];

impl ReviewScores {
    /// Score for a named dimension; `None` for unknown names.
    pub fn get(&self, dimension: &str) -> Option<f64> {
        match dimension {
            "correctness" => Some(self.correctness),
            "completeness" => Some(self.completeness),
            "quality" => Some(self.quality),
            "testing" => Some(self.testing),
            "risks" => Some(self.risks),
            _ => None,
        }
    }
}

/// The structured answer a backend is asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub verdict: ReviewVerdict,
    #[serde(default)]
    pub scores: Option<ReviewScores>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// How the changed files in a diff skew between infrastructure and
/// application code. Selects the evaluation prompt variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Infrastructure,
    Application,
    Mixed,
}

/// One backend's full evaluation record for an artifact.
///
/// Produced by the review runner; consumed by the comparison report and
/// converted into a [`ProviderVerdict`] for policy resolution. Terminal
/// failures still yield a well-formed record with `error` populated so
/// downstream formatting never crashes on absent data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReview {
    pub verdict: ReviewVerdict,
    #[serde(default)]
    pub scores: Option<ReviewScores>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub used_llm: bool,
    #[serde(default)]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub change_type: Option<ChangeType>,
}

impl ProviderReview {
    /// Build a review from a validated payload plus invocation context.
    pub fn from_payload(
        payload: ReviewPayload,
        provider: impl Into<String>,
        model: impl Into<String>,
        raw_content: Option<String>,
    ) -> Self {
        Self {
            verdict: payload.verdict,
            scores: payload.scores,
            confidence: payload.confidence,
            concerns: payload.concerns,
            summary: payload.summary,
            provider: Some(provider.into()),
            model: Some(model.into()),
            used_llm: true,
            raw_content,
            error: None,
            change_type: None,
        }
    }

    /// Provider label for display, falling back to a positional name.
    pub fn provider_label(&self, index: usize) -> String {
        self.provider
            .clone()
            .unwrap_or_else(|| format!("provider-{}", index + 1))
    }

    /// Convert into the record the verdict policy resolver consumes.
    pub fn to_provider_verdict(&self, index: usize) -> ProviderVerdict {
        ProviderVerdict {
            provider: self.provider_label(index),
            model: self.model.clone().unwrap_or_default(),
            verdict: self.verdict.to_string(),
            confidence: self.confidence.unwrap_or(0.0),
        }
    }
}
