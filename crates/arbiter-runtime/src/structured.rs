//! Structured output validation with one bounded repair round-trip.
//!
//! A backend's free-form answer is validated against a JSON Schema and
//! deserialized. On failure, at most one repair call is made through the
//! same backend: the repair prompt carries the schema, the validation
//! errors, and the original text. No matter how many times repair fails,
//! a single `parse_structured` never issues more than two LLM calls.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::invoke::{InvocationClient, InvokeOptions};
use crate::prompts::render_repair_prompt;
use crate::registry::BackendHandle;

/// Where in the validate/repair pipeline a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    /// No failure; payload is present.
    None,
    /// Initial validation failed and repair was disabled.
    Validation,
    /// No repair capability, or the repair call itself errored or
    /// returned nothing.
    RepairUnavailable,
    /// The repaired text still failed validation.
    RepairValidation,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::None => "none",
            ErrorStage::Validation => "validation",
            ErrorStage::RepairUnavailable => "repair_unavailable",
            ErrorStage::RepairValidation => "repair_validation",
        }
    }
}

/// Outcome of one validate/repair pass.
///
/// `payload` is present iff `error_stage == None`. `raw_content` carries
/// the text that validated on success; failing text travels inside
/// `error_detail`.
#[derive(Debug, Clone)]
pub struct StructuredOutcome<T> {
    pub payload: Option<T>,
    pub raw_content: Option<String>,
    pub error_stage: ErrorStage,
    pub error_detail: Option<String>,
    pub repair_attempts_used: u32,
}

impl<T> StructuredOutcome<T> {
    /// Collapse into a `Result`, folding the failure stage into the
    /// invocation error taxonomy.
    pub fn into_result(self) -> Result<T, LlmError> {
        match self.payload {
            Some(payload) => Ok(payload),
            None => {
                let detail = self.error_detail.unwrap_or_default();
                match self.error_stage {
                    ErrorStage::RepairUnavailable => Err(LlmError::RepairUnavailable {
                        stage: self.error_stage.as_str(),
                        detail,
                    }),
                    stage => Err(LlmError::Validation {
                        stage: stage.as_str(),
                        attempts: self.repair_attempts_used,
                        detail,
                    }),
                }
            }
        }
    }
}

/// One repair round-trip through a backend.
#[async_trait]
pub trait OutputRepair: Send + Sync {
    async fn repair(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Repairs through the same backend handle that produced the original
/// response.
pub struct BackendRepair {
    client: InvocationClient,
    handle: BackendHandle,
}

impl BackendRepair {
    pub fn new(client: InvocationClient, handle: BackendHandle) -> Self {
        Self { client, handle }
    }
}

#[async_trait]
impl OutputRepair for BackendRepair {
    async fn repair(&self, prompt: &str) -> Result<String, LlmError> {
        let outcome = self
            .client
            .invoke(
                &self.handle,
                prompt,
                &InvokeOptions::new("repair_structured_output"),
            )
            .await?;
        Ok(outcome.raw_text)
    }
}

/// Strip a surrounding markdown code fence, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Validation errors as a stable, machine-readable JSON array of
/// `{path, message}` objects.
fn validation_errors(
    validator: &jsonschema::Validator,
    value: &serde_json::Value,
) -> Option<String> {
    let errors: Vec<serde_json::Value> = validator
        .iter_errors(value)
        .map(|err| {
            json!({
                "path": err.instance_path.to_string(),
                "message": err.to_string(),
            })
        })
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(serde_json::Value::Array(errors).to_string())
    }
}

fn validate_once<T: DeserializeOwned>(
    raw: &str,
    validator: &jsonschema::Validator,
) -> Result<(T, String), String> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|err| json!([{"path": "", "message": err.to_string()}]).to_string())?;
    if let Some(errors) = validation_errors(validator, &value) {
        return Err(errors);
    }
    let payload =
        serde_json::from_value(value).map_err(|err| {
            json!([{"path": "", "message": err.to_string()}]).to_string()
        })?;
    Ok((payload, cleaned.to_string()))
}

/// Validate `raw` against `validator` and deserialize, with at most one
/// repair round-trip through `repair`.
///
/// `max_repair_attempts` is clamped to `0..=1`; the total number of LLM
/// calls attributable to one `parse_structured` is at most two (the
/// original plus at most one repair).
pub async fn parse_structured<T: DeserializeOwned>(
    raw: &str,
    schema_json: &str,
    validator: &jsonschema::Validator,
    repair: Option<&dyn OutputRepair>,
    max_repair_attempts: u32,
) -> StructuredOutcome<T> {
    let first_errors = match validate_once::<T>(raw, validator) {
        Ok((payload, content)) => {
            return StructuredOutcome {
                payload: Some(payload),
                raw_content: Some(content),
                error_stage: ErrorStage::None,
                error_detail: None,
                repair_attempts_used: 0,
            };
        }
        Err(errors) => errors,
    };

    debug!(errors = %first_errors, "structured output failed validation");

    let Some(repair) = repair else {
        return StructuredOutcome {
            payload: None,
            raw_content: None,
            error_stage: ErrorStage::RepairUnavailable,
            error_detail: Some(first_errors),
            repair_attempts_used: 0,
        };
    };

    if max_repair_attempts.min(1) == 0 {
        return StructuredOutcome {
            payload: None,
            raw_content: None,
            error_stage: ErrorStage::Validation,
            error_detail: Some(first_errors),
            repair_attempts_used: 0,
        };
    }

    let prompt = render_repair_prompt(schema_json, &first_errors, raw);
    let repaired = match repair.repair(&prompt).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("repair call returned empty response");
            return StructuredOutcome {
                payload: None,
                raw_content: None,
                error_stage: ErrorStage::RepairUnavailable,
                error_detail: Some(first_errors),
                repair_attempts_used: 1,
            };
        }
        Err(err) => {
            warn!(error = %err, "repair call failed");
            return StructuredOutcome {
                payload: None,
                raw_content: None,
                error_stage: ErrorStage::RepairUnavailable,
                error_detail: Some(err.to_string()),
                repair_attempts_used: 1,
            };
        }
    };

    match validate_once::<T>(&repaired, validator) {
        Ok((payload, content)) => StructuredOutcome {
            payload: Some(payload),
            raw_content: Some(content),
            error_stage: ErrorStage::None,
            error_detail: None,
            repair_attempts_used: 1,
        },
        Err(second_errors) => StructuredOutcome {
            payload: None,
            raw_content: None,
            error_stage: ErrorStage::RepairValidation,
            error_detail: Some(second_errors),
            repair_attempts_used: 1,
        },
    }
}
