//! Invocation tracing configuration.
//!
//! An explicit [`TracingConfig`] value is built once at process start and
//! threaded to the invocation client; there is no global mutable tracing
//! state. When enabled, every invocation carries a metadata map plus a tag
//! list so runs can be grouped in the trace viewer, and a backend-provided
//! trace id is turned into a browsable URL.

use std::collections::BTreeMap;

/// Project tag attached to every traced invocation.
pub const TRACE_PROJECT: &str = "arbiter";

/// Default base URL for browsable trace links.
pub const DEFAULT_TRACE_BASE_URL: &str = "https://smith.langchain.com/public";

/// Tracing settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub enabled: bool,
    pub project: String,
    pub repo: String,
    pub run_id: String,
    pub issue_or_pr: String,
    pub base_url: String,
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_or(vars: &[&str], default: &str) -> String {
    for var in vars {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                return value;
            }
        }
    }
    default.to_string()
}

impl TracingConfig {
    /// Resolve from the environment. `ARBITER_TRACING` (truthy) enables
    /// tracing; run context falls back to `unknown` when absent.
    pub fn from_env() -> Self {
        let enabled = std::env::var("ARBITER_TRACING")
            .map(|v| truthy(&v))
            .unwrap_or(false);
        Self {
            enabled,
            project: TRACE_PROJECT.to_string(),
            repo: env_or(&["GITHUB_REPOSITORY"], "unknown"),
            run_id: env_or(&["GITHUB_RUN_ID", "RUN_ID"], "unknown"),
            issue_or_pr: env_or(&["PR_NUMBER", "ISSUE_NUMBER"], "unknown"),
            base_url: env_or(&["ARBITER_TRACE_BASE_URL"], DEFAULT_TRACE_BASE_URL),
        }
    }

    /// A disabled config for callers that never trace.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            project: TRACE_PROJECT.to_string(),
            repo: "unknown".to_string(),
            run_id: "unknown".to_string(),
            issue_or_pr: "unknown".to_string(),
            base_url: DEFAULT_TRACE_BASE_URL.to_string(),
        }
    }

    /// Metadata map attached to a traced invocation.
    pub fn metadata(&self, operation: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("repo".to_string(), self.repo.clone()),
            ("run_id".to_string(), self.run_id.clone()),
            (
                "issue_or_pr_number".to_string(),
                self.issue_or_pr.clone(),
            ),
            ("operation".to_string(), operation.to_string()),
        ])
    }

    /// Tag list attached to a traced invocation.
    pub fn tags(&self, operation: &str) -> Vec<String> {
        vec![
            self.project.clone(),
            format!("operation:{}", operation),
            format!("repo:{}", self.repo),
            format!("issue_or_pr:{}", self.issue_or_pr),
            format!("run_id:{}", self.run_id),
        ]
    }

    /// Browsable URL for a backend-provided trace id.
    pub fn trace_url(&self, trace_id: &str) -> String {
        format!("{}/{}/r", self.base_url, trace_id)
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "on", " On "] {
            assert!(truthy(value), "{value:?} should be truthy");
        }
        for value in ["0", "false", "no", "off", "", "2"] {
            assert!(!truthy(value), "{value:?} should be falsy");
        }
    }

    #[test]
    fn test_metadata_keys() {
        let config = TracingConfig::disabled();
        let metadata = config.metadata("evaluate_pr");
        assert_eq!(metadata.get("operation").unwrap(), "evaluate_pr");
        assert_eq!(metadata.get("repo").unwrap(), "unknown");
        assert_eq!(metadata.get("run_id").unwrap(), "unknown");
        assert_eq!(metadata.get("issue_or_pr_number").unwrap(), "unknown");
    }

    #[test]
    fn test_tags_shape() {
        let config = TracingConfig {
            enabled: true,
            project: TRACE_PROJECT.to_string(),
            repo: "acme/widgets".to_string(),
            run_id: "42".to_string(),
            issue_or_pr: "17".to_string(),
            base_url: DEFAULT_TRACE_BASE_URL.to_string(),
        };
        let tags = config.tags("evaluate_pr");
        assert_eq!(
            tags,
            vec![
                "arbiter".to_string(),
                "operation:evaluate_pr".to_string(),
                "repo:acme/widgets".to_string(),
                "issue_or_pr:17".to_string(),
                "run_id:42".to_string(),
            ]
        );
    }

    #[test]
    fn test_trace_url() {
        let config = TracingConfig::disabled();
        assert_eq!(
            config.trace_url("abc123"),
            "https://smith.langchain.com/public/abc123/r"
        );
    }
}
