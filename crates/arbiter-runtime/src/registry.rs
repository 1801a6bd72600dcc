//! Slot-ordered backend registry.
//!
//! Configuration is a fixed, priority-ordered list of slots, each binding a
//! provider to a default model. Resolution walks the slots in order and
//! returns the first one whose credential is present; an explicitly
//! requested provider is authoritative and never falls through. Resolution
//! is pure: credential presence checks and client construction only, no
//! network traffic.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::providers::{
    normalize_provider, ChatBackend, EnvProviderFactory, ProviderFactory, DEFAULT_MODEL,
};

/// Default per-attempt timeout when `ARBITER_TIMEOUT` is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default transport retry budget when `ARBITER_MAX_RETRIES` is unset.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// One fallback slot: a provider bound to its default model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub name: Option<String>,
    pub provider: String,
    pub model: String,
}

impl Slot {
    fn new(provider: &str, model: &str) -> Self {
        Self {
            name: None,
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlotFile {
    #[serde(default)]
    slots: Vec<Slot>,
}

/// Built-in fallback order used when no slot file is configured.
pub fn default_slots() -> Vec<Slot> {
    vec![
        Slot::new("openai", "gpt-5.2"),
        Slot::new("anthropic", "claude-sonnet-4-5-20250929"),
        Slot::new("github-models", "gpt-4o"),
    ]
}

fn load_slot_file(path: &Path) -> Option<Vec<Slot>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "slot config unreadable, using defaults");
            return None;
        }
    };
    let parsed: SlotFile = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "slot config invalid, using defaults");
            return None;
        }
    };
    let slots: Vec<Slot> = parsed
        .slots
        .into_iter()
        .filter(|slot| {
            let keep = is_known_provider(&slot.provider) && !slot.model.trim().is_empty();
            if !keep {
                warn!(provider = %slot.provider, model = %slot.model, "dropping invalid slot entry");
            }
            keep
        })
        .collect();
    if slots.is_empty() {
        None
    } else {
        Some(slots)
    }
}

fn is_known_provider(provider: &str) -> bool {
    matches!(
        normalize_provider(provider).as_str(),
        "openai" | "anthropic" | "github-models"
    )
}

/// What the caller asks the registry for.
#[derive(Debug, Clone, Default)]
pub struct BackendSelector {
    /// Explicit provider; authoritative when set.
    pub provider: Option<String>,
    /// Explicit model; beats every environment override.
    pub model: Option<String>,
    /// Resolve to the first configured slot's provider regardless of the
    /// provider field. Used for cross-provider retry.
    pub force_primary: bool,
}

impl BackendSelector {
    pub fn provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn primary() -> Self {
        Self {
            force_primary: true,
            ..Self::default()
        }
    }
}

/// A resolved, ready-to-call backend bound to one provider/model pair.
#[derive(Clone)]
pub struct BackendHandle {
    pub backend: Arc<dyn ChatBackend>,
    pub provider: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl BackendHandle {
    /// "provider/model" label for logs and fallback notes.
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Parse a timeout value: plain integers mean seconds, otherwise any
/// `humantime` duration ("90s", "2m") is accepted.
pub fn parse_timeout(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(trimmed).ok()
}

/// Slot-ordered registry of chat backends.
pub struct BackendRegistry {
    slots: Vec<Slot>,
    factory: Arc<dyn ProviderFactory>,
    env_provider: Option<String>,
    global_model: Option<String>,
    timeout: Duration,
    max_retries: u32,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("slots", &self.slots)
            .field("env_provider", &self.env_provider)
            .field("global_model", &self.global_model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn env_nonempty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl BackendRegistry {
    /// Build from the environment with the default transport factory.
    pub fn from_env() -> Self {
        Self::with_factory(Arc::new(EnvProviderFactory))
    }

    /// Build from the environment with a caller-supplied factory.
    ///
    /// Environment is read once here: the slot file (`ARBITER_SLOT_CONFIG`),
    /// per-slot overrides (`ARBITER_SLOT{i}_PROVIDER` / `ARBITER_SLOT{i}_MODEL`,
    /// 1-based; slot 1's model falls back to `ARBITER_MODEL`), the explicit
    /// provider (`ARBITER_PROVIDER`), the global model (`ARBITER_MODEL`),
    /// the per-attempt timeout (`ARBITER_TIMEOUT`), and the retry budget
    /// (`ARBITER_MAX_RETRIES`).
    pub fn with_factory(factory: Arc<dyn ProviderFactory>) -> Self {
        let mut slots = env_nonempty("ARBITER_SLOT_CONFIG")
            .and_then(|path| load_slot_file(Path::new(&path)))
            .unwrap_or_else(default_slots);

        for (i, slot) in slots.iter_mut().enumerate() {
            let index = i + 1;
            if let Some(provider) = env_nonempty(&format!("ARBITER_SLOT{}_PROVIDER", index)) {
                slot.provider = provider;
            }
            let model_override = env_nonempty(&format!("ARBITER_SLOT{}_MODEL", index))
                .or_else(|| if index == 1 { env_nonempty("ARBITER_MODEL") } else { None });
            if let Some(model) = model_override {
                slot.model = model;
            }
        }

        let timeout = env_nonempty("ARBITER_TIMEOUT")
            .and_then(|v| parse_timeout(&v))
            .unwrap_or(DEFAULT_TIMEOUT);
        let max_retries = env_nonempty("ARBITER_MAX_RETRIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        Self {
            slots,
            factory,
            env_provider: env_nonempty("ARBITER_PROVIDER"),
            global_model: env_nonempty("ARBITER_MODEL"),
            timeout,
            max_retries,
        }
    }

    /// Build with explicit slots; environment is not consulted. Test seam.
    pub fn with_slots(slots: Vec<Slot>, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            slots,
            factory,
            env_provider: None,
            global_model: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Configured slots in priority order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Credential presence per configured slot provider.
    pub fn availability(&self) -> BTreeMap<String, bool> {
        self.slots
            .iter()
            .map(|slot| {
                let canonical = normalize_provider(&slot.provider);
                let available = self.factory.available(&canonical);
                (canonical, available)
            })
            .collect()
    }

    fn credential_unavailable(&self, provider: &str) -> LlmError {
        let env_var = EnvProviderFactory::credential_var(provider)
            .unwrap_or("a provider credential")
            .to_string();
        LlmError::CredentialUnavailable {
            provider: provider.to_string(),
            env_var,
        }
    }

    fn handle(&self, provider: &str, model: &str) -> Result<BackendHandle, LlmError> {
        let backend = self
            .factory
            .build(provider)
            .map_err(|_| self.credential_unavailable(provider))?;
        Ok(BackendHandle {
            backend,
            provider: provider.to_string(),
            model: model.to_string(),
            timeout: self.timeout,
            max_retries: self.max_retries,
        })
    }

    /// Model for an explicit provider request: per-call model, then the
    /// global model, then the built-in default.
    fn explicit_model(&self, selector: &BackendSelector) -> String {
        selector
            .model
            .clone()
            .or_else(|| self.global_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Model for a slot: per-call model, then the global model, then the
    /// slot's own model (which already carries any per-slot override).
    fn slot_model(&self, selector: &BackendSelector, slot: &Slot) -> String {
        selector
            .model
            .clone()
            .or_else(|| self.global_model.clone())
            .unwrap_or_else(|| slot.model.clone())
    }

    fn explicit_provider(&self, selector: &BackendSelector) -> Option<String> {
        if selector.force_primary {
            return self.slots.first().map(|slot| slot.provider.clone());
        }
        selector
            .provider
            .clone()
            .or_else(|| self.env_provider.clone())
    }

    /// Resolve one backend.
    ///
    /// An explicit provider (selector, `force_primary`, or
    /// `ARBITER_PROVIDER`) is authoritative: if its credential is absent or
    /// its alias unknown, resolution fails rather than falling through.
    /// Without one, slots are walked in order and the first provider with a
    /// credential wins.
    pub fn resolve(&self, selector: &BackendSelector) -> Result<BackendHandle, LlmError> {
        if let Some(requested) = self.explicit_provider(selector) {
            let canonical = normalize_provider(&requested);
            if !is_known_provider(&canonical) || !self.factory.available(&canonical) {
                return Err(self.credential_unavailable(&canonical));
            }
            let model = if selector.force_primary {
                // force_primary keeps the slot's model unless overridden
                let slot = self.slots.first().cloned().unwrap_or_else(|| {
                    Slot::new(&canonical, DEFAULT_MODEL)
                });
                self.slot_model(selector, &slot)
            } else {
                self.explicit_model(selector)
            };
            return self.handle(&canonical, &model);
        }

        for slot in &self.slots {
            let canonical = normalize_provider(&slot.provider);
            if !self.factory.available(&canonical) {
                debug!(provider = %canonical, "slot skipped, credential absent");
                continue;
            }
            let model = self.slot_model(selector, slot);
            match self.handle(&canonical, &model) {
                Ok(handle) => return Ok(handle),
                Err(err) => {
                    warn!(provider = %canonical, error = %err, "slot construction failed, trying next");
                    continue;
                }
            }
        }

        let first = self
            .slots
            .first()
            .map(|slot| normalize_provider(&slot.provider))
            .unwrap_or_else(|| "openai".to_string());
        Err(self.credential_unavailable(&first))
    }

    /// Resolve up to `count` distinct usable handles in slot order.
    ///
    /// With an explicit provider the second handle reuses that provider
    /// with `alternate_model`, and is only produced when that model differs
    /// from the first.
    pub fn resolve_many(
        &self,
        count: usize,
        selector: &BackendSelector,
        alternate_model: Option<&str>,
    ) -> Vec<BackendHandle> {
        let mut handles = Vec::new();
        if count == 0 {
            return handles;
        }

        if let Some(requested) = self.explicit_provider(selector) {
            let canonical = normalize_provider(&requested);
            if let Ok(first) = self.resolve(selector) {
                let first_model = first.model.clone();
                handles.push(first);
                if handles.len() < count {
                    if let Some(alt) = alternate_model {
                        if alt != first_model {
                            if let Ok(second) = self.handle(&canonical, alt) {
                                handles.push(second);
                            }
                        }
                    }
                }
            }
            return handles;
        }

        let mut taken: Vec<String> = Vec::new();
        for slot in &self.slots {
            if handles.len() >= count {
                break;
            }
            let canonical = normalize_provider(&slot.provider);
            if taken.contains(&canonical) {
                continue;
            }
            if !self.factory.available(&canonical) {
                continue;
            }
            let model = self.slot_model(selector, slot);
            if let Ok(handle) = self.handle(&canonical, &model) {
                taken.push(canonical);
                handles.push(handle);
            }
        }
        handles
    }
}
