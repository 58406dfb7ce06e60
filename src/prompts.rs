use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Mode key assumed when nothing else resolves.
pub const DEFAULT_MODE: &str = "assistant";

/// Last-resort system prompt when the catalog has no usable entry.
const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Deserialize)]
pub struct PromptMode {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
}

/// Read-mostly mapping of mode key to persona, shared by all chats.
///
/// Loaded once at startup; the application root holds it behind a
/// `RwLock` and swaps in a fresh value on `/reload`.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptCatalog {
    #[serde(rename = "default_prompt", default = "default_mode_key")]
    default_mode: String,
    #[serde(rename = "prompts", default)]
    modes: HashMap<String, PromptMode>,
}

fn default_mode_key() -> String {
    DEFAULT_MODE.to_string()
}

impl PromptCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompts: {}", path.display()))?;
        let mut catalog: PromptCatalog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse prompts: {}", path.display()))?;

        if catalog.modes.is_empty() {
            anyhow::bail!("Prompt catalog {} defines no prompts", path.display());
        }
        if !catalog.modes.contains_key(&catalog.default_mode) {
            let substitute = catalog
                .modes
                .keys()
                .next()
                .expect("modes is non-empty")
                .clone();
            tracing::warn!(
                "default_prompt '{}' not found in catalog, using '{substitute}'",
                catalog.default_mode
            );
            catalog.default_mode = substitute;
        }
        Ok(catalog)
    }

    pub fn default_mode(&self) -> &str {
        &self.default_mode
    }

    pub fn contains(&self, key: &str) -> bool {
        self.modes.contains_key(key)
    }

    /// Iterate (key, mode) pairs for menu rendering.
    pub fn modes(&self) -> impl Iterator<Item = (&String, &PromptMode)> {
        self.modes.iter()
    }

    /// Human-readable name for a mode key, falling back to the key itself.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.modes.get(key).map(|m| m.name.as_str()).unwrap_or(key)
    }

    /// Resolve the system prompt for a mode.
    ///
    /// Falls back: requested mode → catalog default → the "assistant"
    /// entry → a hard-coded prompt. Never fails.
    pub fn system_prompt(&self, mode: Option<&str>) -> &str {
        let key = mode.unwrap_or(&self.default_mode);
        self.modes
            .get(key)
            .or_else(|| self.modes.get(DEFAULT_MODE))
            .map(|m| m.system_prompt.as_str())
            .unwrap_or(FALLBACK_SYSTEM_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(json: &str) -> PromptCatalog {
        serde_json::from_str(json).unwrap()
    }

    fn write_and_load(json: &str) -> Result<PromptCatalog> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(&path, json).unwrap();
        PromptCatalog::load(&path)
    }

    #[test]
    fn test_missing_default_replaced_by_existing_key() {
        let cat = write_and_load(
            r#"{"default_prompt": "missing", "prompts": {"a": {"name": "A", "system_prompt": "SA"}}}"#,
        )
        .unwrap();
        assert_eq!(cat.default_mode(), "a");
        assert_eq!(cat.system_prompt(None), "SA");
    }

    #[test]
    fn test_empty_catalog_rejected_at_load() {
        let err = write_and_load(r#"{"default_prompt": "assistant", "prompts": {}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("no prompts"));
    }

    #[test]
    fn test_system_prompt_resolution_chain() {
        let cat = catalog(
            r#"{
                "default_prompt": "assistant",
                "prompts": {
                    "assistant": {"name": "Assistant", "system_prompt": "SA"},
                    "dev": {"name": "Dev", "description": "d", "system_prompt": "SD"}
                }
            }"#,
        );
        assert_eq!(cat.system_prompt(Some("dev")), "SD");
        assert_eq!(cat.system_prompt(None), "SA");
        // Unknown key falls back to the assistant entry.
        assert_eq!(cat.system_prompt(Some("nope")), "SA");
    }

    #[test]
    fn test_empty_catalog_value_uses_hardcoded_fallback() {
        // Construct directly: load() rejects this, but lookups must still
        // never fail on whatever value is in memory.
        let cat = catalog(r#"{"default_prompt": "assistant", "prompts": {}}"#);
        assert_eq!(cat.system_prompt(None), FALLBACK_SYSTEM_PROMPT);
        assert_eq!(cat.system_prompt(Some("x")), FALLBACK_SYSTEM_PROMPT);
    }

    #[test]
    fn test_display_name_falls_back_to_key() {
        let cat = catalog(
            r#"{"default_prompt": "a", "prompts": {"a": {"name": "Alpha", "system_prompt": "S"}}}"#,
        );
        assert_eq!(cat.display_name("a"), "Alpha");
        assert_eq!(cat.display_name("zzz"), "zzz");
    }
}
