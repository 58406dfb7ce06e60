use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Base URL for the API. Optional — defaults to api.openai.com.
    pub base_url: Option<String>,
    #[serde(default = "default_cost_per_1m_input")]
    pub cost_per_1m_input: f64,
    #[serde(default = "default_cost_per_1m_output")]
    pub cost_per_1m_output: f64,
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1-mini".to_string()
}

fn default_cost_per_1m_input() -> f64 {
    0.25
}

fn default_cost_per_1m_output() -> f64 {
    2.00
}

#[derive(Debug, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_window")]
    pub max_user_messages: usize,
    #[serde(default = "default_window")]
    pub max_assistant_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            max_user_messages: default_window(),
            max_assistant_messages: default_window(),
        }
    }
}

impl MemoryConfig {
    pub fn memory_path(&self) -> PathBuf {
        self.base_dir.join("memory.json")
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.base_dir.join("prompts.json")
    }
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kotobot")
}

fn default_window() -> usize {
    10
}

pub fn load(path: &str) -> Result<Config> {
    let path = expand_tilde(path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;
    if config.telegram.token.trim().is_empty() {
        anyhow::bail!("[telegram] token is not set in {}", path.display());
    }
    if config.openai.api_key.trim().is_empty() {
        anyhow::bail!("[openai] api_key is not set in {}", path.display());
    }
    Ok(config)
}

pub async fn init_config_dir() -> Result<()> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(&base).await?;

    let prompts = base.join("prompts.json");
    if !prompts.exists() {
        tokio::fs::write(&prompts, DEFAULT_PROMPTS_JSON).await?;
    }

    let config_path = base.join("config.toml");
    if !config_path.exists() {
        tokio::fs::write(
            &config_path,
            r#"[telegram]
token = "YOUR_BOT_TOKEN"

[openai]
api_key = "YOUR_API_KEY"
model = "gpt-5-mini"
image_model = "gpt-image-1-mini"
# base_url = "https://api.openai.com/v1"  # optional, any compatible endpoint
# Pricing used for the /stats cost estimate, USD per 1M tokens.
# cost_per_1m_input = 0.25
# cost_per_1m_output = 2.00

[memory]
# base_dir = "~/.kotobot"
max_user_messages = 10
max_assistant_messages = 10
"#,
        )
        .await?;
    }

    Ok(())
}

const DEFAULT_PROMPTS_JSON: &str = r#"{
  "default_prompt": "assistant",
  "prompts": {
    "assistant": {
      "name": "Assistant",
      "description": "General-purpose helpful assistant",
      "system_prompt": "You are a helpful assistant. Answer clearly and concisely."
    },
    "developer": {
      "name": "Developer",
      "description": "Programming help with code examples",
      "system_prompt": "You are an experienced software engineer. Answer with working code examples and point out pitfalls."
    },
    "translator": {
      "name": "Translator",
      "description": "Translates between English and Russian",
      "system_prompt": "You are a professional translator. Translate the user's text between English and Russian, preserving tone and register."
    }
  }
}
"#;

fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let cfg: Config = toml::from_str(
            r#"
            [telegram]
            token = "t"
            [openai]
            api_key = "k"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.openai.model, "gpt-5-mini");
        assert_eq!(cfg.openai.image_model, "gpt-image-1-mini");
        assert_eq!(cfg.memory.max_user_messages, 10);
        assert_eq!(cfg.memory.max_assistant_messages, 10);
        assert!(cfg.memory.memory_path().ends_with("memory.json"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[telegram]\ntoken = \"\"\n[openai]\napi_key = \"k\"\n",
        )
        .unwrap();
        let err = load(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_default_prompts_template_parses() {
        let v: serde_json::Value = serde_json::from_str(DEFAULT_PROMPTS_JSON).unwrap();
        assert_eq!(v["default_prompt"], "assistant");
        assert!(v["prompts"]["assistant"]["system_prompt"].is_string());
    }
}
