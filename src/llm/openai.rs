use anyhow::{Context, Result};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatReply, ImageOutput, ImageSettings, Message, TokenUsage};
use crate::config::OpenAiConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI chat completions and image generation endpoints.
///
/// Works with any provider exposing the same API surface via `base_url`.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_format: Option<&'a str>,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    pub async fn chat(&self, messages: &[Message]) -> Result<ChatReply> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to call {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({status}): {body}");
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(ChatReply {
            content,
            usage: body.usage,
        })
    }

    /// Generate one image for `prompt`.
    ///
    /// `dall-e-*` models only accept a plain square size; the extra
    /// parameters are for the `gpt-image-*` family.
    pub async fn generate_image(
        &self,
        prompt: &str,
        settings: ImageSettings,
    ) -> Result<ImageOutput> {
        let url = format!("{}/images/generations", self.base_url);
        let dalle = self.image_model.to_lowercase().contains("dall-e");
        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: if dalle { "1024x1024" } else { settings.size.as_str() },
            quality: (!dalle).then(|| settings.quality.as_str()),
            background: (!dalle).then(|| settings.background.as_str()),
            output_format: (!dalle).then(|| settings.format.as_str()),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to call {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Image API error ({status}): {body}");
        }

        let body: ImageResponse = response
            .json()
            .await
            .context("Failed to parse image response")?;

        let image = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Image API returned no data"))?;

        if let Some(b64) = image.b64_json {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64)
                .context("Image payload is not valid base64")?;
            return Ok(ImageOutput::Bytes(bytes));
        }
        if let Some(url) = image.url {
            return Ok(ImageOutput::Url(url));
        }
        anyhow::bail!("Image API returned neither bytes nor a URL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_request_omits_extras_for_dalle() {
        let request = ImageRequest {
            model: "dall-e-3",
            prompt: "a cat",
            n: 1,
            size: "1024x1024",
            quality: None,
            background: None,
            output_format: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["size"], "1024x1024");
        assert!(json.get("quality").is_none());
        assert!(json.get("output_format").is_none());
    }

    #[test]
    fn test_image_request_carries_settings() {
        let s = ImageSettings::default();
        let request = ImageRequest {
            model: "gpt-image-1-mini",
            prompt: "a cat",
            n: 1,
            size: s.size.as_str(),
            quality: Some(s.quality.as_str()),
            background: Some(s.background.as_str()),
            output_format: Some(s.format.as_str()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["size"], "1024x1536");
        assert_eq!(json["quality"], "low");
        assert_eq!(json["background"], "auto");
        assert_eq!(json["output_format"], "png");
    }

    #[test]
    fn test_chat_response_parses_with_and_without_usage() {
        let with: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}],
                "usage": {"prompt_tokens": 7, "completion_tokens": 2, "total_tokens": 9}}"#,
        )
        .unwrap();
        assert_eq!(with.choices[0].message.content.as_deref(), Some("hi"));
        assert_eq!(with.usage.unwrap().input_tokens, 7);

        let without: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(without.usage.is_none());
        assert!(without.choices[0].message.content.is_none());
    }
}
