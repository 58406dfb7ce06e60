pub mod openai;

use serde::{Deserialize, Serialize};

pub use openai::OpenAiClient;

// --- Message ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

// --- Usage ---

/// Token counts reported with a completion.
///
/// Providers spell the fields either `prompt_tokens`/`completion_tokens`
/// or `input_tokens`/`output_tokens`; both are accepted.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default, alias = "prompt_tokens")]
    pub input_tokens: u64,
    #[serde(default, alias = "completion_tokens")]
    pub output_tokens: u64,
}

pub struct ChatReply {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// A generated image, either inline bytes or a URL to fetch.
pub enum ImageOutput {
    Bytes(Vec<u8>),
    Url(String),
}

// --- Image generation settings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageQuality {
    #[default]
    Low,
    Medium,
    High,
    Auto,
}

impl ImageQuality {
    pub const ALL: [ImageQuality; 4] = [Self::Low, Self::Medium, Self::High, Self::Auto];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    Square,
    #[default]
    Portrait,
    Landscape,
    Auto,
}

impl ImageSize {
    pub const ALL: [ImageSize; 4] = [Self::Square, Self::Portrait, Self::Landscape, Self::Auto];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1536",
            Self::Landscape => "1536x1024",
            Self::Auto => "auto",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Square => "Square 1024×1024",
            Self::Portrait => "Portrait 1024×1536",
            Self::Landscape => "Landscape 1536×1024",
            Self::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageBackground {
    Transparent,
    Opaque,
    #[default]
    Auto,
}

impl ImageBackground {
    pub const ALL: [ImageBackground; 3] = [Self::Transparent, Self::Opaque, Self::Auto];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Opaque => "opaque",
            Self::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Webp,
    Jpeg,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 3] = [Self::Png, Self::Webp, Self::Jpeg];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Per-chat image generation parameters, kept in process memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSettings {
    pub quality: ImageQuality,
    pub size: ImageSize,
    pub background: ImageBackground,
    pub format: ImageFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accepts_both_spellings() {
        let openai: TokenUsage =
            serde_json::from_str(r#"{"prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46}"#)
                .unwrap();
        assert_eq!((openai.input_tokens, openai.output_tokens), (12, 34));

        let responses: TokenUsage =
            serde_json::from_str(r#"{"input_tokens": 5, "output_tokens": 6}"#).unwrap();
        assert_eq!((responses.input_tokens, responses.output_tokens), (5, 6));

        let empty: TokenUsage = serde_json::from_str("{}").unwrap();
        assert_eq!((empty.input_tokens, empty.output_tokens), (0, 0));
    }

    #[test]
    fn test_settings_round_trip_through_callback_values() {
        for q in ImageQuality::ALL {
            assert_eq!(ImageQuality::parse(q.as_str()), Some(q));
        }
        for s in ImageSize::ALL {
            assert_eq!(ImageSize::parse(s.as_str()), Some(s));
        }
        for b in ImageBackground::ALL {
            assert_eq!(ImageBackground::parse(b.as_str()), Some(b));
        }
        for f in ImageFormat::ALL {
            assert_eq!(ImageFormat::parse(f.as_str()), Some(f));
        }
        assert_eq!(ImageQuality::parse("ultra"), None);
    }

    #[test]
    fn test_default_settings() {
        let s = ImageSettings::default();
        assert_eq!(s.quality, ImageQuality::Low);
        assert_eq!(s.size, ImageSize::Portrait);
        assert_eq!(s.background, ImageBackground::Auto);
        assert_eq!(s.format, ImageFormat::Png);
    }
}
