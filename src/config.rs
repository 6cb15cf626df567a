//! Client configuration.
//!
//! Loaded from YAML; every field has a default so an empty file (or no file
//! at all) yields a usable configuration once an API key is available.

use std::{collections::BTreeMap, path::Path, time::Duration};

use chat_protocol::ImageDetail;
use llm_multimodal::VisionConfig;
use serde::{Deserialize, Serialize};

use crate::{
    client::RetryPolicy,
    error::{ChatError, ChatResult},
    logging::LoggingConfig,
    prompts::ConversationMode,
};

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Chat completions endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Bearer token. Falls back to `$API_KEY` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Total connection attempts per request, including the first
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Base delay between connection attempts; doubles per retry. 0 retries
    /// immediately.
    #[serde(default)]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Overall request timeout; the transport default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default = "default_image_detail")]
    pub image_detail: ImageDetail,

    #[serde(default)]
    pub vision: VisionConfig,

    /// System prompts keyed by conversation mode (`general`, `deep_thinking`)
    #[serde(default = "default_prompts")]
    pub prompts: BTreeMap<String, String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model_id: default_model_id(),
            api_key: None,
            connect_attempts: default_connect_attempts(),
            retry_base_delay_ms: 0,
            retry_max_delay_ms: default_retry_max_delay_ms(),
            request_timeout_secs: None,
            image_detail: default_image_detail(),
            vision: VisionConfig::default(),
            prompts: default_prompts(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_attempts", &self.connect_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("image_detail", &self.image_detail)
            .field("vision", &self.vision)
            .field("prompts", &self.prompts.keys().collect::<Vec<_>>())
            .field("logging", &self.logging)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_yaml_str(yaml: &str) -> ChatResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ChatError::Config(format!("invalid YAML: {e}")))
    }

    pub fn from_yaml_file(path: &Path) -> ChatResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&raw)
    }

    /// Fill `api_key` from the environment if the config has none.
    pub fn resolve_api_key(&mut self) -> ChatResult<()> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub(crate) fn resolve_api_key_with<F>(&mut self, lookup: F) -> ChatResult<()>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty()) {
            return Ok(());
        }
        match lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty()) {
            Some(key) => {
                self.api_key = Some(key);
                Ok(())
            }
            None => Err(ChatError::Config(format!(
                "no api_key configured and ${API_KEY_ENV} is not set"
            ))),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ChatError::Config("base_url must not be empty".to_string()));
        }
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ChatError::Config(format!("invalid base_url: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ChatError::Config(format!(
                "unsupported base_url scheme: {}",
                url.scheme()
            )));
        }
        if self.model_id.trim().is_empty() {
            return Err(ChatError::Config("model_id must not be empty".to_string()));
        }
        if self.connect_attempts == 0 {
            return Err(ChatError::Config(
                "connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ChatError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        self.vision
            .validate()
            .map_err(|e| ChatError::Config(e.to_string()))?;
        self.logging.validate()?;
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://ark.cn-beijing.volces.com/api/v3/chat/completions".to_string()
}

fn default_model_id() -> String {
    "doubao-1-5-thinking-vision-pro-250428".to_string()
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_retry_max_delay_ms() -> u64 {
    5_000
}

fn default_image_detail() -> ImageDetail {
    ImageDetail::High
}

fn default_prompts() -> BTreeMap<String, String> {
    [
        (
            ConversationMode::General,
            "You are watching a live video feed. Each image is one frame, preceded by its \
             position in seconds. Answer the user's questions about what is happening concisely.",
        ),
        (
            ConversationMode::DeepThinking,
            "You are watching a live video feed. Each image is one frame, preceded by its \
             position in seconds. Reason carefully about how the scene changes between frames \
             before answering the user's questions.",
        ),
    ]
    .into_iter()
    .map(|(mode, prompt)| (mode.key().to_string(), prompt.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = ClientConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.image_detail, ImageDetail::High);
        assert!(config.prompts.contains_key("general"));
        assert!(config.prompts.contains_key("deep_thinking"));
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_overrides_fields() {
        let yaml = r#"
base_url: http://localhost:8080/v1/chat/completions
model_id: test-model
connect_attempts: 5
vision:
  max_pixels: 1003520
  video:
    min_n_frames: 8
logging:
  level: debug
  json: true
"#;
        let config = ClientConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.model_id, "test-model");
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.vision.max_pixels, 1_003_520);
        assert_eq!(config.vision.video.min_n_frames, 8);
        assert_eq!(config.vision.min_pixels, 3136);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        config.validate().unwrap();
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = ClientConfig::from_yaml_str("connect_attempts: [oops").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ClientConfig {
            api_key: Some("sk-secret".to_string()),
            ..ClientConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn api_key_falls_back_to_environment() {
        let mut config = ClientConfig::default();
        config
            .resolve_api_key_with(|name| (name == API_KEY_ENV).then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-env"));

        let mut config = ClientConfig {
            api_key: Some("from-file".to_string()),
            ..ClientConfig::default()
        };
        config
            .resolve_api_key_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-file"));

        let mut config = ClientConfig::default();
        assert!(config.resolve_api_key_with(|_| None).is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad = [
            ClientConfig {
                base_url: "ftp://example.com".to_string(),
                ..ClientConfig::default()
            },
            ClientConfig {
                connect_attempts: 0,
                ..ClientConfig::default()
            },
            ClientConfig {
                model_id: " ".to_string(),
                ..ClientConfig::default()
            },
            ClientConfig {
                request_timeout_secs: Some(0),
                ..ClientConfig::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn retry_policy_reflects_config() {
        let config = ClientConfig {
            connect_attempts: 4,
            retry_base_delay_ms: 100,
            ..ClientConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }
}
