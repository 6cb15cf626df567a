//! Tracing subscriber setup.
//!
//! `RUST_LOG` overrides the configured level when set.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    filter::LevelFilter, fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{ChatError, ChatResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    pub fn level_filter(&self) -> ChatResult<LevelFilter> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| ChatError::Config(format!("invalid log level: {}", self.level)))
    }

    pub fn validate(&self) -> ChatResult<()> {
        self.level_filter().map(|_| ())
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// streamed answers. Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> ChatResult<bool> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level_filter()?.into())
        .from_env_lossy();

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    Ok(tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels() {
        let config = LoggingConfig {
            level: "DEBUG".to_string(),
            json: false,
        };
        assert_eq!(config.level_filter().unwrap(), LevelFilter::DEBUG);
        assert!(LoggingConfig {
            level: "loud".to_string(),
            json: false
        }
        .validate()
        .is_err());
    }

    #[test]
    fn second_init_is_a_no_op() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }
}
