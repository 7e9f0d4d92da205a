//! Client configuration for the OpenRouter-backed provider.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for talking to an OpenRouter-compatible chat-completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_key: String,

    /// Base URL, e.g. `"https://openrouter.ai/api/v1"`.
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl RemoteLlmConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = RemoteLlmConfig::new("test-key", "https://openrouter.ai/api/v1")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn defaults_match_spec() {
        let config = RemoteLlmConfig::new("k", "https://openrouter.ai/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
    }
}
