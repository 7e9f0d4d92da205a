//! Process configuration (§6, §9 "config file format"): a small TOML file
//! plus environment-variable overrides for the two values that can hold a
//! secret or a deployment-specific bind address. Absence of a config file is
//! tolerated; the process falls back to hardcoded defaults with a logged
//! warning rather than refusing to start.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    lm_base_url: String,
    lm_api_key: Option<String>,
    search_endpoint: Option<String>,
    search_api_key: Option<String>,
    listen_addr: String,
    cors_origins: Vec<String>,
    max_concurrent: usize,
    max_retries: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            lm_base_url: "https://openrouter.ai/api/v1".to_string(),
            lm_api_key: None,
            search_endpoint: None,
            search_api_key: None,
            listen_addr: "127.0.0.1:8080".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string(), "http://127.0.0.1:5173".to_string()],
            max_concurrent: 5,
            max_retries: 3,
        }
    }
}

/// The fully-resolved process configuration: file defaults with
/// `LM_API_KEY`/`SEARCH_API_KEY`/`LISTEN_ADDR` environment overrides applied.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lm_base_url: String,
    pub lm_api_key: Option<String>,
    pub search_endpoint: Option<String>,
    pub search_api_key: Option<String>,
    pub listen_addr: String,
    pub cors_origins: Vec<String>,
    pub max_concurrent: usize,
    pub max_retries: u32,
}

impl EngineConfig {
    /// Loads from `CONFIG_PATH`, then `./config/engine.toml`, then
    /// `./engine.toml`, falling back to hardcoded defaults if none exist.
    /// Environment overrides are applied regardless of whether a file was found.
    pub fn load() -> Self {
        let file = Self::candidate_paths()
            .into_iter()
            .find_map(|path| match Self::read_file(&path) {
                Ok(cfg) => Some(cfg),
                Err(err) => {
                    if path.exists() {
                        tracing::warn!(path = %path.display(), error = %err, "failed to parse config file, skipping");
                    }
                    None
                }
            })
            .unwrap_or_else(|| {
                tracing::warn!("no config file found, using hardcoded defaults");
                FileConfig::default()
            });

        Self::from_file(file)
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("CONFIG_PATH") {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("config/engine.toml"));
        paths.push(PathBuf::from("engine.toml"));
        paths
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    fn from_file(file: FileConfig) -> Self {
        let lm_api_key = std::env::var("LM_API_KEY").ok().or(file.lm_api_key);
        let search_api_key = std::env::var("SEARCH_API_KEY").ok().or(file.search_api_key);
        let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or(file.listen_addr);

        Self {
            lm_base_url: file.lm_base_url,
            lm_api_key,
            search_endpoint: file.search_endpoint,
            search_api_key,
            listen_addr,
            cors_origins: file.cors_origins,
            max_concurrent: file.max_concurrent,
            max_retries: file.max_retries,
        }
    }
}
