//! todo-ai configuration.
//!
//! Loaded from `~/.todo-ai/config.toml`. Every key is optional and a missing
//! file means "all defaults". A file that exists but doesn't parse is an
//! error rather than silently ignored.
//!
//! A few settings also resolve through the environment, checked first:
//!
//! 1. `TODO_AI_STORE`: task file path
//! 2. `OPENAI_API_KEY`: extraction API key

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::extract::ExtractorConfig;
use crate::store::Store;
use crate::watcher::Watcher;

/// Environment variable overriding the task file path.
pub const STORE_ENV: &str = "TODO_AI_STORE";

/// Environment variable holding the extraction API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// todo-ai configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Where the task list lives. Defaults to `~/.todo-ai/todos.json`.
    pub store_path: Option<PathBuf>,

    /// Seconds between watcher passes.
    pub watch_interval_secs: u64,

    /// Open tasks older than this many hours are shown as stale.
    pub stale_after_hours: u32,

    pub extractor: ExtractorSettings,
}

/// The `[extractor]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractorSettings {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// Whether the service keeps the response (`store` on the request).
    pub store_responses: bool,
    /// Used only when `OPENAI_API_KEY` is unset.
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            watch_interval_secs: Watcher::DEFAULT_INTERVAL.as_secs(),
            stale_after_hours: 24,
            extractor: ExtractorSettings::default(),
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        let defaults = ExtractorConfig::new("");
        Self {
            model: defaults.model,
            base_url: defaults.base_url,
            timeout_secs: defaults.timeout.as_secs(),
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            max_output_tokens: defaults.max_output_tokens,
            store_responses: defaults.store,
            api_key: None,
        }
    }
}

impl Config {
    /// Load config from `~/.todo-ai/config.toml`, or defaults if there is
    /// none.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        let config: Self = toml::from_str(&contents)
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;

        if config.watch_interval_secs == 0 {
            return Err(format!(
                "watch-interval-secs must be at least 1 in {}",
                path.display()
            ));
        }

        Ok(config)
    }

    /// The config file path: `~/.todo-ai/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".todo-ai").join("config.toml"))
    }

    /// Resolve the task file: `TODO_AI_STORE`, then `store-path`, then the
    /// default under the home directory.
    pub fn store_path(&self) -> Result<PathBuf, String> {
        if let Ok(path) = env::var(STORE_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        Store::default_path().ok_or_else(|| "could not determine home directory".to_string())
    }

    /// Watcher interval; `debug` shortens it for quick manual testing.
    pub fn watch_interval(&self, debug: bool) -> Duration {
        if debug {
            Watcher::DEBUG_INTERVAL
        } else {
            Duration::from_secs(self.watch_interval_secs)
        }
    }

    pub fn stale_after(&self) -> SignedDuration {
        SignedDuration::from_hours(i64::from(self.stale_after_hours))
    }

    /// Build the extractor settings, resolving the API key from
    /// `OPENAI_API_KEY` first and the config file second.
    pub fn extractor_config(&self) -> ExtractorConfig {
        let api_key = env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.extractor.api_key.clone())
            .unwrap_or_default();
        self.extractor.to_config(api_key)
    }
}

impl ExtractorSettings {
    fn to_config(&self, api_key: String) -> ExtractorConfig {
        ExtractorConfig {
            api_key,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_output_tokens: self.max_output_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
            store: self.store_responses,
        }
    }
}
