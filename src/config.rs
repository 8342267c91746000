use crate::core::chat::{
    ChatOptions, DEFAULT_CACHE_DIR, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL,
};
use crate::core::pricing::{ModelPricing, PricingTable};
use crate::core::provider::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, OpenAiProvider};
use crate::error::ChatError;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const KEYRING_SERVICE: &str = "chatmgr";
pub const KEYRING_USER: &str = "openai";

const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_MODEL: &str = "CHATMGR_MODEL";
const ENV_EMBEDDING_MODEL: &str = "CHATMGR_EMBEDDING_MODEL";
const ENV_CACHE_DIR: &str = "CHATMGR_CACHE_DIR";
const ENV_BASE_URL: &str = "CHATMGR_BASE_URL";

/// Configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// API key; normally supplied by env or keyring and never written back
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Root of the OpenAI-compatible REST API
    pub base_url: String,
    /// Chat model used for conversations
    pub model_name: String,
    /// Model used for embeddings
    pub embedding_model_name: String,
    /// Keep conversation history between calls
    pub interactive: bool,
    /// Load cache shards on start, save one after every billed call
    pub auto_saveload: bool,
    /// Directory holding cache shards
    pub cache_dir: PathBuf,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Per-model prices layered over the built-in table
    pub pricing: HashMap<String, ModelPricing>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            embedding_model_name: DEFAULT_EMBEDDING_MODEL.to_string(),
            interactive: true,
            auto_saveload: true,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            pricing: HashMap::new(),
        }
    }
}

/// Location of the user config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatmgr").join("config.toml"))
}

/// API key stored in the OS keyring, if any.
pub fn keyring_api_key() -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).ok()?;
    match entry.get_password() {
        Ok(key) if !key.trim().is_empty() => Some(key),
        Ok(_) => None,
        Err(e) => {
            debug!("No API key in keyring: {e}");
            None
        }
    }
}

impl Config {
    /// Load the configuration with layered priority: env > file > defaults.
    ///
    /// The API key additionally falls back to the OS keyring before the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok(), keyring_api_key)
    }

    /// [`Config::load`] with the environment and keyring supplied by the
    /// caller. An explicitly named file must exist; the default one may not.
    pub fn load_with<F, K>(path: Option<&Path>, lookup: F, keyring: K) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
        K: FnOnce() -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(ref path) if path.exists() => Self::from_file(path)?,
                _ => Self::default(),
            },
        };

        let env_key = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty());
        config.apply_overrides(&lookup);
        if env_key.is_none()
            && let Some(key) = keyring()
        {
            config.api_key = key;
        }

        debug!(
            "Configuration loaded: model={}, embedding_model={}, cache_dir={}",
            config.model_name,
            config.embedding_model_name,
            config.cache_dir.display()
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply overrides from an environment-like lookup. Empty values are
    /// ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model_name = model;
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            self.embedding_model_name = model;
        }
        if let Some(dir) = get(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
    }

    /// Write the configuration as TOML. The API key is never written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        debug!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.base_url.trim().is_empty() {
            return Err(ChatError::Config("base_url must not be empty".to_string()));
        }
        if self.model_name.trim().is_empty() {
            return Err(ChatError::Config("model_name must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ChatError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Built-in prices with the configured overrides on top.
    pub fn pricing_table(&self) -> PricingTable {
        let mut table = PricingTable::default();
        table.extend(self.pricing.iter().map(|(k, v)| (k.clone(), *v)));
        table
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            model_name: self.model_name.clone(),
            embedding_model_name: self.embedding_model_name.clone(),
            interactive: self.interactive,
            auto_saveload: self.auto_saveload,
            cache_dir: self.cache_dir.clone(),
            pricing: self.pricing_table(),
        }
    }

    pub fn provider(&self) -> Result<OpenAiProvider, ChatError> {
        self.validate()?;
        OpenAiProvider::with_options(
            self.api_key.clone(),
            self.base_url.clone(),
            Duration::from_secs(self.timeout_secs),
        )
    }
}
