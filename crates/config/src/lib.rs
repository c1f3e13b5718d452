//! Configuration loading, validation, and management for Addis-Sync.
//!
//! Loads configuration from `~/.addis-sync/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.addis-sync/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Turn loop and dispatch settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Completion backends, tried in fallback order
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Session store settings
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on tool-call rounds within one turn
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Default per-call provider timeout
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Extra attempts on the same candidate after a transient failure
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,

    #[serde(default)]
    pub temperature: f32,

    /// Model id of the dispatcher role; also the primary Gemini candidate
    #[serde(default = "default_root_model")]
    pub root_model: String,

    /// Model id of the specialist roles
    #[serde(default = "default_specialist_model")]
    pub specialist_model: String,
}

fn default_max_turns() -> u32 {
    10
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_provider_timeout_secs() -> u64 {
    60
}
fn default_transient_retries() -> u32 {
    1
}
fn default_root_model() -> String {
    "gemini-2.5-flash-lite".into()
}
fn default_specialist_model() -> String {
    "gemini-2.5-flash".into()
}

impl AgentConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            tool_timeout_secs: default_tool_timeout_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            transient_retries: default_transient_retries(),
            temperature: 0.0,
            root_model: default_root_model(),
            specialist_model: default_specialist_model(),
        }
    }
}

/// The two backend families. Gemini candidates come first in the chain,
/// followed by one OpenRouter candidate per configured model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "ProviderConfig::gemini")]
    pub gemini: ProviderConfig,

    #[serde(default = "ProviderConfig::openrouter")]
    pub openrouter: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini: ProviderConfig::gemini(),
            openrouter: ProviderConfig::openrouter(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Empty means the backend's default endpoint
    #[serde(default)]
    pub base_url: String,

    /// One chain candidate per model, in order. Empty means the backend's
    /// default models; use `enabled = false` to switch a backend off.
    /// For Gemini these are extra fallbacks after `agent.root_model`.
    #[serde(default)]
    pub models: Vec<String>,

    /// Overrides `agent.provider_timeout_secs` for this backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    pub fn gemini() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            models: Vec::new(),
            timeout_secs: None,
        }
    }

    pub fn openrouter() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".into(),
            models: vec![
                "meta-llama/llama-3.3-70b-instruct:free".into(),
                "mistralai/mistral-small-3.1-24b-instruct:free".into(),
            ],
            timeout_secs: None,
        }
    }

    /// Fill an unset endpoint or model list from `defaults`.
    fn fill_from(&mut self, defaults: ProviderConfig) {
        if self.base_url.trim().is_empty() {
            self.base_url = defaults.base_url;
        }
        if self.models.is_empty() {
            self.models = defaults.models;
        }
    }

    /// Whether this backend should contribute candidates at all.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.models.is_empty()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Idle time after which a session is evicted
    #[serde(default = "default_session_timeout_minutes")]
    pub timeout_minutes: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_session_timeout_minutes() -> u64 {
    120
}
fn default_sweep_interval_secs() -> u64 {
    60
}

impl SessionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_session_timeout_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.addis-sync/config.toml).
    ///
    /// Also checks environment variables:
    /// - `GEMINI_API_KEY`, then `GOOGLE_API_KEY`
    /// - `OPENROUTER_API_KEY`
    /// - `ADDIS_SYNC_GEMINI_MODEL` (replaces `agent.root_model`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.providers.gemini.fill_from(ProviderConfig::gemini());
        config.providers.openrouter.fill_from(ProviderConfig::openrouter());

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// API keys from the environment only fill keys the file left unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.providers.gemini.api_key.is_none() {
            self.providers.gemini.api_key =
                lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY"));
        }

        if self.providers.openrouter.api_key.is_none() {
            self.providers.openrouter.api_key = lookup("OPENROUTER_API_KEY");
        }

        if let Some(model) = lookup("ADDIS_SYNC_GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.agent.root_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".addis-sync")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_turns must be at least 1".into(),
            ));
        }

        if self.agent.tool_timeout_secs == 0 || self.agent.provider_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be greater than zero".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for (name, provider) in [
            ("gemini", &self.providers.gemini),
            ("openrouter", &self.providers.openrouter),
        ] {
            if provider.timeout_secs == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name}.timeout_secs must be greater than zero"
                )));
            }
        }

        if self.sessions.timeout_minutes == 0 || self.sessions.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session timeout and sweep interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Gemini models in chain order: the root model, then the configured
    /// extras with duplicates removed.
    pub fn gemini_models(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        let root = self.agent.root_model.trim();
        let extras = self.providers.gemini.models.iter().map(|m| m.trim());
        for model in std::iter::once(root).chain(extras) {
            if !model.is_empty() && !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        models
    }

    /// Check if any backend has an API key (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.providers.gemini.api_key.is_some() || self.providers.openrouter.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
