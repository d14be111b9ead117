use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::auth::rate_limit::{QuotaFailurePolicy, Tier};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemvaultConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; each user's database lives at `<data_dir>/users/<user_id>.db`.
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub keys_db: String,
    pub quota_failure: QuotaFailurePolicy,
    pub tiers: TierLimits,
}

/// Requests allowed per sliding 60-second window, per tier.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct TierLimits {
    pub free: u64,
    pub pro: u64,
    pub enterprise: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the LLM API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub max_tool_iterations: usize,
    pub recall_limit: usize,
    pub workspace_dir: String,
    pub remember_turns: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8787,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_memvault_dir().to_string_lossy().into_owned(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let keys_db = default_memvault_dir()
            .join("keys.db")
            .to_string_lossy()
            .into_owned();
        Self {
            keys_db,
            quota_failure: QuotaFailurePolicy::Open,
            tiers: TierLimits::default(),
        }
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            free: 60,
            pro: 600,
            enterprise: 6000,
        }
    }
}

impl TierLimits {
    pub fn limit_for(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Free => self.free,
            Tier::Pro => self.pro,
            Tier::Enterprise => self.enterprise,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let workspace_dir = default_memvault_dir()
            .join("workspace")
            .to_string_lossy()
            .into_owned();
        Self {
            api_url: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-sonnet-4-5".into(),
            api_key_env: "ANTHROPIC_API_KEY".into(),
            max_tokens: 4096,
            max_tool_iterations: 5,
            recall_limit: 5,
            workspace_dir,
            remember_turns: true,
            request_timeout_secs: 120,
        }
    }
}

/// Returns `~/.memvault/`, or `./.memvault/` when no home directory is known.
pub fn default_memvault_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memvault")
}

/// Returns the default config file path: `~/.memvault/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memvault_dir().join("config.toml")
}

impl MemvaultConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemvaultConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MEMVAULT_DATA_DIR, MEMVAULT_KEYS_DB,
    /// MEMVAULT_HOST, MEMVAULT_PORT, MEMVAULT_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMVAULT_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("MEMVAULT_KEYS_DB") {
            self.auth.keys_db = val;
        }
        if let Ok(val) = std::env::var("MEMVAULT_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("MEMVAULT_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid MEMVAULT_PORT"),
            }
        }
        if let Ok(val) = std::env::var("MEMVAULT_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the storage root, expanding `~` if needed.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    pub fn resolved_keys_db(&self) -> PathBuf {
        expand_tilde(&self.auth.keys_db)
    }

    pub fn resolved_workspace_dir(&self) -> PathBuf {
        expand_tilde(&self.agent.workspace_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
