//! Service configuration.
//!
//! Loaded once at startup from an optional TOML file, then overridden by
//! `BREVET_*` environment variables. The resulting `Config` is passed down
//! explicitly; nothing reads it from global state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::{DEFAULT_HASH_ITERATIONS, DEFAULT_TOKEN_TTL_SECS};

/// File names inside the data directory.
const USERS_DB_FILE: &str = "users.db";
const BREVET_DB_FILE: &str = "brevet.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Requests running longer than this are answered with 408.
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5001,
            request_timeout_secs: 30,
            max_body_bytes: 65_536,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token signing secret. A random one is generated at startup when unset.
    pub secret_key: Option<String>,
    pub token_ttl_secs: u64,
    /// PBKDF2 iterations for newly hashed passwords.
    pub hash_iterations: u32,
    /// Require a valid token on the listing routes.
    pub protect_listing: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
            protect_listing: false,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("hash_iterations", &self.hash_iterations)
            .field("protect_listing", &self.protect_listing)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", "brevet-api")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"));
        Self { data_dir }
    }
}

impl StorageConfig {
    pub fn users_db(&self) -> PathBuf {
        self.data_dir.join(USERS_DB_FILE)
    }

    pub fn brevet_db(&self) -> PathBuf {
        self.data_dir.join(BREVET_DB_FILE)
    }
}

impl Config {
    /// Load from `path` (if given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `BREVET_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(secret) = read("BREVET_SECRET_KEY") {
            self.auth.secret_key = Some(secret);
        }
        if let Some(host) = read("BREVET_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = read("BREVET_PORT") {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("BREVET_PORT is not a valid port: {port}"))?;
        }
        if let Some(dir) = read("BREVET_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = read("BREVET_TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = ttl
                .parse()
                .with_context(|| format!("BREVET_TOKEN_TTL_SECS is not a number: {ttl}"))?;
        }
        Ok(())
    }
}
