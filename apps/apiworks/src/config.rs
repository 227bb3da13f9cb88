//! # Configuration
//!
//! [`AppConfig`] is read from an optional TOML file (`--config` or
//! `APIWORKS_CONFIG`) and then overridden by environment variables:
//!
//! - `APIWORKS_HOST`, `APIWORKS_PORT`: listen address
//! - `APIWORKS_DB`: redb file
//! - `APIWORKS_VAULT_KEY`: base64 32-byte vault key
//! - `APIWORKS_STREAM_BUFFER`: events buffered per sync subscription
//! - `APIWORKS_EXPORT_TIMEOUT`: export deadline in seconds
//! - `APIWORKS_RATE_LIMIT`: requests per second (0 disables)
//! - `APIWORKS_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `APIWORKS_API_TOKEN` + `APIWORKS_API_USER`: one bearer token and the
//!   user it authenticates

use crate::error::AppError;
use apiworks_core::primitives::EXPORT_TIMEOUT;
use apiworks_core::{EncryptionType, Id, LayoutConfig, Vault};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub vault: VaultConfig,
    pub streams: StreamsConfig,
    pub export: ExportConfig,
    pub limits: LimitsConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    /// Grid used when imported flows are laid out.
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("apiworks.redb"),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Standard base64 of the 32-byte key.
    pub key: Option<String>,
    pub algorithm: EncryptionType,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamsConfig {
    pub buffer: usize,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self { buffer: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: EXPORT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub rate_per_second: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { rate_per_second: 100 }
    }
}

/// `None` allows localhost only; `["*"]` allows every origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
}

/// A bearer token and the user principal it stands for.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: Id,
}

impl std::fmt::Debug for TokenEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEntry")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// File (explicit path, else `APIWORKS_CONFIG`) then environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("APIWORKS_CONFIG").map(PathBuf::from));
        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "reading configuration file");
                Self::from_toml(&std::fs::read_to_string(&path)?)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("APIWORKS_HOST") {
            self.server.host = host;
        }
        override_parsed(&mut self.server.port, "APIWORKS_PORT", get("APIWORKS_PORT"));
        if let Some(path) = get("APIWORKS_DB") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(key) = get("APIWORKS_VAULT_KEY") {
            self.vault.key = Some(key);
        }
        override_parsed(&mut self.streams.buffer, "APIWORKS_STREAM_BUFFER", get("APIWORKS_STREAM_BUFFER"));
        override_parsed(&mut self.export.timeout_secs, "APIWORKS_EXPORT_TIMEOUT", get("APIWORKS_EXPORT_TIMEOUT"));
        override_parsed(&mut self.limits.rate_per_second, "APIWORKS_RATE_LIMIT", get("APIWORKS_RATE_LIMIT"));
        if let Some(origins) = get("APIWORKS_CORS_ORIGINS") {
            self.cors.origins = Some(origins.split(',').map(|o| o.trim().to_string()).collect());
        }

        match (get("APIWORKS_API_TOKEN"), get("APIWORKS_API_USER")) {
            (Some(token), Some(user)) => {
                let user_id = Id::from_str(user.trim())
                    .map_err(|e| AppError::Config(format!("APIWORKS_API_USER: {e}")))?;
                self.auth.tokens.push(TokenEntry { token, user_id });
            }
            (Some(_), None) => {
                return Err(AppError::Config(
                    "APIWORKS_API_TOKEN is set without APIWORKS_API_USER".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// The vault for the configured key; the all-zero key when none is set.
    pub fn vault(&self) -> Result<Vault, AppError> {
        let vault = match &self.vault.key {
            Some(encoded) => {
                let key = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| AppError::Config(format!("vault.key is not base64: {e}")))?;
                Vault::new(&key).map_err(|e| AppError::Config(e.to_string()))?
            }
            None => {
                tracing::warn!(
                    "no vault key configured, secrets are sealed with the all-zero key; \
                     set APIWORKS_VAULT_KEY for any shared deployment"
                );
                Vault::default()
            }
        };
        Ok(vault.with_default_algorithm(self.vault.algorithm))
    }

    #[must_use]
    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export.timeout_secs)
    }

    #[must_use]
    /// `host:port` the server listens on.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn override_parsed<T: FromStr>(slot: &mut T, key: &str, value: Option<String>) {
    let Some(value) = value else { return };
    match value.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!(key, value = %value, "ignoring unparsable environment override"),
    }
}
