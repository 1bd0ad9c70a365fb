//! Configuration loading.
//!
//! Reads a JSON config file and applies `APNS_*` environment overrides.
//! Signing keys and certificates are referenced by path; their contents are
//! never stored in the config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    ALTERNATIVE_PORT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
    PRODUCTION_HOST, SANDBOX_HOST,
};

/// How requests are authorized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Provider token signed with a `.p8` key.
    Token {
        /// Developer team identifier (the `iss` claim).
        team_id: String,
        /// Key identifier (the `kid` header).
        key_id: String,
        /// Path to the PKCS#8 PEM signing key.
        key_file: PathBuf,
    },
    /// TLS client certificate.
    Certificate {
        /// Path to the PEM certificate chain.
        cert_file: PathBuf,
        /// Path to the PEM private key.
        key_file: PathBuf,
    },
}

/// Configuration for the push client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Use the development gateway.
    pub use_sandbox: bool,
    /// Connect on port 2197 instead of 443.
    pub use_alternative_port: bool,
    /// Authorization method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    /// Default topic (usually the app's bundle id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Seconds to wait for each response.
    pub request_timeout_secs: u64,
    /// Seconds allowed for each TCP connect and TLS handshake.
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_sandbox: false,
            use_alternative_port: false,
            auth: None,
            topic: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Default config file location (`<config dir>/apns-push/config.json`).
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("apns-push")
            .join("config.json"))
    }

    /// Load configuration from `path`, with environment variable overrides.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?
        } else {
            log::debug!("[Config] {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(sandbox) = std::env::var("APNS_USE_SANDBOX") {
            self.use_sandbox = matches!(sandbox.as_str(), "1" | "true" | "yes");
        }

        if let Ok(topic) = std::env::var("APNS_TOPIC") {
            self.topic = Some(topic);
        }

        if let Ok(timeout) = std::env::var("APNS_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.request_timeout_secs = secs;
            }
        }

        // Token credentials from env vars (for CI/CD); all three are required.
        if let (Ok(team_id), Ok(key_id), Ok(key_file)) = (
            std::env::var("APNS_TEAM_ID"),
            std::env::var("APNS_KEY_ID"),
            std::env::var("APNS_KEY_FILE"),
        ) {
            self.auth = Some(AuthConfig::Token {
                team_id,
                key_id,
                key_file: PathBuf::from(key_file),
            });
        }
    }

    /// Persist the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Gateway host.
    pub fn host(&self) -> &'static str {
        if self.use_sandbox {
            SANDBOX_HOST
        } else {
            PRODUCTION_HOST
        }
    }

    /// Gateway port.
    pub fn port(&self) -> u16 {
        if self.use_alternative_port {
            ALTERNATIVE_PORT
        } else {
            DEFAULT_PORT
        }
    }

    /// Per-response timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect/handshake timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
