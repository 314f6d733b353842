use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Process-wide settings, validated once before anything is served.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// API group the webhook is registered under, e.g. `acme.example.com`.
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub secret_store: SecretStoreKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// PEM certificate chain served to the Kubernetes API aggregator.
    #[serde(default)]
    pub tls_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub tls_private_key_file: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            tls_cert_file: None,
            tls_private_key_file: None,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Certificate and key paths, when the server should speak HTTPS.
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_file, &self.tls_private_key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

/// Where secrets referenced by challenge configs are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SecretStoreKind {
    #[default]
    Kubernetes,
    /// Environment-only deployments; any secret reference fails.
    Disabled,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartupError {
    #[error("GROUP_NAME must be specified")]
    MissingGroupName,

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("TLS certificate and private key must be given together")]
    IncompleteTls,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Without a config file every setting takes its default.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// The webhook is unusable without a group name, so this must pass
    /// before the server starts.
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.group_name.trim().is_empty() {
            return Err(StartupError::MissingGroupName);
        }
        if self.server.request_timeout_secs == 0 {
            return Err(StartupError::ZeroRequestTimeout);
        }
        if self.server.tls_cert_file.is_some() != self.server.tls_private_key_file.is_some() {
            return Err(StartupError::IncompleteTls);
        }
        Ok(())
    }
}
