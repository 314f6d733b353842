//! The DNS-01 solver contract and its Yandex Cloud implementation.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{DnsProvider, Endpoints, ProviderConfig, ProviderError};
use crate::secrets::{get_secret_string, SecretLookupError, SecretStore};

pub const PROVIDER_NAME: &str = "yandex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeAction {
    Present,
    CleanUp,
}

/// A single challenge as handed over by cert-manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    #[serde(default)]
    pub uid: String,
    pub action: ChallengeAction,
    #[serde(rename = "type", default)]
    pub challenge_type: String,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub resource_namespace: String,
    #[serde(rename = "resolvedFQDN", default)]
    pub resolved_fqdn: String,
    #[serde(default)]
    pub resolved_zone: String,
    #[serde(default)]
    pub allow_ambient_credentials: bool,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("error decoding solver config: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    SecretLookup(#[from] SecretLookupError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("solver {0:?} is not initialized")]
    NotInitialized(&'static str),

    #[error("solver {0:?} is already initialized")]
    AlreadyInitialized(&'static str),
}

#[async_trait]
pub trait Solver: Send + Sync {
    /// Name the solver is referenced by from an Issuer.
    fn name(&self) -> &'static str;

    /// One-time setup; must complete before any challenge is handled.
    async fn initialize(&self, secrets: Arc<dyn SecretStore>) -> Result<(), SolverError>;

    /// Creates the challenge record. Tolerates repeated calls.
    async fn present(&self, ch: &ChallengeRequest) -> Result<(), SolverError>;

    /// Removes only the record carrying `ch.key`.
    async fn clean_up(&self, ch: &ChallengeRequest) -> Result<(), SolverError>;
}

/// Per-challenge configuration decoded from the Issuer's `config` block.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverConfig {
    #[serde(default)]
    pub api_key_secret_ref: Option<SecretKeySelector>,
    #[serde(default)]
    pub authorization_type: String,
    #[serde(default)]
    pub folder_id: String,
    #[serde(rename = "dnsRecordSetTTL", default)]
    pub dns_record_set_ttl: i64,
    #[serde(default)]
    pub public_zones_only: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretKeySelector {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
}

impl SolverConfig {
    fn into_provider_config(self) -> ProviderConfig {
        ProviderConfig {
            authorization_type: self.authorization_type,
            folder_id: self.folder_id,
            dns_record_set_ttl: self.dns_record_set_ttl,
            public_zones_only: self.public_zones_only,
            ..Default::default()
        }
    }
}

/// Decodes the challenge config; a missing or null config means "use the environment".
pub fn load_config(raw: Option<&serde_json::Value>) -> Result<Option<SolverConfig>, SolverError> {
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => Ok(Some(SolverConfig::deserialize(value)?)),
    }
}

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct YandexSolver {
    http: Client,
    endpoints: Endpoints,
    env: EnvLookup,
    secrets: OnceLock<Arc<dyn SecretStore>>,
}

impl YandexSolver {
    pub fn new(http: Client, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints,
            env: Arc::new(|name: &str| std::env::var(name).ok()),
            secrets: OnceLock::new(),
        }
    }

    /// Replaces the process environment as the source of provider defaults.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    async fn provider(&self, ch: &ChallengeRequest) -> Result<DnsProvider, SolverError> {
        let secrets = self
            .secrets
            .get()
            .ok_or(SolverError::NotInitialized(PROVIDER_NAME))?;

        let cfg = load_config(ch.config.as_ref())?;

        let selector = cfg
            .as_ref()
            .and_then(|c| c.api_key_secret_ref.clone())
            .filter(|s| !s.name.is_empty());
        let secret = match selector {
            Some(selector) => Some(
                get_secret_string(
                    &**secrets,
                    &ch.resource_namespace,
                    &selector.name,
                    &selector.key,
                )
                .await?,
            ),
            None => None,
        };

        let mut provider_cfg =
            ProviderConfig::resolve_with(cfg.map(SolverConfig::into_provider_config), &*self.env);
        if let Some(secret) = secret {
            provider_cfg.set_secret(secret);
        }

        Ok(DnsProvider::new(
            &provider_cfg,
            self.http.clone(),
            self.endpoints.clone(),
        )?)
    }
}

#[async_trait]
impl Solver for YandexSolver {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn initialize(&self, secrets: Arc<dyn SecretStore>) -> Result<(), SolverError> {
        self.secrets
            .set(secrets)
            .map_err(|_| SolverError::AlreadyInitialized(PROVIDER_NAME))
    }

    async fn present(&self, ch: &ChallengeRequest) -> Result<(), SolverError> {
        info!(
            "Presenting challenge {} for {} in zone {}",
            ch.uid, ch.resolved_fqdn, ch.resolved_zone
        );

        let provider = self.provider(ch).await?;
        provider
            .present(&ch.resolved_zone, &ch.resolved_fqdn, &ch.key)
            .await?;
        Ok(())
    }

    async fn clean_up(&self, ch: &ChallengeRequest) -> Result<(), SolverError> {
        info!(
            "Cleaning up challenge {} for {} in zone {}",
            ch.uid, ch.resolved_fqdn, ch.resolved_zone
        );

        let provider = self.provider(ch).await?;
        provider
            .clean_up(&ch.resolved_zone, &ch.resolved_fqdn, &ch.key)
            .await?;
        Ok(())
    }
}
