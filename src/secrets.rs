//! Access to credential material referenced by challenge configurations.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretLookupError {
    #[error("key {key:?} not found in secret \"{namespace}/{name}\"")]
    NotFound {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("failed to read secret \"{namespace}/{name}\": {source}")]
    Store {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("key {key:?} of secret \"{namespace}/{name}\" is not valid UTF-8")]
    NotUtf8 {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("secret store is disabled, cannot read secret \"{namespace}/{name}\"")]
    Unavailable { namespace: String, name: String },
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Raw bytes stored under `key` of secret `name` in `namespace`.
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Vec<u8>, SecretLookupError>;
}

/// Reads Secrets from the cluster the webhook runs in.
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client from the in-cluster service account or the local kubeconfig.
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Vec<u8>, SecretLookupError> {
        debug!("Reading key {:?} of secret {}/{}", key, namespace, name);

        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .map_err(|source| SecretLookupError::Store {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?;

        secret
            .and_then(|s| s.data)
            .and_then(|mut data| data.remove(key))
            .map(|bytes| bytes.0)
            .ok_or_else(|| SecretLookupError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                key: key.to_string(),
            })
    }
}

/// Store for deployments configured purely through the environment.
pub struct DisabledSecretStore;

#[async_trait]
impl SecretStore for DisabledSecretStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
        _key: &str,
    ) -> Result<Vec<u8>, SecretLookupError> {
        Err(SecretLookupError::Unavailable {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

/// Reads a secret value as text, trimming surrounding whitespace.
pub async fn get_secret_string(
    store: &dyn SecretStore,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, SecretLookupError> {
    let bytes = store.get_secret(namespace, name, key).await?;
    String::from_utf8(bytes)
        .map(|value| value.trim().to_string())
        .map_err(|_| SecretLookupError::NotUtf8 {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        })
}
