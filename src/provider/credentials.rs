//! Credentials for Yandex Cloud and their exchange for short-lived IAM tokens.

use std::fmt;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::client::{check_status, Endpoints};
use super::config::{AuthorizationType, ProviderConfig};
use super::error::{ApiError, CredentialError};

const JWT_LIFETIME_SECS: i64 = 3600;
const TOKENS_AUDIENCE: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";

/// Authentication capability owned by a single provider.
pub enum Credential {
    InstanceServiceAccount,
    OAuthToken(String),
    ServiceAccountKey(ServiceAccountKey),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::InstanceServiceAccount => f.write_str("InstanceServiceAccount"),
            Credential::OAuthToken(_) => f.write_str("OAuthToken(<redacted>)"),
            Credential::ServiceAccountKey(key) => f
                .debug_tuple("ServiceAccountKey")
                .field(&key.id)
                .finish(),
        }
    }
}

/// Parsed service account authorized key.
pub struct ServiceAccountKey {
    pub id: String,
    pub service_account_id: String,
    encoding_key: EncodingKey,
}

#[derive(Deserialize)]
struct AuthorizedKeyFile {
    id: String,
    service_account_id: String,
    private_key: String,
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        let file: AuthorizedKeyFile = serde_json::from_str(raw)
            .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;

        // Newer keys carry a comment line in front of the PEM block.
        let pem = file
            .private_key
            .find("-----BEGIN")
            .map(|start| &file.private_key[start..])
            .ok_or_else(|| CredentialError::MalformedKey("private key is not PEM encoded".into()))?;

        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;

        Ok(Self {
            id: file.id,
            service_account_id: file.service_account_id,
            encoding_key,
        })
    }

    fn signed_jwt(&self) -> Result<String, jsonwebtoken::errors::Error> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = JwtClaims {
            aud: TOKENS_AUDIENCE,
            iss: &self.service_account_id,
            iat: now,
            exp: now + JWT_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::PS256);
        header.kid = Some(self.id.clone());

        encode(&header, &claims, &self.encoding_key)
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    iat: i64,
    exp: i64,
}

/// Builds the credential implied by the configured authorization type.
///
/// The type string is trimmed before matching since it comes from outside.
pub fn credentials(cfg: &ProviderConfig) -> Result<Credential, CredentialError> {
    let raw = cfg.authorization_type.trim();
    let authorization: AuthorizationType = raw
        .parse()
        .map_err(|_| CredentialError::UnsupportedAuthorizationType(raw.to_string()))?;

    match authorization {
        AuthorizationType::InstanceServiceAccount => Ok(Credential::InstanceServiceAccount),
        AuthorizationType::OAuthToken => {
            Ok(Credential::OAuthToken(cfg.authorization_oauth_token.clone()))
        }
        AuthorizationType::Key => Ok(Credential::ServiceAccountKey(ServiceAccountKey::from_json(
            &cfg.authorization_key,
        )?)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum TokenRequest<'a> {
    YandexPassportOauthToken(&'a str),
    Jwt(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IamTokenResponse {
    iam_token: String,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

impl Credential {
    /// Obtains a fresh IAM token for a single API call.
    pub async fn iam_token(&self, http: &Client, endpoints: &Endpoints) -> Result<String, ApiError> {
        match self {
            Credential::InstanceServiceAccount => instance_token(http, endpoints).await,
            Credential::OAuthToken(token) => {
                exchange(http, endpoints, &TokenRequest::YandexPassportOauthToken(token)).await
            }
            Credential::ServiceAccountKey(key) => {
                exchange(http, endpoints, &TokenRequest::Jwt(key.signed_jwt()?)).await
            }
        }
    }
}

async fn exchange(
    http: &Client,
    endpoints: &Endpoints,
    request: &TokenRequest<'_>,
) -> Result<String, ApiError> {
    const ENDPOINT: &str = "iam tokens";

    debug!("Exchanging credential for IAM token");

    let response = http
        .post(format!("{}/tokens", endpoints.iam))
        .json(request)
        .send()
        .await
        .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })?;

    let body: IamTokenResponse = check_status(ENDPOINT, response)
        .await?
        .json()
        .await
        .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })?;

    Ok(body.iam_token)
}

async fn instance_token(http: &Client, endpoints: &Endpoints) -> Result<String, ApiError> {
    const ENDPOINT: &str = "instance metadata";

    debug!("Requesting IAM token from instance metadata");

    let response = http
        .get(format!(
            "{}/instance/service-accounts/default/token",
            endpoints.metadata
        ))
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })?;

    let body: MetadataTokenResponse = check_status(ENDPOINT, response)
        .await?
        .json()
        .await
        .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })?;

    Ok(body.access_token)
}
