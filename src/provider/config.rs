use std::fmt;
use std::str::FromStr;

use super::error::ConfigError;

pub const ENV_AUTHORIZATION_TYPE: &str = "YANDEX_AUTHORIZATION_TYPE";
pub const ENV_AUTHORIZATION_OAUTH_TOKEN: &str = "YANDEX_AUTHORIZATION_OAUTH_TOKEN";
pub const ENV_AUTHORIZATION_KEY: &str = "YANDEX_AUTHORIZATION_KEY";
pub const ENV_FOLDER_ID: &str = "YANDEX_FOLDER_ID";
pub const ENV_DNS_RECORDSET_TTL: &str = "YANDEX_DNS_RECORDSET_TTL";
pub const ENV_DNS_PUBLIC_ZONES_ONLY: &str = "YANDEX_DNS_PUBLIC_ZONES_ONLY";

/// Lowest TTL accepted for challenge record sets, also the default.
pub const DEFAULT_DNS_RECORD_SET_TTL: i64 = 60;

/// How requests to Yandex Cloud are authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationType {
    /// Identity of the compute instance the webhook runs on.
    #[default]
    InstanceServiceAccount,
    /// Yandex Passport OAuth token exchanged for IAM tokens.
    OAuthToken,
    /// Service account authorized key (JSON).
    Key,
}

impl AuthorizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationType::InstanceServiceAccount => "instance-service-account",
            AuthorizationType::OAuthToken => "iam-token",
            AuthorizationType::Key => "iam-key",
        }
    }
}

impl fmt::Display for AuthorizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance-service-account" => Ok(AuthorizationType::InstanceServiceAccount),
            "iam-token" => Ok(AuthorizationType::OAuthToken),
            "iam-key" => Ok(AuthorizationType::Key),
            _ => Err(()),
        }
    }
}

/// Configuration of a single `DnsProvider`.
///
/// `authorization_type` is kept as the raw externally supplied string so that
/// an unknown value surfaces from [`ProviderConfig::validate`] instead of being
/// replaced by the default.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub authorization_type: String,
    pub authorization_oauth_token: String,
    pub authorization_key: String,
    pub folder_id: String,
    pub dns_record_set_ttl: i64,
    /// Only match zones with public visibility.
    pub public_zones_only: bool,
}

impl ProviderConfig {
    pub fn new(authorization_type: AuthorizationType, folder_id: impl Into<String>) -> Self {
        Self {
            authorization_type: authorization_type.as_str().to_string(),
            folder_id: folder_id.into(),
            dns_record_set_ttl: DEFAULT_DNS_RECORD_SET_TTL,
            ..Default::default()
        }
    }

    /// Builds the whole configuration from `YANDEX_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            authorization_type: env_or_default_string(
                &lookup,
                ENV_AUTHORIZATION_TYPE,
                AuthorizationType::default().as_str(),
            ),
            authorization_oauth_token: lookup(ENV_AUTHORIZATION_OAUTH_TOKEN).unwrap_or_default(),
            authorization_key: lookup(ENV_AUTHORIZATION_KEY).unwrap_or_default(),
            folder_id: lookup(ENV_FOLDER_ID).unwrap_or_default(),
            dns_record_set_ttl: env_or_default_int(
                &lookup,
                ENV_DNS_RECORDSET_TTL,
                DEFAULT_DNS_RECORD_SET_TTL,
            ),
            public_zones_only: env_flag(&lookup, ENV_DNS_PUBLIC_ZONES_ONLY),
        }
    }

    /// Combines an explicitly supplied configuration with environment defaults.
    ///
    /// Without an explicit configuration everything comes from the environment.
    /// Otherwise only authorization type, TTL and the zone visibility flag fall
    /// back to the environment when left at their zero value; folder id and
    /// secret material stay as given. The result still has to pass
    /// [`ProviderConfig::validate`].
    pub fn resolve(explicit: Option<ProviderConfig>) -> Self {
        Self::resolve_with(explicit, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(explicit: Option<ProviderConfig>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(mut cfg) = explicit else {
            return Self::from_env_with(lookup);
        };

        if cfg.authorization_type.is_empty() {
            cfg.authorization_type = env_or_default_string(
                &lookup,
                ENV_AUTHORIZATION_TYPE,
                AuthorizationType::default().as_str(),
            );
        }
        if cfg.dns_record_set_ttl == 0 {
            cfg.dns_record_set_ttl =
                env_or_default_int(&lookup, ENV_DNS_RECORDSET_TTL, DEFAULT_DNS_RECORD_SET_TTL);
        }
        if !cfg.public_zones_only {
            cfg.public_zones_only = env_flag(&lookup, ENV_DNS_PUBLIC_ZONES_ONLY);
        }

        cfg
    }

    /// Parsed authorization type, `None` when the raw value is not recognised.
    pub fn authorization(&self) -> Option<AuthorizationType> {
        self.authorization_type.parse().ok()
    }

    /// Stores secret material in the field the authorization type calls for.
    pub fn set_secret(&mut self, secret: impl Into<String>) {
        match self.authorization() {
            Some(AuthorizationType::OAuthToken) => self.authorization_oauth_token = secret.into(),
            Some(AuthorizationType::Key) => self.authorization_key = secret.into(),
            Some(AuthorizationType::InstanceServiceAccount) | None => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.folder_id.is_empty() {
            return Err(ConfigError::MissingField { field: "FolderId" });
        }

        let authorization = self.authorization().ok_or(ConfigError::MissingField {
            field: "AuthorizationType",
        })?;

        let (required, unexpected) = match authorization {
            AuthorizationType::InstanceServiceAccount => (
                None,
                vec![
                    ("AuthorizationOAuthToken", &self.authorization_oauth_token),
                    ("AuthorizationTypeKey", &self.authorization_key),
                ],
            ),
            AuthorizationType::OAuthToken => (
                Some(("AuthorizationOAuthToken", &self.authorization_oauth_token)),
                vec![("AuthorizationTypeKey", &self.authorization_key)],
            ),
            AuthorizationType::Key => (
                Some(("AuthorizationTypeKey", &self.authorization_key)),
                vec![("AuthorizationOAuthToken", &self.authorization_oauth_token)],
            ),
        };

        if let Some((field, value)) = required {
            if value.is_empty() {
                return Err(ConfigError::MissingSecret {
                    field,
                    authorization_type: self.authorization_type.clone(),
                });
            }
        }

        if let Some((field, _)) = unexpected.into_iter().find(|(_, value)| !value.is_empty()) {
            return Err(ConfigError::UnexpectedSecret {
                field,
                authorization_type: self.authorization_type.clone(),
            });
        }

        if self.dns_record_set_ttl < DEFAULT_DNS_RECORD_SET_TTL {
            return Err(ConfigError::TtlTooLow {
                min: DEFAULT_DNS_RECORD_SET_TTL,
            });
        }

        Ok(())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &str) -> &'static str {
            if value.is_empty() {
                ""
            } else {
                "<redacted>"
            }
        }

        f.debug_struct("ProviderConfig")
            .field("authorization_type", &self.authorization_type)
            .field("authorization_oauth_token", &redact(&self.authorization_oauth_token))
            .field("authorization_key", &redact(&self.authorization_key))
            .field("folder_id", &self.folder_id)
            .field("dns_record_set_ttl", &self.dns_record_set_ttl)
            .field("public_zones_only", &self.public_zones_only)
            .finish()
    }
}

fn env_or_default_string<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

// Unset or non-numeric values fall back to the default.
fn env_or_default_int<F>(lookup: &F, name: &str, default: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag<F>(lookup: &F, name: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
