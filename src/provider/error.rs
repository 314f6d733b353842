use thiserror::Error;

/// Invalid or incomplete provider configuration. Never corrected silently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required field \"{field}\" is missing")]
    MissingField { field: &'static str },

    #[error("required field \"{field}\" is missing for authorization type: {authorization_type}")]
    MissingSecret {
        field: &'static str,
        authorization_type: String,
    },

    #[error("field \"{field}\" must be empty for authorization type: {authorization_type}")]
    UnexpectedSecret {
        field: &'static str,
        authorization_type: String,
    },

    #[error("field \"DNSRecordSetTTL\" must be greater or equal to {min}")]
    TtlTooLow { min: i64 },
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("malformed service account key: {0}")]
    MalformedKey(String),

    #[error("unsupported authorization type: {0:?}")]
    UnsupportedAuthorizationType(String),
}

/// Failure of the underlying cloud transport, kept close to the original cause.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} responded with {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("operation {id} failed with code {code}: {message}")]
    Operation { id: String, code: i32, message: String },

    #[error("failed to sign IAM token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("zone {zone:?} not found in folder {folder_id:?}")]
    ZoneNotFound { zone: String, folder_id: String },

    #[error("TXT record {fqdn:?} with the challenge value not found in zone {zone_id:?}")]
    RecordNotFound { fqdn: String, zone_id: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}
