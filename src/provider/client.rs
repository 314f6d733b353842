//! Yandex Cloud DNS REST client.
//!
//! The provider only needs two capabilities from the cloud: listing the zones
//! of a folder page by page and upserting record sets. Both sit behind
//! [`DnsApi`] so the orchestration can be driven by any backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::credentials::Credential;
use super::error::ApiError;

const DNS_API_BASE: &str = "https://dns.api.cloud.yandex.net/dns/v1";
const IAM_API_BASE: &str = "https://iam.api.cloud.yandex.net/iam/v1";
const METADATA_BASE: &str = "http://169.254.169.254/computeMetadata/v1";

const ZONES_PAGE_SIZE: u32 = 100;

// IAM tokens live for 12 hours; refresh well before that.
const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(60 * 60);

/// Base URLs of the services the provider talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub dns: String,
    pub iam: String,
    pub metadata: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dns: DNS_API_BASE.to_string(),
            iam: IAM_API_BASE.to_string(),
            metadata: METADATA_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Points every service at the same base URL.
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            dns: format!("{}/dns/v1", base),
            iam: format!("{}/iam/v1", base),
            metadata: format!("{}/computeMetadata/v1", base),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsZone {
    pub id: String,
    /// DNS suffix in canonical form, e.g. `example.com.`
    pub domain_name: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default)]
pub struct ZonePage {
    pub zones: Vec<DnsZone>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    /// int64 travels as a JSON string
    pub ttl: String,
    pub data: Vec<String>,
}

impl RecordSet {
    pub fn txt(name: &str, ttl: i64, value: &str) -> Self {
        Self {
            name: name.to_string(),
            record_type: "TXT".to_string(),
            ttl: ttl.to_string(),
            data: vec![value.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpsertRecordSets {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<RecordSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub merges: Vec<RecordSet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationStatus>,
    pub response: Option<RecordSetDiff>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordSetDiff {
    #[serde(default)]
    pub added: Vec<RecordSet>,
    #[serde(default)]
    pub deleted: Vec<RecordSet>,
}

#[async_trait]
pub trait DnsApi: Send + Sync {
    /// One page of the zones owned by `folder_id`.
    async fn list_zones(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ZonePage, ApiError>;

    async fn upsert_record_sets(
        &self,
        zone_id: &str,
        request: &UpsertRecordSets,
    ) -> Result<Operation, ApiError>;
}

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

/// REST client bound to one credential.
///
/// The IAM token obtained for the first call is reused by the following ones
/// until it gets old, so a paged zone scan costs a single token exchange.
pub struct YandexDnsClient {
    http: Client,
    credential: Credential,
    endpoints: Endpoints,
    token: Mutex<Option<CachedToken>>,
}

impl YandexDnsClient {
    pub fn new(http: Client, credential: Credential, endpoints: Endpoints) -> Self {
        Self {
            http,
            credential,
            endpoints,
            token: Mutex::new(None),
        }
    }

    async fn iam_token(&self) -> Result<String, ApiError> {
        // Held across the exchange so concurrent callers share one request.
        let mut cached = self.token.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.fetched_at.elapsed() < TOKEN_REFRESH_AFTER)
        {
            return Ok(token.value.clone());
        }

        let value = self.credential.iam_token(&self.http, &self.endpoints).await?;
        *cached = Some(CachedToken {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }
}

#[async_trait]
impl DnsApi for YandexDnsClient {
    async fn list_zones(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ZonePage, ApiError> {
        const ENDPOINT: &str = "dns zones list";

        let token = self.iam_token().await?;
        let url = format!("{}/zones", self.endpoints.dns);
        let page_size = ZONES_PAGE_SIZE.to_string();

        let mut query = vec![("folderId", folder_id), ("pageSize", page_size.as_str())];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token));
        }

        debug!("Listing zones of folder {} (page token: {:?})", folder_id, page_token);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })?;

        let body: ListZonesResponse = check_status(ENDPOINT, response)
            .await?
            .json()
            .await
            .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })?;

        Ok(body.into())
    }

    async fn upsert_record_sets(
        &self,
        zone_id: &str,
        request: &UpsertRecordSets,
    ) -> Result<Operation, ApiError> {
        const ENDPOINT: &str = "dns upsertRecordSets";

        let token = self.iam_token().await?;
        let url = format!("{}/zones/{}:upsertRecordSets", self.endpoints.dns, zone_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })?;

        check_status(ENDPOINT, response)
            .await?
            .json()
            .await
            .map_err(|source| ApiError::Transport { endpoint: ENDPOINT, source })
    }
}

/// Turns a non-success response into [`ApiError::Status`], preferring the
/// `message` of a JSON error body over the raw text.
pub(super) async fn check_status(
    endpoint: &'static str,
    response: Response,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or(body);

    Err(ApiError::Status {
        endpoint,
        status,
        message,
    })
}

// Yandex Cloud API types

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListZonesResponse {
    #[serde(default)]
    dns_zones: Vec<ZoneResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneResource {
    id: String,
    #[serde(default)]
    zone: String,
    #[serde(default)]
    public_visibility: Option<serde_json::Value>,
}

impl From<ListZonesResponse> for ZonePage {
    fn from(body: ListZonesResponse) -> Self {
        let zones = body
            .dns_zones
            .into_iter()
            .map(|z| DnsZone {
                id: z.id,
                domain_name: z.zone,
                visibility: if z.public_visibility.is_some() {
                    Visibility::Public
                } else {
                    Visibility::Private
                },
            })
            .collect();

        ZonePage {
            zones,
            next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}
