//! Yandex Cloud DNS provider for ACME DNS-01 challenges.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod records;
pub mod zones;

#[cfg(test)]
pub(crate) mod testing;

use log::debug;
use reqwest::Client;

pub use client::{DnsApi, Endpoints, YandexDnsClient};
pub use config::{AuthorizationType, ProviderConfig};
pub use error::ProviderError;

/// Presents and cleans up challenge TXT records.
///
/// Holds nothing but the API client and the validated settings, so concurrent
/// calls are safe. Zones are looked up again on every call; the client keeps
/// its IAM token between them.
pub struct DnsProvider<A = YandexDnsClient> {
    api: A,
    folder_id: String,
    ttl: i64,
    public_zones_only: bool,
}

impl DnsProvider<YandexDnsClient> {
    pub fn new(
        cfg: &ProviderConfig,
        http: Client,
        endpoints: Endpoints,
    ) -> Result<Self, ProviderError> {
        cfg.validate()?;
        let credential = credentials::credentials(cfg)?;
        Ok(Self::from_parts(cfg, YandexDnsClient::new(http, credential, endpoints)))
    }
}

impl<A: DnsApi> DnsProvider<A> {
    /// Provider over an arbitrary `DnsApi` backend.
    pub fn with_api(cfg: &ProviderConfig, api: A) -> Result<Self, ProviderError> {
        cfg.validate()?;
        Ok(Self::from_parts(cfg, api))
    }

    fn from_parts(cfg: &ProviderConfig, api: A) -> Self {
        Self {
            api,
            folder_id: cfg.folder_id.clone(),
            ttl: cfg.dns_record_set_ttl,
            public_zones_only: cfg.public_zones_only,
        }
    }

    /// Adds `key` to the TXT record set `fqdn` in `zone`. Safe to repeat.
    pub async fn present(&self, zone: &str, fqdn: &str, key: &str) -> Result<(), ProviderError> {
        let found = zones::locate(&self.api, &self.folder_id, zone, self.public_zones_only).await?;
        debug!("Zone {} resolved to {}", zone, found.id);

        records::merge(&self.api, &found.id, fqdn, key, self.ttl).await
    }

    /// Removes only `key` from the TXT record set `fqdn` in `zone`.
    pub async fn clean_up(&self, zone: &str, fqdn: &str, key: &str) -> Result<(), ProviderError> {
        let found = zones::locate(&self.api, &self.folder_id, zone, self.public_zones_only).await?;
        debug!("Zone {} resolved to {}", zone, found.id);

        records::delete(&self.api, &found.id, fqdn, key, self.ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::client::{DnsZone, Visibility};
    use super::testing::InMemoryDns;

    const FQDN: &str = "_acme-challenge.example.com.";

    fn provider() -> DnsProvider<InMemoryDns> {
        let api = InMemoryDns::new(vec![
            DnsZone {
                id: "z-other".to_string(),
                domain_name: "other.org.".to_string(),
                visibility: Visibility::Public,
            },
            DnsZone {
                id: "z-example".to_string(),
                domain_name: "example.com.".to_string(),
                visibility: Visibility::Public,
            },
        ])
        .with_page_size(1);

        let cfg = ProviderConfig::new(AuthorizationType::InstanceServiceAccount, "b123");
        DnsProvider::with_api(&cfg, api).unwrap()
    }

    #[tokio::test]
    async fn present_twice_leaves_single_value() {
        let provider = provider();

        provider.present("example.com.", FQDN, "key").await.unwrap();
        provider.present("example.com.", FQDN, "key").await.unwrap();

        assert_eq!(provider.api.values("z-example", FQDN), vec!["key".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_challenges_coexist_and_clean_up_separately() {
        let provider = provider();

        let (a, b) = tokio::join!(
            provider.present("example.com.", FQDN, "key-a"),
            provider.present("example.com.", FQDN, "key-b"),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(
            provider.api.values("z-example", FQDN),
            vec!["key-a".to_string(), "key-b".to_string()]
        );

        provider.clean_up("example.com.", FQDN, "key-a").await.unwrap();
        assert_eq!(provider.api.values("z-example", FQDN), vec!["key-b".to_string()]);
    }

    #[tokio::test]
    async fn clean_up_reports_missing_record() {
        let provider = provider();

        let err = provider
            .clean_up("example.com.", FQDN, "key")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn clean_up_reports_missing_zone() {
        let provider = provider();

        let err = provider
            .clean_up("missing.net.", "_acme-challenge.missing.net.", "key")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ZoneNotFound { .. }));
        assert_eq!(provider.api.upsert_calls(), 0);
    }

    #[test]
    fn invalid_config_is_rejected_before_any_call() {
        let cfg = ProviderConfig::new(AuthorizationType::OAuthToken, "b123");
        let err = DnsProvider::with_api(&cfg, InMemoryDns::new(vec![])).err().unwrap();
        assert!(err.to_string().contains("\"AuthorizationOAuthToken\""));
    }

    #[test]
    fn malformed_key_fails_provider_construction() {
        let mut cfg = ProviderConfig::new(AuthorizationType::Key, "b123");
        cfg.set_secret("{}");
        let err = DnsProvider::new(&cfg, Client::new(), Endpoints::default())
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Credential(_)));
    }

    #[tokio::test]
    async fn present_exchanges_credential_once() {
        use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/iam/v1/tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "iamToken": "iam-token"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/dns/v1/zones"))
            .and(matchers::query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dnsZones": [{ "id": "z-example", "zone": "example.com.", "publicVisibility": {} }]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/dns/v1/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dnsZones": [{ "id": "z-other", "zone": "other.org.", "publicVisibility": {} }],
                "nextPageToken": "page-2"
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/dns/v1/zones/z-example:upsertRecordSets"))
            .and(matchers::header("Authorization", "Bearer iam-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "op1",
                "done": true,
                "response": { "added": [] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = ProviderConfig::new(AuthorizationType::OAuthToken, "b123");
        cfg.set_secret("oauth-token");
        let provider = DnsProvider::new(&cfg, Client::new(), Endpoints::single(&server.uri())).unwrap();

        provider.present("example.com.", FQDN, "key").await.unwrap();
    }
}
