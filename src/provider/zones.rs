//! Zone lookup over the paginated zone listing of a folder.

use futures::stream::{self, Stream, TryStreamExt};
use log::debug;

use super::client::{DnsApi, DnsZone, Visibility};
use super::error::{ApiError, ProviderError};

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Every zone of `folder_id` as a lazy, finite stream.
///
/// Pages are requested only when the previous one is consumed. A transport
/// failure is yielded as the last item. Calling this again restarts the
/// listing from the first page.
pub fn list_zones<'a, A>(
    api: &'a A,
    folder_id: &'a str,
) -> impl Stream<Item = Result<DnsZone, ApiError>> + Send + 'a
where
    A: DnsApi + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let page_token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok::<_, ApiError>(None),
        };

        let page = api.list_zones(folder_id, page_token.as_deref()).await?;
        debug!("Fetched {} zone(s) of folder {}", page.zones.len(), folder_id);

        let next = match page.next_page_token {
            Some(token) => Cursor::Next(token),
            None => Cursor::Done,
        };

        Ok(Some((
            stream::iter(page.zones.into_iter().map(Ok::<_, ApiError>)),
            next,
        )))
    })
    .try_flatten()
}

/// Finds the zone whose domain name equals `zone_name` exactly.
///
/// `zone_name` is expected in canonical form with the trailing dot. With
/// `public_only` set, private zones are skipped even when the name matches.
pub async fn locate<A>(
    api: &A,
    folder_id: &str,
    zone_name: &str,
    public_only: bool,
) -> Result<DnsZone, ProviderError>
where
    A: DnsApi + ?Sized,
{
    let mut zones = std::pin::pin!(list_zones(api, folder_id));

    while let Some(zone) = zones.try_next().await? {
        if zone.domain_name != zone_name {
            continue;
        }
        if public_only && zone.visibility != Visibility::Public {
            debug!("Skipping private zone {} ({})", zone.domain_name, zone.id);
            continue;
        }
        return Ok(zone);
    }

    Err(ProviderError::ZoneNotFound {
        zone: zone_name.to_string(),
        folder_id: folder_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::InMemoryDns;

    fn zone(id: &str, name: &str, visibility: Visibility) -> DnsZone {
        DnsZone {
            id: id.to_string(),
            domain_name: name.to_string(),
            visibility,
        }
    }

    #[tokio::test]
    async fn finds_zone_on_a_later_page() {
        let api = InMemoryDns::new(vec![
            zone("z1", "a.com.", Visibility::Public),
            zone("z2", "b.com.", Visibility::Public),
            zone("z3", "c.com.", Visibility::Public),
        ])
        .with_page_size(1);

        let found = locate(&api, "b123", "c.com.", false).await.unwrap();
        assert_eq!(found.id, "z3");
        assert_eq!(api.list_calls(), 3);
    }

    #[tokio::test]
    async fn stops_paging_at_first_match() {
        let api = InMemoryDns::new(vec![
            zone("z1", "a.com.", Visibility::Public),
            zone("z2", "b.com.", Visibility::Public),
        ])
        .with_page_size(1);

        locate(&api, "b123", "a.com.", false).await.unwrap();
        assert_eq!(api.list_calls(), 1);
    }

    #[tokio::test]
    async fn missing_zone_is_reported() {
        let api = InMemoryDns::new(vec![
            zone("z1", "a.com.", Visibility::Public),
            zone("z2", "b.com.", Visibility::Public),
        ]);

        let err = locate(&api, "b123", "c.com.", false).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::ZoneNotFound { zone, folder_id } if zone == "c.com." && folder_id == "b123"
        ));
    }

    #[tokio::test]
    async fn match_is_exact() {
        let api = InMemoryDns::new(vec![
            zone("z1", "example.com", Visibility::Public),
            zone("z2", "sub.example.com.", Visibility::Public),
        ]);

        let err = locate(&api, "b123", "example.com.", false).await.unwrap_err();
        assert!(matches!(err, ProviderError::ZoneNotFound { .. }));
    }

    #[tokio::test]
    async fn public_only_skips_private_zone() {
        let api = InMemoryDns::new(vec![
            zone("private", "example.com.", Visibility::Private),
            zone("public", "example.com.", Visibility::Public),
        ]);

        assert_eq!(locate(&api, "b123", "example.com.", false).await.unwrap().id, "private");
        assert_eq!(locate(&api, "b123", "example.com.", true).await.unwrap().id, "public");
    }

    #[tokio::test]
    async fn listing_failure_is_propagated() {
        let api = InMemoryDns::new(vec![
            zone("z1", "a.com.", Visibility::Public),
            zone("z2", "b.com.", Visibility::Public),
        ])
        .with_page_size(1)
        .failing_after_pages(1);

        let err = locate(&api, "b123", "b.com.", false).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(ApiError::Status { .. })));
    }

    #[tokio::test]
    async fn listing_can_be_restarted() {
        let api = InMemoryDns::new(vec![
            zone("z1", "a.com.", Visibility::Public),
            zone("z2", "b.com.", Visibility::Public),
        ])
        .with_page_size(1);

        let first: Vec<DnsZone> = list_zones(&api, "b123").try_collect().await.unwrap();
        let second: Vec<DnsZone> = list_zones(&api, "b123").try_collect().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
