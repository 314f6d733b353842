//! Challenge TXT record mutations.
//!
//! Both operations are a single `upsertRecordSets` call. A merge adds the
//! value to whatever record set already exists under the name, so repeated
//! calls are no-ops and values of concurrent challenges survive. A deletion
//! removes only the listed value.

use log::{debug, info};

use super::client::{DnsApi, Operation, RecordSet, UpsertRecordSets};
use super::error::{ApiError, ProviderError};

pub async fn merge<A>(
    api: &A,
    zone_id: &str,
    fqdn: &str,
    key: &str,
    ttl: i64,
) -> Result<(), ProviderError>
where
    A: DnsApi + ?Sized,
{
    let request = UpsertRecordSets {
        merges: vec![RecordSet::txt(fqdn, ttl, key)],
        ..Default::default()
    };

    let operation = api.upsert_record_sets(zone_id, &request).await?;
    check_operation(&operation)?;

    let added = operation
        .response
        .as_ref()
        .map_or(0, |diff| diff.added.len());
    if added == 0 {
        debug!("TXT record {} already holds the challenge value", fqdn);
    }
    info!("Presented TXT record {} in zone {} (operation {})", fqdn, zone_id, operation.id);

    Ok(())
}

pub async fn delete<A>(
    api: &A,
    zone_id: &str,
    fqdn: &str,
    key: &str,
    ttl: i64,
) -> Result<(), ProviderError>
where
    A: DnsApi + ?Sized,
{
    let request = UpsertRecordSets {
        deletions: vec![RecordSet::txt(fqdn, ttl, key)],
        ..Default::default()
    };

    let operation = api.upsert_record_sets(zone_id, &request).await?;
    check_operation(&operation)?;

    // A pending operation carries no diff yet; the API has accepted it.
    if operation.done {
        let deleted = operation
            .response
            .as_ref()
            .map_or(0, |diff| diff.deleted.len());
        if deleted == 0 {
            return Err(ProviderError::RecordNotFound {
                fqdn: fqdn.to_string(),
                zone_id: zone_id.to_string(),
            });
        }
    }

    info!("Cleaned up TXT record {} in zone {} (operation {})", fqdn, zone_id, operation.id);

    Ok(())
}

fn check_operation(operation: &Operation) -> Result<(), ApiError> {
    match &operation.error {
        Some(status) => Err(ApiError::Operation {
            id: operation.id.clone(),
            code: status.code,
            message: status.message.clone(),
        }),
        None => Ok(()),
    }
}
