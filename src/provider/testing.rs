//! In-memory `DnsApi` with the upsert semantics of Yandex Cloud DNS.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{
    DnsApi, DnsZone, Operation, RecordSet, RecordSetDiff, UpsertRecordSets, ZonePage,
};
use super::error::ApiError;

pub struct InMemoryDns {
    zones: Vec<DnsZone>,
    page_size: usize,
    fail_after_pages: Option<usize>,
    list_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    // (zone id, record name) -> TXT values
    records: Mutex<HashMap<(String, String), BTreeSet<String>>>,
}

impl InMemoryDns {
    pub fn new(zones: Vec<DnsZone>) -> Self {
        Self {
            zones,
            page_size: 100,
            fail_after_pages: None,
            list_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn failing_after_pages(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn values(&self, zone_id: &str, name: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .get(&(zone_id.to_string(), name.to_string()))
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DnsApi for InMemoryDns {
    async fn list_zones(
        &self,
        _folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ZonePage, ApiError> {
        let served = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after_pages.is_some_and(|pages| served >= pages) {
            return Err(ApiError::Status {
                endpoint: "dns zones list",
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                message: "unavailable".to_string(),
            });
        }

        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(self.zones.len());

        Ok(ZonePage {
            zones: self.zones[start.min(end)..end].to_vec(),
            next_page_token: (end < self.zones.len()).then(|| end.to_string()),
        })
    }

    async fn upsert_record_sets(
        &self,
        zone_id: &str,
        request: &UpsertRecordSets,
    ) -> Result<Operation, ApiError> {
        let id = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let mut diff = RecordSetDiff::default();

        for set in &request.merges {
            let values = records
                .entry((zone_id.to_string(), set.name.clone()))
                .or_default();
            let added: Vec<String> = set
                .data
                .iter()
                .filter(|value| values.insert((*value).clone()))
                .cloned()
                .collect();
            if !added.is_empty() {
                diff.added.push(RecordSet { data: added, ..set.clone() });
            }
        }

        for set in &request.deletions {
            let Some(values) = records.get_mut(&(zone_id.to_string(), set.name.clone())) else {
                continue;
            };
            let deleted: Vec<String> = set
                .data
                .iter()
                .filter(|value| values.remove(*value))
                .cloned()
                .collect();
            if !deleted.is_empty() {
                diff.deleted.push(RecordSet { data: deleted, ..set.clone() });
            }
        }

        Ok(Operation {
            id: format!("op{}", id),
            done: true,
            error: None,
            response: Some(diff),
        })
    }
}
